//! Ledger assets
//!
//! An asset is either the native lumen or a credit issued by an account.
//! Asset ids use the `CODE:ISSUER` form, with `XLM` / `native` for the native
//! asset. On the wire Horizon describes assets as
//! `{ asset_type, asset_code, asset_issuer }` objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetParseError {
    #[error("Empty asset id")]
    Empty,
    #[error("Invalid asset code: {0}")]
    InvalidCode(String),
    #[error("Missing issuer for asset code {0}")]
    MissingIssuer(String),
    #[error("Unknown asset type: {0}")]
    UnknownType(String),
}

/// A ledger asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireAsset", into = "WireAsset")]
pub enum Asset {
    /// The native lumen
    Native,
    /// Credit asset issued by an account
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn credit(code: impl Into<String>, issuer: impl Into<String>) -> Self {
        Asset::Credit {
            code: code.into(),
            issuer: issuer.into(),
        }
    }

    /// Parse an asset id (`XLM`, `native` or `CODE:ISSUER`)
    pub fn parse(id: &str) -> Result<Self, AssetParseError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AssetParseError::Empty);
        }
        if id == "XLM" || id == "native" {
            return Ok(Asset::Native);
        }

        match id.split_once(':') {
            Some((code, issuer)) if !issuer.is_empty() => {
                validate_code(code)?;
                Ok(Asset::credit(code, issuer))
            }
            _ => Err(AssetParseError::MissingIssuer(id.to_string())),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// Horizon asset type name
    pub fn asset_type(&self) -> &'static str {
        match self {
            Asset::Native => "native",
            Asset::Credit { code, .. } if code.len() <= 4 => "credit_alphanum4",
            Asset::Credit { .. } => "credit_alphanum12",
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Asset::Native => "XLM",
            Asset::Credit { code, .. } => code,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        match self {
            Asset::Native => None,
            Asset::Credit { issuer, .. } => Some(issuer),
        }
    }

    /// Canonical asset id, the inverse of [`Asset::parse`]
    pub fn id(&self) -> String {
        match self {
            Asset::Native => "XLM".to_string(),
            Asset::Credit { code, issuer } => format!("{}:{}", code, issuer),
        }
    }
}

fn validate_code(code: &str) -> Result<(), AssetParseError> {
    let valid = (1..=12).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(AssetParseError::InvalidCode(code.to_string()))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for Asset {
    type Err = AssetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Asset::parse(s)
    }
}

/// Horizon's JSON shape for an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireAsset {
    asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_issuer: Option<String>,
}

impl TryFrom<WireAsset> for Asset {
    type Error = AssetParseError;

    fn try_from(wire: WireAsset) -> Result<Self, Self::Error> {
        match wire.asset_type.as_str() {
            "native" => Ok(Asset::Native),
            "credit_alphanum4" | "credit_alphanum12" => {
                let code = wire.asset_code.ok_or(AssetParseError::Empty)?;
                validate_code(&code)?;
                let issuer = wire
                    .asset_issuer
                    .ok_or_else(|| AssetParseError::MissingIssuer(code.clone()))?;
                Ok(Asset::Credit { code, issuer })
            }
            other => Err(AssetParseError::UnknownType(other.to_string())),
        }
    }
}

impl From<Asset> for WireAsset {
    fn from(asset: Asset) -> Self {
        let asset_type = asset.asset_type().to_string();
        match asset {
            Asset::Native => WireAsset {
                asset_type,
                asset_code: None,
                asset_issuer: None,
            },
            Asset::Credit { code, issuer } => WireAsset {
                asset_type,
                asset_code: Some(code),
                asset_issuer: Some(issuer),
            },
        }
    }
}
