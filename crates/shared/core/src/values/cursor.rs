use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque paging token returned by the ledger API with every record.
///
/// Tokens are ordered: decimal tokens compare numerically, segment by segment
/// for the `{operation}-{index}` form Horizon uses for effects; anything else
/// falls back to lexicographic order. The special value `now` asks a stream to
/// start at the current ledger and never takes part in ordering decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub const NOW: &'static str = "now";

    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    /// Cursor that starts a stream at the current head
    pub fn now() -> Self {
        Cursor(Self::NOW.to_string())
    }

    pub fn is_now(&self) -> bool {
        self.0 == Self::NOW
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decimal segments of tokens like `12884905985` or `12884905985-2`,
    /// leading zeros stripped
    fn numeric_segments(&self) -> Option<Vec<&str>> {
        self.0
            .split('-')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let trimmed = segment.trim_start_matches('0');
                Some(if trimmed.is_empty() { "0" } else { trimmed })
            })
            .collect()
    }
}

fn cmp_decimal(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric_segments(), other.numeric_segments()) {
            (Some(a), Some(b)) => a
                .iter()
                .zip(&b)
                .map(|(x, y)| cmp_decimal(x, y))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len()))
                // Keep Ord consistent with Eq for zero-padded tokens
                .then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor::new(s)
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Cursor(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ordering() {
        // Lexicographic order would put "9" after "10"
        assert!(Cursor::new("9") < Cursor::new("10"));
        assert!(Cursor::new("113725249324879873") > Cursor::new("113725249324879872"));
    }

    #[test]
    fn test_zero_padding_stays_consistent_with_eq() {
        let padded = Cursor::new("007");
        let plain = Cursor::new("7");
        assert_ne!(padded, plain);
        assert_ne!(padded.cmp(&plain), Ordering::Equal);
    }

    #[test]
    fn test_non_numeric_falls_back_to_lexicographic() {
        assert!(Cursor::new("abc-1") < Cursor::new("abc-2"));
    }

    #[test]
    fn test_effect_tokens_compare_by_segment() {
        assert!(Cursor::new("12884905985-2") < Cursor::new("12884905985-10"));
        assert!(Cursor::new("12884905985-10") < Cursor::new("12884905986-1"));
        assert!(Cursor::new("12884905985") < Cursor::new("12884905985-1"));
    }

    #[test]
    fn test_now() {
        assert!(Cursor::now().is_now());
        assert!(!Cursor::new("12").is_now());
        assert_eq!(Cursor::now().to_string(), "now");
    }

    #[test]
    fn test_max_picks_newest() {
        let tokens = vec![Cursor::new("12"), Cursor::new("120"), Cursor::new("99")];
        assert_eq!(tokens.into_iter().max().unwrap().as_str(), "120");
    }
}
