use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(rename = "self", default)]
    pub self_link: Link,
    #[serde(default)]
    pub next: Link,
    #[serde(default)]
    pub prev: Link,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedded<T> {
    pub records: Vec<T>,
}

/// Pagination envelope: `{ _embedded: { records }, _links: { self, next, prev } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPage<T> {
    #[serde(rename = "_embedded")]
    pub embedded: Embedded<T>,
    #[serde(rename = "_links", default)]
    pub links: PageLinks,
}

impl<T> CollectionPage<T> {
    /// Page with no records whose links all point at `url`
    pub fn empty(url: &str) -> Self {
        let link = Link {
            href: url.to_string(),
        };
        CollectionPage {
            embedded: Embedded {
                records: Vec::new(),
            },
            links: PageLinks {
                self_link: link.clone(),
                next: link.clone(),
                prev: link,
            },
        }
    }

    pub fn records(&self) -> &[T] {
        &self.embedded.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.embedded.records
    }
}
