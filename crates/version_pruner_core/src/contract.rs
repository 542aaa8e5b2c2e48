use serde::{Deserialize, Serialize};

/// Qualifier the hosting service uses for the unpublished, mutable function code.
pub const UNPUBLISHED_VERSION: &str = "$LATEST";
pub const SUCCESS_STATUS_CODE: u16 = 200;

/// One function within one region, as reported by the function listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
    pub latest_version: String,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, latest_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latest_version: latest_version.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasRef {
    pub alias_name: String,
    pub target_version: String,
}

/// A single page of a marker-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_marker
            .as_deref()
            .map(|marker| !marker.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PruneResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl PruneResponse {
    pub fn success(deleted_versions: usize) -> Self {
        Self {
            status_code: SUCCESS_STATUS_CODE,
            body: summary_body(deleted_versions),
        }
    }
}

pub fn summary_body(deleted_versions: usize) -> String {
    format!("Deleted {deleted_versions} old versions.")
}
