use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PruneError {
    #[error("failed to list {resource} in region {region}: {message}")]
    RemoteListing {
        resource: String,
        region: String,
        message: String,
    },

    #[error(
        "failed to delete version {version} of function {function_name} in region {region}: {message}"
    )]
    RemoteDeletion {
        version: String,
        function_name: String,
        region: String,
        message: String,
    },

    #[error(
        "refusing to delete unqualified version '{version}' of function {function_name} in region {region}"
    )]
    UnqualifiedVersion {
        version: String,
        function_name: String,
        region: String,
    },
}

impl PruneError {
    pub fn is_listing(&self) -> bool {
        matches!(self, Self::RemoteListing { .. })
    }
}
