use crate::runtime::contract::{AliasRef, FunctionRef, Page};

/// Region-scoped view of the function hosting service.
///
/// Listing calls return one page per call; pass the previous page's
/// `next_marker` to continue. Errors are returned as messages and wrapped with
/// region/function context by the handlers.
pub trait FunctionHost {
    fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> Result<Page<FunctionRef>, String>;

    fn list_versions(
        &self,
        region: &str,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<String>, String>;

    fn list_aliases(
        &self,
        region: &str,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<AliasRef>, String>;

    /// Deletes one qualified, published version.
    fn delete_version(&self, region: &str, function_name: &str, version: &str)
        -> Result<(), String>;
}
