use std::collections::BTreeSet;

use crate::contract::{FunctionRef, UNPUBLISHED_VERSION};
use crate::ordering::sort_newest_first;

pub type AliasVersionSet = BTreeSet<String>;

/// Partition of one function's published versions at the retention cutoff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunePlan {
    /// The `retention_count` newest versions.
    pub retained: Vec<String>,
    /// Versions past the cutoff that an alias still points at.
    pub alias_protected: Vec<String>,
    /// Versions past the cutoff with no alias, newest first.
    pub to_delete: Vec<String>,
}

impl PrunePlan {
    pub fn eligible_count(&self) -> usize {
        self.alias_protected.len() + self.to_delete.len()
    }
}

/// Builds the version list for `function`: drops the function's latest version and
/// the unpublished marker, then orders what remains newest first.
pub fn published_versions(
    function: &FunctionRef,
    listed: impl IntoIterator<Item = String>,
) -> Vec<String> {
    let mut versions: Vec<String> = listed
        .into_iter()
        .filter(|version| version != &function.latest_version && version != UNPUBLISHED_VERSION)
        .collect();
    sort_newest_first(&mut versions);
    versions
}

/// `versions` must already be sorted newest first with the latest version removed.
pub fn plan_deletions(
    versions: &[String],
    retention_count: usize,
    alias_versions: &AliasVersionSet,
) -> PrunePlan {
    let cutoff = retention_count.min(versions.len());
    let (retained, eligible) = versions.split_at(cutoff);

    let (alias_protected, to_delete) = eligible
        .iter()
        .cloned()
        .partition(|version| alias_versions.contains(version));

    PrunePlan {
        retained: retained.to_vec(),
        alias_protected,
        to_delete,
    }
}
