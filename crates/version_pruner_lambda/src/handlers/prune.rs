use tracing::{error, info};

use crate::adapters::function_host::FunctionHost;
use crate::error::PruneError;
use crate::runtime::config::PrunerConfig;
use crate::runtime::contract::{FunctionRef, Page, PruneResponse, UNPUBLISHED_VERSION};
use crate::runtime::policy::{plan_deletions, published_versions, AliasVersionSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSummary {
    pub region: String,
    pub functions_scanned: usize,
    pub versions_deleted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub regions: Vec<RegionSummary>,
}

impl PruneSummary {
    pub fn total_deleted(&self) -> usize {
        self.regions
            .iter()
            .map(|region| region.versions_deleted)
            .sum()
    }
}

/// Runs one full pruning pass and builds the invocation response.
pub fn handle_prune_event(
    host: &impl FunctionHost,
    config: &PrunerConfig,
) -> Result<PruneResponse, PruneError> {
    let summary = prune_all_regions(host, config)?;
    let total_deleted = summary.total_deleted();
    info!(
        event = "pruner.run_completed",
        regions = summary.regions.len(),
        versions_deleted = total_deleted,
    );
    Ok(PruneResponse::success(total_deleted))
}

/// Regions are processed in configured order; the first error aborts the rest.
pub fn prune_all_regions(
    host: &impl FunctionHost,
    config: &PrunerConfig,
) -> Result<PruneSummary, PruneError> {
    let mut summary = PruneSummary::default();
    for region in &config.regions {
        summary
            .regions
            .push(prune_region(host, region, config.retention_count)?);
    }
    Ok(summary)
}

pub fn prune_region(
    host: &impl FunctionHost,
    region: &str,
    retention_count: usize,
) -> Result<RegionSummary, PruneError> {
    info!(event = "pruner.region_scan_started", region = region);

    let functions = list_all_functions(host, region)?;
    let mut summary = RegionSummary {
        region: region.to_string(),
        functions_scanned: functions.len(),
        versions_deleted: 0,
    };

    for function in &functions {
        summary.versions_deleted += prune_function(host, function, region, retention_count)?;
    }

    info!(
        event = "pruner.region_scan_completed",
        region = region,
        functions_scanned = summary.functions_scanned,
        versions_deleted = summary.versions_deleted,
    );
    Ok(summary)
}

/// Returns the number of versions deleted for `function`.
pub fn prune_function(
    host: &impl FunctionHost,
    function: &FunctionRef,
    region: &str,
    retention_count: usize,
) -> Result<usize, PruneError> {
    let versions = list_function_versions(host, function, region)?;
    let alias_versions = resolve_alias_versions(host, &function.name, region)?;
    let plan = plan_deletions(&versions, retention_count, &alias_versions);

    info!(
        event = "pruner.function_evaluated",
        region = region,
        function_name = %function.name,
        published_versions = versions.len(),
        eligible = plan.eligible_count(),
        alias_protected = plan.alias_protected.len(),
    );

    for version in &plan.alias_protected {
        info!(
            event = "pruner.version_alias_protected",
            region = region,
            function_name = %function.name,
            version = %version,
        );
    }

    for version in &plan.to_delete {
        delete_function_version(host, version, &function.name, region)?;
        info!(
            event = "pruner.version_deleted",
            region = region,
            function_name = %function.name,
            version = %version,
        );
    }

    Ok(plan.to_delete.len())
}

/// Function Enumerator: every function in `region`, across all pages.
pub fn list_all_functions(
    host: &impl FunctionHost,
    region: &str,
) -> Result<Vec<FunctionRef>, PruneError> {
    collect_pages(|marker| host.list_functions(region, marker)).map_err(|message| {
        error!(
            event = "pruner.list_functions_failed",
            region = region,
            error = %message,
        );
        PruneError::RemoteListing {
            resource: "functions".to_string(),
            region: region.to_string(),
            message,
        }
    })
}

/// Version Enumerator: published versions of `function`, latest excluded, newest first.
pub fn list_function_versions(
    host: &impl FunctionHost,
    function: &FunctionRef,
    region: &str,
) -> Result<Vec<String>, PruneError> {
    let listed = collect_pages(|marker| host.list_versions(region, &function.name, marker))
        .map_err(|message| {
            error!(
                event = "pruner.list_versions_failed",
                region = region,
                function_name = %function.name,
                error = %message,
            );
            PruneError::RemoteListing {
                resource: format!("versions of function {}", function.name),
                region: region.to_string(),
                message,
            }
        })?;
    Ok(published_versions(function, listed))
}

/// Alias Version Resolver: versions targeted by any alias of `function_name`.
pub fn resolve_alias_versions(
    host: &impl FunctionHost,
    function_name: &str,
    region: &str,
) -> Result<AliasVersionSet, PruneError> {
    let aliases = collect_pages(|marker| host.list_aliases(region, function_name, marker))
        .map_err(|message| {
            error!(
                event = "pruner.list_aliases_failed",
                region = region,
                function_name = function_name,
                error = %message,
            );
            PruneError::RemoteListing {
                resource: format!("aliases of function {function_name}"),
                region: region.to_string(),
                message,
            }
        })?;
    Ok(aliases
        .into_iter()
        .map(|alias| alias.target_version)
        .collect())
}

/// Version Deleter. Never issues a delete without a published version qualifier.
pub fn delete_function_version(
    host: &impl FunctionHost,
    version: &str,
    function_name: &str,
    region: &str,
) -> Result<(), PruneError> {
    if version.trim().is_empty() || version == UNPUBLISHED_VERSION {
        error!(
            event = "pruner.unqualified_delete_refused",
            region = region,
            function_name = function_name,
            version = version,
        );
        return Err(PruneError::UnqualifiedVersion {
            version: version.to_string(),
            function_name: function_name.to_string(),
            region: region.to_string(),
        });
    }

    host.delete_version(region, function_name, version)
        .map_err(|message| {
            error!(
                event = "pruner.delete_version_failed",
                region = region,
                function_name = function_name,
                version = version,
                error = %message,
            );
            PruneError::RemoteDeletion {
                version: version.to_string(),
                function_name: function_name.to_string(),
                region: region.to_string(),
                message,
            }
        })
}

fn collect_pages<T>(
    mut fetch_page: impl FnMut(Option<&str>) -> Result<Page<T>, String>,
) -> Result<Vec<T>, String> {
    let mut items = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let page = fetch_page(marker.as_deref())?;
        let has_more = page.has_more();
        items.extend(page.items);
        if !has_more {
            return Ok(items);
        }
        if page.next_marker == marker {
            return Err(format!(
                "pagination marker {:?} did not advance",
                page.next_marker.unwrap_or_default()
            ));
        }
        marker = page.next_marker;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::*;
    use crate::runtime::config::LogFormat;
    use crate::runtime::contract::AliasRef;

    #[derive(Debug, Clone)]
    struct FakeFunction {
        latest_version: String,
        versions: Vec<String>,
        aliases: Vec<AliasRef>,
    }

    #[derive(Debug, Clone)]
    enum FailOn {
        ListFunctions(&'static str),
        ListVersions(&'static str),
        ListAliases(&'static str),
        Delete(&'static str, &'static str),
    }

    struct FakeHost {
        regions: Mutex<BTreeMap<String, BTreeMap<String, FakeFunction>>>,
        page_size: usize,
        fail_on: Option<FailOn>,
        deletions: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeHost {
        fn new(page_size: usize) -> Self {
            Self {
                regions: Mutex::new(BTreeMap::new()),
                page_size,
                fail_on: None,
                deletions: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, fail_on: FailOn) -> Self {
            self.fail_on = Some(fail_on);
            self
        }

        fn with_function(
            self,
            region: &str,
            name: &str,
            latest_version: &str,
            versions: &[&str],
            alias_targets: &[&str],
        ) -> Self {
            let function = FakeFunction {
                latest_version: latest_version.to_string(),
                versions: versions.iter().map(|value| value.to_string()).collect(),
                aliases: alias_targets
                    .iter()
                    .enumerate()
                    .map(|(index, target)| AliasRef {
                        alias_name: format!("alias-{index}"),
                        target_version: target.to_string(),
                    })
                    .collect(),
            };
            self.regions
                .lock()
                .expect("poisoned mutex")
                .entry(region.to_string())
                .or_default()
                .insert(name.to_string(), function);
            self
        }

        fn deletions(&self) -> Vec<(String, String, String)> {
            self.deletions.lock().expect("poisoned mutex").clone()
        }

        fn deleted_versions(&self, region: &str, function_name: &str) -> BTreeSet<String> {
            self.deletions()
                .into_iter()
                .filter(|(r, f, _)| r == region && f == function_name)
                .map(|(_, _, version)| version)
                .collect()
        }

        fn function(&self, region: &str, function_name: &str) -> Result<FakeFunction, String> {
            self.regions
                .lock()
                .expect("poisoned mutex")
                .get(region)
                .and_then(|functions| functions.get(function_name))
                .cloned()
                .ok_or_else(|| format!("function {function_name} not found"))
        }

        fn page<T: Clone>(&self, items: &[T], marker: Option<&str>) -> Page<T> {
            let start = marker
                .map(|value| value.parse::<usize>().expect("fake marker is an offset"))
                .unwrap_or(0);
            let end = (start + self.page_size).min(items.len());
            Page {
                items: items[start..end].to_vec(),
                next_marker: (end < items.len()).then(|| end.to_string()),
            }
        }
    }

    impl FunctionHost for FakeHost {
        fn list_functions(
            &self,
            region: &str,
            marker: Option<&str>,
        ) -> Result<Page<FunctionRef>, String> {
            if matches!(&self.fail_on, Some(FailOn::ListFunctions(name)) if *name == region) {
                return Err("service unavailable".to_string());
            }
            let functions: Vec<FunctionRef> = self
                .regions
                .lock()
                .expect("poisoned mutex")
                .get(region)
                .map(|functions| {
                    functions
                        .iter()
                        .map(|(name, function)| {
                            FunctionRef::new(name.clone(), function.latest_version.clone())
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(self.page(&functions, marker))
        }

        fn list_versions(
            &self,
            region: &str,
            function_name: &str,
            marker: Option<&str>,
        ) -> Result<Page<String>, String> {
            if matches!(&self.fail_on, Some(FailOn::ListVersions(name)) if *name == function_name) {
                return Err("access denied".to_string());
            }
            let function = self.function(region, function_name)?;
            let mut listed = vec![UNPUBLISHED_VERSION.to_string()];
            listed.extend(function.versions);
            Ok(self.page(&listed, marker))
        }

        fn list_aliases(
            &self,
            region: &str,
            function_name: &str,
            marker: Option<&str>,
        ) -> Result<Page<AliasRef>, String> {
            if matches!(&self.fail_on, Some(FailOn::ListAliases(name)) if *name == function_name) {
                return Err("throttled".to_string());
            }
            let function = self.function(region, function_name)?;
            Ok(self.page(&function.aliases, marker))
        }

        fn delete_version(
            &self,
            region: &str,
            function_name: &str,
            version: &str,
        ) -> Result<(), String> {
            if let Some(FailOn::Delete(failing_function, failing_version)) = &self.fail_on {
                if *failing_function == function_name && *failing_version == version {
                    return Err("resource conflict".to_string());
                }
            }

            let mut regions = self.regions.lock().expect("poisoned mutex");
            let function = regions
                .get_mut(region)
                .and_then(|functions| functions.get_mut(function_name))
                .ok_or_else(|| format!("function {function_name} not found"))?;
            let Some(position) = function.versions.iter().position(|value| value == version)
            else {
                return Err(format!("version {version} not found"));
            };
            function.versions.remove(position);
            drop(regions);

            self.deletions.lock().expect("poisoned mutex").push((
                region.to_string(),
                function_name.to_string(),
                version.to_string(),
            ));
            Ok(())
        }
    }

    fn config(retention_count: usize, regions: &[&str]) -> PrunerConfig {
        PrunerConfig {
            retention_count,
            regions: regions.iter().map(|value| value.to_string()).collect(),
            log_format: LogFormat::Json,
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn prunes_single_region_scenario() {
        let host = FakeHost::new(2).with_function(
            "us-east-1",
            "f",
            "7",
            &["1", "2", "3", "4", "5", "6", "7"],
            &["4"],
        );

        let response =
            handle_prune_event(&host, &config(3, &["us-east-1"])).expect("run should succeed");

        assert_eq!(response, PruneResponse::success(3));
        assert_eq!(response.body, "Deleted 3 old versions.");
        assert_eq!(host.deleted_versions("us-east-1", "f"), set(&["3", "2", "1"]));
    }

    #[test]
    fn alias_protected_versions_survive_regardless_of_rank() {
        let host = FakeHost::new(10).with_function(
            "us-east-1",
            "orders",
            "6",
            &["1", "2", "3", "4", "5", "6"],
            &["2"],
        );

        let summary = prune_all_regions(&host, &config(2, &["us-east-1"]))
            .expect("run should succeed");

        assert_eq!(summary.total_deleted(), 2);
        assert_eq!(host.deleted_versions("us-east-1", "orders"), set(&["3", "1"]));
    }

    #[test]
    fn functions_within_retention_are_untouched() {
        let host = FakeHost::new(1)
            .with_function("us-east-1", "small", "3", &["1", "2", "3"], &[])
            .with_function("us-east-1", "unpublished", "$LATEST", &[], &[]);

        let summary = prune_all_regions(&host, &config(2, &["us-east-1"]))
            .expect("run should succeed");

        assert_eq!(summary.total_deleted(), 0);
        assert_eq!(summary.regions[0].functions_scanned, 2);
        assert!(host.deletions().is_empty());
    }

    #[test]
    fn every_eligible_version_protected_deletes_nothing() {
        let host = FakeHost::new(3).with_function(
            "eu-west-1",
            "api",
            "5",
            &["1", "2", "3", "4", "5"],
            &["1", "2"],
        );

        let response =
            handle_prune_event(&host, &config(2, &["eu-west-1"])).expect("run should succeed");

        assert_eq!(response.body, "Deleted 0 old versions.");
        assert!(host.deletions().is_empty());
    }

    #[test]
    fn version_listing_follows_pagination_and_sorts_numerically() {
        let host = FakeHost::new(2).with_function(
            "us-east-1",
            "f",
            "11",
            &["1", "2", "9", "10", "11"],
            &[],
        );

        let versions = list_function_versions(&host, &FunctionRef::new("f", "11"), "us-east-1")
            .expect("listing should succeed");

        assert_eq!(versions, vec!["10", "9", "2", "1"]);
    }

    #[test]
    fn alias_listing_follows_pagination() {
        let host = FakeHost::new(1).with_function(
            "us-east-1",
            "f",
            "9",
            &["1", "2", "3", "4", "5", "6", "7", "8", "9"],
            &["1", "2", "3"],
        );

        let aliases =
            resolve_alias_versions(&host, "f", "us-east-1").expect("aliases should resolve");
        assert_eq!(aliases, set(&["1", "2", "3"]));

        prune_all_regions(&host, &config(1, &["us-east-1"])).expect("run should succeed");
        assert!(host
            .deleted_versions("us-east-1", "f")
            .is_disjoint(&set(&["1", "2", "3"])));
    }

    #[test]
    fn function_listing_follows_pagination_across_regions() {
        let host = FakeHost::new(1)
            .with_function("us-east-1", "a", "4", &["1", "2", "3", "4"], &[])
            .with_function("us-east-1", "b", "3", &["1", "2", "3"], &[])
            .with_function("eu-west-1", "c", "4", &["2", "3", "4"], &[]);

        let summary = prune_all_regions(&host, &config(1, &["us-east-1", "eu-west-1"]))
            .expect("run should succeed");

        assert_eq!(
            summary.regions,
            vec![
                RegionSummary {
                    region: "us-east-1".to_string(),
                    functions_scanned: 2,
                    versions_deleted: 3,
                },
                RegionSummary {
                    region: "eu-west-1".to_string(),
                    functions_scanned: 1,
                    versions_deleted: 1,
                },
            ]
        );
        assert_eq!(host.deleted_versions("us-east-1", "a"), set(&["2", "1"]));
        assert_eq!(host.deleted_versions("eu-west-1", "c"), set(&["2"]));
    }

    #[test]
    fn second_run_deletes_nothing_and_never_repeats_a_deletion() {
        let host = FakeHost::new(2)
            .with_function("us-east-1", "f", "8", &["1", "2", "3", "4", "5", "6", "7", "8"], &["2"])
            .with_function("us-east-1", "g", "3", &["1", "2", "3"], &[]);
        let config = config(2, &["us-east-1"]);

        let first = handle_prune_event(&host, &config).expect("first run should succeed");
        let after_first = host.deletions();
        let second = handle_prune_event(&host, &config).expect("second run should succeed");

        assert_eq!(first.body, "Deleted 4 old versions.");
        assert_eq!(second.body, "Deleted 0 old versions.");
        assert_eq!(host.deletions(), after_first);

        let unique: BTreeSet<_> = after_first.iter().cloned().collect();
        assert_eq!(unique.len(), after_first.len());
    }

    #[test]
    fn function_listing_failure_aborts_before_any_deletion() {
        let host = FakeHost::new(5)
            .with_function("us-east-1", "f", "5", &["1", "2", "3", "4", "5"], &[])
            .failing(FailOn::ListFunctions("us-east-1"));

        let error = handle_prune_event(&host, &config(1, &["us-east-1"]))
            .expect_err("listing failure should abort");

        assert!(error.is_listing());
        assert!(error.to_string().contains("failed to list functions in region us-east-1"));
        assert!(host.deletions().is_empty());
    }

    #[test]
    fn version_listing_failure_names_function_and_region() {
        let host = FakeHost::new(5)
            .with_function("us-east-1", "broken", "3", &["1", "2", "3"], &[])
            .failing(FailOn::ListVersions("broken"));

        let error = prune_all_regions(&host, &config(1, &["us-east-1"]))
            .expect_err("listing failure should abort");

        assert_eq!(
            error,
            PruneError::RemoteListing {
                resource: "versions of function broken".to_string(),
                region: "us-east-1".to_string(),
                message: "access denied".to_string(),
            }
        );
    }

    #[test]
    fn alias_listing_failure_prevents_deletions_for_that_function() {
        let host = FakeHost::new(5)
            .with_function("us-east-1", "f", "5", &["1", "2", "3", "4", "5"], &[])
            .failing(FailOn::ListAliases("f"));

        let error = prune_all_regions(&host, &config(1, &["us-east-1"]))
            .expect_err("alias failure should abort");

        assert!(error.to_string().contains("aliases of function f"));
        assert!(host.deletions().is_empty());
    }

    #[test]
    fn deletion_failure_aborts_remaining_functions_and_regions() {
        let host = FakeHost::new(10)
            .with_function("us-east-1", "a", "4", &["1", "2", "3", "4"], &[])
            .with_function("us-east-1", "b", "4", &["1", "2", "3", "4"], &[])
            .with_function("eu-west-1", "c", "4", &["1", "2", "3", "4"], &[])
            .failing(FailOn::Delete("a", "1"));

        let error = handle_prune_event(&host, &config(1, &["us-east-1", "eu-west-1"]))
            .expect_err("deletion failure should abort");

        assert_eq!(
            error,
            PruneError::RemoteDeletion {
                version: "1".to_string(),
                function_name: "a".to_string(),
                region: "us-east-1".to_string(),
                message: "resource conflict".to_string(),
            }
        );
        assert_eq!(
            host.deletions(),
            vec![("us-east-1".to_string(), "a".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn deleter_refuses_unqualified_versions() {
        let host = FakeHost::new(5).with_function("us-east-1", "f", "2", &["1", "2"], &[]);

        for version in [UNPUBLISHED_VERSION, "", "  "] {
            let error = delete_function_version(&host, version, "f", "us-east-1")
                .expect_err("unqualified delete should be refused");
            assert!(matches!(error, PruneError::UnqualifiedVersion { .. }));
        }
        assert!(host.deletions().is_empty());
    }

    #[test]
    fn stalled_pagination_marker_is_reported() {
        let result: Result<Vec<String>, String> = collect_pages(|_| {
            Ok(Page {
                items: vec!["1".to_string()],
                next_marker: Some("same".to_string()),
            })
        });
        let calls = std::cell::Cell::new(0);
        let stalled: Result<Vec<String>, String> = collect_pages(|marker| {
            calls.set(calls.get() + 1);
            Ok(Page {
                items: Vec::new(),
                next_marker: Some(marker.unwrap_or("first").to_string()),
            })
        });

        assert!(result.is_err());
        assert!(stalled.expect_err("stalled marker").contains("did not advance"));
        assert_eq!(calls.get(), 2);
    }
}
