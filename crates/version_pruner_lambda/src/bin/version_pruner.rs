use std::collections::BTreeMap;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::{AliasConfiguration, FunctionConfiguration};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, info_span};
use version_pruner_lambda::adapters::function_host::FunctionHost;
use version_pruner_lambda::handlers::prune::handle_prune_event;
use version_pruner_lambda::observability::init_logging;
use version_pruner_lambda::runtime::config::{LogFormat, PrunerConfig};
use version_pruner_lambda::runtime::contract::{
    AliasRef, FunctionRef, Page, PruneResponse, UNPUBLISHED_VERSION,
};

/// One Lambda client per configured region, built once at cold start.
struct AwsFunctionHost {
    clients: BTreeMap<String, aws_sdk_lambda::Client>,
}

impl AwsFunctionHost {
    async fn connect(regions: &[String]) -> Self {
        let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let clients = regions
            .iter()
            .map(|region| {
                let lambda_config = aws_sdk_lambda::config::Builder::from(&shared_config)
                    .region(Region::new(region.clone()))
                    .build();
                (
                    region.clone(),
                    aws_sdk_lambda::Client::from_conf(lambda_config),
                )
            })
            .collect();
        Self { clients }
    }

    fn client(&self, region: &str) -> Result<aws_sdk_lambda::Client, String> {
        self.clients
            .get(region)
            .cloned()
            .ok_or_else(|| format!("no lambda client configured for region {region}"))
    }
}

impl FunctionHost for AwsFunctionHost {
    fn list_functions(
        &self,
        region: &str,
        marker: Option<&str>,
    ) -> Result<Page<FunctionRef>, String> {
        let client = self.client(region)?;
        let marker = marker.map(str::to_string);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .list_functions()
                    .set_marker(marker)
                    .send()
                    .await
                    .map(|output| Page {
                        items: output.functions().iter().filter_map(function_ref).collect(),
                        next_marker: output.next_marker().map(str::to_string),
                    })
                    .map_err(|error| {
                        format!("failed to list functions: {}", DisplayErrorContext(&error))
                    })
            })
        })
    }

    fn list_versions(
        &self,
        region: &str,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<String>, String> {
        let client = self.client(region)?;
        let function_name = function_name.to_string();
        let marker = marker.map(str::to_string);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .list_versions_by_function()
                    .function_name(function_name)
                    .set_marker(marker)
                    .send()
                    .await
                    .map(|output| Page {
                        items: output
                            .versions()
                            .iter()
                            .filter_map(|version| version.version().map(str::to_string))
                            .collect(),
                        next_marker: output.next_marker().map(str::to_string),
                    })
                    .map_err(|error| {
                        format!("failed to list versions: {}", DisplayErrorContext(&error))
                    })
            })
        })
    }

    fn list_aliases(
        &self,
        region: &str,
        function_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<AliasRef>, String> {
        let client = self.client(region)?;
        let function_name = function_name.to_string();
        let marker = marker.map(str::to_string);

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .list_aliases()
                    .function_name(function_name)
                    .set_marker(marker)
                    .send()
                    .await
                    .map(|output| Page {
                        items: output.aliases().iter().flat_map(alias_refs).collect(),
                        next_marker: output.next_marker().map(str::to_string),
                    })
                    .map_err(|error| {
                        format!("failed to list aliases: {}", DisplayErrorContext(&error))
                    })
            })
        })
    }

    fn delete_version(
        &self,
        region: &str,
        function_name: &str,
        version: &str,
    ) -> Result<(), String> {
        let client = self.client(region)?;
        let function_name = function_name.to_string();
        let version = version.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_function()
                    .function_name(function_name)
                    .qualifier(version)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        format!("failed to delete version: {}", DisplayErrorContext(&error))
                    })
            })
        })
    }
}

fn function_ref(function: &FunctionConfiguration) -> Option<FunctionRef> {
    let name = function.function_name()?;
    Some(FunctionRef::new(
        name,
        function.version().unwrap_or(UNPUBLISHED_VERSION),
    ))
}

/// An alias with weighted routing sends traffic to a second version too, so both count.
fn alias_refs(alias: &AliasConfiguration) -> Vec<AliasRef> {
    let alias_name = alias.name().unwrap_or_default().to_string();
    let mut refs: Vec<AliasRef> = alias
        .function_version()
        .map(|version| AliasRef {
            alias_name: alias_name.clone(),
            target_version: version.to_string(),
        })
        .into_iter()
        .collect();

    if let Some(weights) = alias
        .routing_config()
        .and_then(|routing| routing.additional_version_weights())
    {
        refs.extend(weights.keys().map(|version| AliasRef {
            alias_name: alias_name.clone(),
            target_version: version.clone(),
        }));
    }
    refs
}

struct RuntimeDependencies {
    config: PrunerConfig,
    host: AwsFunctionHost,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<PruneResponse, Error> {
    let LambdaEvent { payload, context } = event;
    let span = info_span!("prune_invocation", request_id = %context.request_id);

    span.in_scope(|| {
        info!(
            event = "pruner.invocation_received",
            function_arn = %context.invoked_function_arn,
            retention_count = deps.config.retention_count,
            regions = ?deps.config.regions,
            payload = %payload,
        );
        handle_prune_event(&deps.host, &deps.config).map_err(Error::from)
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = match PrunerConfig::from_env() {
        Ok(value) => value,
        Err(config_error) => {
            init_logging(LogFormat::default());
            error!(event = "pruner.config_invalid", error = %config_error);
            return Err(Error::from(config_error));
        }
    };
    init_logging(config.log_format);

    let host = AwsFunctionHost::connect(&config.regions).await;
    let deps = RuntimeDependencies { config, host };
    let deps = &deps;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle_request(event, deps).await
    }))
    .await
}
