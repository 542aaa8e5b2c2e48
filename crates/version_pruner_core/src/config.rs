use thiserror::Error;

pub const RETENTION_COUNT_KEY: &str = "RETENTION_COUNT";
pub const REGION_LIST_KEY: &str = "REGION_LIST";
pub const LOG_FORMAT_KEY: &str = "PRUNER_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be configured")]
    Missing { key: &'static str },
    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunerConfig {
    pub retention_count: usize,
    pub regions: Vec<String>,
    pub log_format: LogFormat,
}

impl PrunerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let retention_count = parse_retention_count(lookup(RETENTION_COUNT_KEY))?;
        let regions = parse_region_list(lookup(REGION_LIST_KEY))?;
        let log_format = parse_log_format(lookup(LOG_FORMAT_KEY))?;

        Ok(Self {
            retention_count,
            regions,
            log_format,
        })
    }
}

fn parse_retention_count(raw: Option<String>) -> Result<usize, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing {
        key: RETENTION_COUNT_KEY,
    })?;
    let count = raw
        .trim()
        .parse::<usize>()
        .map_err(|error| ConfigError::Invalid {
            key: RETENTION_COUNT_KEY,
            message: format!("'{raw}' is not a non-negative integer: {error}"),
        })?;
    if count == 0 {
        return Err(ConfigError::Invalid {
            key: RETENTION_COUNT_KEY,
            message: "must be a positive integer".to_string(),
        });
    }
    Ok(count)
}

fn parse_region_list(raw: Option<String>) -> Result<Vec<String>, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing {
        key: REGION_LIST_KEY,
    })?;

    let mut regions: Vec<String> = Vec::new();
    for region in raw.split(',').map(str::trim) {
        if region.is_empty() || regions.iter().any(|existing| existing == region) {
            continue;
        }
        regions.push(region.to_string());
    }

    if regions.is_empty() {
        return Err(ConfigError::Invalid {
            key: REGION_LIST_KEY,
            message: "must list at least one region".to_string(),
        });
    }
    Ok(regions)
}

fn parse_log_format(raw: Option<String>) -> Result<LogFormat, ConfigError> {
    let Some(raw) = raw else {
        return Ok(LogFormat::default());
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "json" => Ok(LogFormat::Json),
        "pretty" => Ok(LogFormat::Pretty),
        other => Err(ConfigError::Invalid {
            key: LOG_FORMAT_KEY,
            message: format!("unknown log format '{other}', expected 'json' or 'pretty'"),
        }),
    }
}
