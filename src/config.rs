//! Application configuration loaded from environment variables.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Log filter used when verbose logging is requested.
pub const VERBOSE_LOG_FILTER: &str = "control_plane=debug,info";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port for the control-plane routes.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log filter directive (`info`, `control_plane=debug,warn`, ...).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    // === Build Metadata ===
    /// Commit revision the app was built from.
    #[serde(default)]
    pub app_revision: String,

    /// Whether the build had uncommitted changes.
    #[serde(default)]
    pub app_uncommitted: bool,

    /// Compiler/build identifier.
    #[serde(default = "default_build_compiler")]
    pub build_compiler: String,

    /// Deployment identifier.
    #[serde(default)]
    pub deploy_id: String,

    // === Runtime Configuration ===
    /// Runtime config, supplied as a JSON document in `RUNTIME_CONFIG`.
    #[serde(default, deserialize_with = "deserialize_runtime_config")]
    pub runtime_config: Option<RuntimeConfig>,
}

/// Runtime configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuntimeConfig {
    /// Metrics settings.
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// Metrics section of the runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetricsConfig {
    /// JSON-based exporter settings. Absent means the `/metrics` route is off.
    #[serde(default)]
    pub json_based: Option<JsonBasedMetricsConfig>,
}

/// Settings for the JSON-based metrics exporter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JsonBasedMetricsConfig {
    /// Labels attached to every exported sample.
    #[serde(default)]
    pub static_labels: BTreeMap<String, String>,
}

/// Commit the app was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    pub revision: String,
    pub uncommitted: bool,
}

impl CommitInfo {
    /// Revision string, suffixed with `-modified` for dirty builds.
    pub fn as_revision_string(&self) -> String {
        if self.uncommitted {
            format!("{}-modified", self.revision)
        } else {
            self.revision.clone()
        }
    }
}

/// Static build and deploy metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetadata {
    pub commit: CommitInfo,
    pub compiler: String,
    pub deploy_id: String,
}

fn deserialize_runtime_config<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<RuntimeConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_build_compiler() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
            app_revision: String::new(),
            app_uncommitted: false,
            build_compiler: default_build_compiler(),
            deploy_id: String::new(),
            runtime_config: None,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<()> {
        if let Some(json_based) = self.json_based_metrics() {
            for key in json_based.static_labels.keys() {
                if key.is_empty() {
                    return Err(Error::InvalidConfig(
                        "static label keys must not be empty".to_string(),
                    ));
                }
                if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(Error::InvalidConfig(format!(
                        "static label key {key:?} may only contain ASCII letters, digits and '_'"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Filter directive for the log subscriber.
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            &self.rust_log
        }
    }

    /// JSON-based metrics settings, if runtime config, its metrics section
    /// and the JSON-based subsection are all present.
    pub fn json_based_metrics(&self) -> Option<&JsonBasedMetricsConfig> {
        self.runtime_config
            .as_ref()?
            .metrics
            .as_ref()?
            .json_based
            .as_ref()
    }

    /// Static build and deploy metadata.
    pub fn build_metadata(&self) -> BuildMetadata {
        BuildMetadata {
            commit: CommitInfo {
                revision: self.app_revision.clone(),
                uncommitted: self.app_uncommitted,
            },
            compiler: self.build_compiler.clone(),
            deploy_id: self.deploy_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    fn from_vars(vars: &[(&str, &str)]) -> std::result::Result<Config, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn defaults_apply_on_empty_environment() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(config.runtime_config.is_none());
        assert!(config.build_compiler.starts_with("control_plane/"));
    }

    #[test]
    fn runtime_config_is_parsed_from_json() {
        let config = from_vars(&[(
            "RUNTIME_CONFIG",
            r#"{"metrics":{"json_based":{"static_labels":{"env":"prod"}}}}"#,
        )])
        .unwrap();

        let json_based = config.json_based_metrics().unwrap();
        assert_eq!(json_based.static_labels["env"], "prod");
    }

    #[test]
    fn invalid_runtime_config_is_rejected() {
        assert!(from_vars(&[("RUNTIME_CONFIG", "{not json")]).is_err());
    }

    #[test]
    fn json_based_metrics_needs_every_level() {
        let mut config = Config::default();
        assert!(config.json_based_metrics().is_none());

        config.runtime_config = Some(RuntimeConfig { metrics: None });
        assert!(config.json_based_metrics().is_none());

        config.runtime_config = Some(RuntimeConfig {
            metrics: Some(MetricsConfig { json_based: None }),
        });
        assert!(config.json_based_metrics().is_none());

        config.runtime_config = Some(RuntimeConfig {
            metrics: Some(MetricsConfig {
                json_based: Some(JsonBasedMetricsConfig::default()),
            }),
        });
        assert!(config.json_based_metrics().is_some());
    }

    #[test]
    fn validate_rejects_bad_static_label_keys() {
        let mut labels = BTreeMap::new();
        labels.insert("bad key".to_string(), "v".to_string());
        let config = Config {
            runtime_config: Some(RuntimeConfig {
                metrics: Some(MetricsConfig {
                    json_based: Some(JsonBasedMetricsConfig {
                        static_labels: labels,
                    }),
                }),
            }),
            ..Config::default()
        };

        let err = assert_err!(config.validate());
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().starts_with("invalid configuration: static label key"));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn log_filter_follows_rust_log_and_verbose() {
        let config = from_vars(&[("RUST_LOG", "control_plane=trace,warn")]).unwrap();
        assert_eq!(config.log_filter(), "control_plane=trace,warn");

        let config = from_vars(&[("RUST_LOG", "warn"), ("VERBOSE", "true")]).unwrap();
        assert_eq!(config.log_filter(), VERBOSE_LOG_FILTER);

        assert_eq!(Config::default().log_filter(), "info");
    }

    #[test]
    fn revision_string_marks_dirty_builds() {
        let config = Config {
            app_revision: "abc123".to_string(),
            app_uncommitted: true,
            ..Config::default()
        };
        assert_eq!(
            config.build_metadata().commit.as_revision_string(),
            "abc123-modified"
        );
    }
}
