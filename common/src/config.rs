// Configuration management with layered configuration (defaults, file, env)

use crate::features::FeatureKind;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub bridge: BridgeConfig,
    pub features: FeaturesConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Initial answer to "is polling permitted"
    pub enabled: bool,
    pub transport: TransportKind,
    pub send_timeout_ms: u64,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Log,
    Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub motion: FeatureConfig,
    pub bluetooth: FeatureConfig,
    pub ar_session: FeatureConfig,
    pub audio_session: FeatureConfig,
}

impl FeaturesConfig {
    pub fn get(&self, kind: FeatureKind) -> &FeatureConfig {
        match kind {
            FeatureKind::Motion => &self.motion,
            FeatureKind::Bluetooth => &self.bluetooth,
            FeatureKind::ArSession => &self.ar_session,
            FeatureKind::AudioSession => &self.audio_session,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, &FeatureConfig)> {
        FeatureKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub namespace: String,
    pub interval_ms: u64,
    /// Start polling as soon as the manager is built
    #[serde(default)]
    pub auto_start: bool,
}

fn default_true() -> bool {
    true
}

impl FeatureConfig {
    pub fn new(namespace: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            enabled: true,
            namespace: namespace.into(),
            interval_ms,
            auto_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: Option<u16>,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides, not committed
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("BRIDGE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.bridge.send_timeout_ms == 0 {
            return Err("Bridge send_timeout_ms must be greater than 0".to_string());
        }
        if self.bridge.channel_capacity == 0 {
            return Err("Bridge channel_capacity must be greater than 0".to_string());
        }

        let mut namespaces = HashSet::new();
        for (kind, feature) in self.features.iter() {
            if !feature.enabled {
                continue;
            }
            if feature.interval_ms == 0 {
                return Err(format!("Feature {} interval_ms must be greater than 0", kind));
            }
            if feature.namespace.is_empty() {
                return Err(format!("Feature {} namespace cannot be empty", kind));
            }
            if !namespaces.insert(feature.namespace.as_str()) {
                return Err(format!(
                    "Feature {} reuses namespace '{}'",
                    kind, feature.namespace
                ));
            }
        }

        if self.observability.metrics_port == Some(0) {
            return Err("Metrics port must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig {
                enabled: true,
                transport: TransportKind::Log,
                send_timeout_ms: 5_000,
                channel_capacity: 64,
            },
            features: FeaturesConfig {
                motion: FeatureConfig::new("motion", 100),
                bluetooth: FeatureConfig::new("bluetooth", 1_000),
                ar_session: FeatureConfig::new("ar", 200),
                audio_session: FeatureConfig::new("audio", 500),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: None,
                tracing_endpoint: None,
            },
        }
    }
}
