use crate::error::DaemonError;
use mms_core::apn::{ApnEntry, ApnTable};
use mms_core::config::{ConfigValue, MmsConfig, SubscriptionId};
use mms_core::engine::RetryPolicy;
use mms_core::host::PersistPolicy;
use mms_core::http::HttpParamMacros;
use mms_core::network::ReservationTimeouts;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SUBSCRIPTION: SubscriptionId = SubscriptionId(1);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub apns: Vec<ApnEntry>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub auto_persist: bool,
    pub default_sms_app: Option<String>,
    pub line1: Option<String>,
    pub nai: Option<String>,
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default)]
    pub apn_name: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_acquire_grace_secs")]
    pub acquire_grace_secs: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            apn_name: None,
            request_timeout_secs: default_request_timeout_secs(),
            acquire_grace_secs: default_acquire_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

/// Carrier config overrides for one subscription, keyed by MMS config key.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSection {
    pub id: SubscriptionId,
    #[serde(default)]
    pub values: BTreeMap<String, ConfigValue>,
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_acquire_grace_secs() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_secs() -> u64 {
    2
}

impl DaemonConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| DaemonError::ConfigRead { path: path.to_path_buf(), source })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DaemonError> {
        if self.retry.max_attempts == 0 {
            return Err(DaemonError::ConfigInvalid("retry.max_attempts must be at least 1".into()));
        }
        if self.network.request_timeout_secs == 0 {
            return Err(DaemonError::ConfigInvalid(
                "network.request_timeout_secs must be positive".into(),
            ));
        }
        let mut seen = HashSet::new();
        for subscription in &self.subscriptions {
            if !seen.insert(subscription.id) {
                return Err(DaemonError::ConfigInvalid(format!(
                    "subscription {} listed twice",
                    subscription.id.0
                )));
            }
        }
        Ok(())
    }

    pub fn timeouts(&self) -> ReservationTimeouts {
        ReservationTimeouts {
            request_timeout: Duration::from_secs(self.network.request_timeout_secs),
            acquire_grace: Duration::from_secs(self.network.acquire_grace_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            initial_delay: Duration::from_secs(self.retry.initial_delay_secs),
        }
    }

    pub fn persist_policy(&self) -> PersistPolicy {
        PersistPolicy {
            auto_persist: self.service.auto_persist,
            default_sms_app: self.service.default_sms_app.clone(),
        }
    }

    pub fn http_macros(&self) -> HttpParamMacros {
        HttpParamMacros { line1: self.service.line1.clone(), nai: self.service.nai.clone() }
    }

    pub fn apn_table(&self) -> ApnTable {
        ApnTable::new(self.apns.clone())
    }

    /// One config per listed subscription; a single default subscription
    /// when the file lists none.
    pub fn mms_configs(&self) -> Vec<MmsConfig> {
        if self.subscriptions.is_empty() {
            return vec![MmsConfig::new(DEFAULT_SUBSCRIPTION)];
        }
        self.subscriptions
            .iter()
            .map(|subscription| MmsConfig::with_values(subscription.id, subscription.values.clone()))
            .collect()
    }

    pub fn default_subscription(&self) -> SubscriptionId {
        self.subscriptions.first().map(|subscription| subscription.id).unwrap_or(DEFAULT_SUBSCRIPTION)
    }

    pub fn database_path(&self) -> PathBuf {
        self.service.database.clone().unwrap_or_else(default_database_path)
    }
}

pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|base| base.join("mmsd").join("mmsd.db"))
        .unwrap_or_else(|| PathBuf::from("mmsd.db"))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("mmsd").join("mmsd.toml"))
}
