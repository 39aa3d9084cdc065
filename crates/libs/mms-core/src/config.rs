//! Per-subscription MMS configuration.
//!
//! Every subscription gets an immutable [`MmsConfig`] snapshot built from the
//! known key table below plus carrier overrides. Requests layer their own
//! [`ConfigOverrides`] on top, producing a [`ResolvedConfig`]. The
//! [`ConfigManager`] owns the process-wide subscription map and swaps it
//! wholesale on reload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub mod keys {
    pub const ENABLED_MMS: &str = "enabledMMS";
    pub const ENABLED_TRANS_ID: &str = "enabledTransID";
    pub const ENABLED_NOTIFY_WAP_MMSC: &str = "enabledNotifyWapMMSC";
    pub const ALIAS_ENABLED: &str = "aliasEnabled";
    pub const ALLOW_ATTACH_AUDIO: &str = "allowAttachAudio";
    pub const ENABLE_GROUP_MMS: &str = "enableGroupMms";
    pub const SUPPORT_MMS_CONTENT_DISPOSITION: &str = "supportMmsContentDisposition";
    pub const ENABLE_MMS_READ_REPORTS: &str = "enableMMSReadReports";
    pub const ENABLE_MMS_DELIVERY_REPORTS: &str = "enableMMSDeliveryReports";
    pub const MAX_MESSAGE_SIZE: &str = "maxMessageSize";
    pub const MAX_IMAGE_HEIGHT: &str = "maxImageHeight";
    pub const MAX_IMAGE_WIDTH: &str = "maxImageWidth";
    pub const RECIPIENT_LIMIT: &str = "recipientLimit";
    pub const HTTP_SOCKET_TIMEOUT: &str = "httpSocketTimeout";
    pub const MAX_SUBJECT_LENGTH: &str = "maxSubjectLength";
    pub const UA_PROF_TAG_NAME: &str = "uaProfTagName";
    pub const USER_AGENT: &str = "userAgent";
    pub const UA_PROF_URL: &str = "uaProfUrl";
    pub const HTTP_PARAMS: &str = "httpParams";
    pub const EMAIL_GATEWAY_NUMBER: &str = "emailGatewayNumber";
    pub const NAI_SUFFIX: &str = "naiSuffix";
}

const DEFAULT_UA_PROF_TAG_NAME: &str = "x-wap-profile";

enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

const DEFAULTS: &[(&str, DefaultValue)] = &[
    (keys::ENABLED_MMS, DefaultValue::Bool(true)),
    (keys::ENABLED_TRANS_ID, DefaultValue::Bool(false)),
    (keys::ENABLED_NOTIFY_WAP_MMSC, DefaultValue::Bool(false)),
    (keys::ALIAS_ENABLED, DefaultValue::Bool(false)),
    (keys::ALLOW_ATTACH_AUDIO, DefaultValue::Bool(true)),
    (keys::ENABLE_GROUP_MMS, DefaultValue::Bool(true)),
    (keys::SUPPORT_MMS_CONTENT_DISPOSITION, DefaultValue::Bool(true)),
    (keys::ENABLE_MMS_READ_REPORTS, DefaultValue::Bool(false)),
    (keys::ENABLE_MMS_DELIVERY_REPORTS, DefaultValue::Bool(false)),
    (keys::MAX_MESSAGE_SIZE, DefaultValue::Int(300 * 1024)),
    (keys::MAX_IMAGE_HEIGHT, DefaultValue::Int(480)),
    (keys::MAX_IMAGE_WIDTH, DefaultValue::Int(640)),
    (keys::RECIPIENT_LIMIT, DefaultValue::Int(i32::MAX as i64)),
    (keys::HTTP_SOCKET_TIMEOUT, DefaultValue::Int(60 * 1000)),
    (keys::MAX_SUBJECT_LENGTH, DefaultValue::Int(40)),
    (keys::UA_PROF_TAG_NAME, DefaultValue::Str(DEFAULT_UA_PROF_TAG_NAME)),
    (keys::USER_AGENT, DefaultValue::Str("")),
    (keys::UA_PROF_URL, DefaultValue::Str("")),
    (keys::HTTP_PARAMS, DefaultValue::Str("")),
    (keys::EMAIL_GATEWAY_NUMBER, DefaultValue::Str("")),
    (keys::NAI_SUFFIX, DefaultValue::Str("")),
];

/// Identifies an active subscription (roughly one SIM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Str,
}

impl ValueType {
    /// Parses the type names used by carrier config files (`int`, `bool`, `string`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::Str),
            _ => None,
        }
    }
}

impl ConfigValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::Str,
        }
    }

    fn from_default(value: &DefaultValue) -> Self {
        match value {
            DefaultValue::Bool(v) => Self::Bool(*v),
            DefaultValue::Int(v) => Self::Int(*v),
            DefaultValue::Str(v) => Self::Str((*v).to_string()),
        }
    }
}

fn default_type(key: &str) -> Option<ValueType> {
    DEFAULTS.iter().find(|(name, _)| *name == key).map(|(_, value)| match value {
        DefaultValue::Bool(_) => ValueType::Bool,
        DefaultValue::Int(_) => ValueType::Int,
        DefaultValue::Str(_) => ValueType::Str,
    })
}

/// Immutable configuration snapshot for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmsConfig {
    subscription: SubscriptionId,
    values: BTreeMap<String, ConfigValue>,
}

impl MmsConfig {
    pub fn new(subscription: SubscriptionId) -> Self {
        let values = DEFAULTS
            .iter()
            .map(|(key, value)| ((*key).to_string(), ConfigValue::from_default(value)))
            .collect();
        Self { subscription, values }
    }

    /// Defaults overlaid with carrier values; unknown keys or mistyped values are skipped.
    pub fn with_values<I, K>(subscription: SubscriptionId, values: I) -> Self
    where
        I: IntoIterator<Item = (K, ConfigValue)>,
        K: Into<String>,
    {
        let mut config = Self::new(subscription);
        for (key, value) in values {
            let key = key.into();
            if !config.set_value(&key, value) {
                log::warn!("mms: ignoring invalid config value for key {key} on {subscription}");
            }
        }
        config
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn is_valid_key(key: &str, value_type: ValueType) -> bool {
        default_type(key) == Some(value_type)
    }

    pub fn is_valid_value(key: &str, value: &ConfigValue) -> bool {
        Self::is_valid_key(key, value.value_type())
    }

    pub fn set_value(&mut self, key: &str, value: ConfigValue) -> bool {
        if !Self::is_valid_value(key, &value) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    /// Applies a raw textual value as found in carrier resource files.
    pub fn update(&mut self, key: &str, raw: &str, type_name: &str) {
        let parsed = match ValueType::parse(type_name) {
            Some(ValueType::Int) => raw.trim().parse::<i64>().ok().map(ConfigValue::Int),
            Some(ValueType::Bool) => Some(ConfigValue::Bool(raw.trim().eq_ignore_ascii_case("true"))),
            Some(ValueType::Str) => Some(ConfigValue::Str(raw.to_string())),
            None => None,
        };
        match parsed {
            Some(value) if self.set_value(key, value.clone()) => {}
            _ => log::error!("mms: invalid config update {key},{raw},{type_name}"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }
}

/// Per-request values layered over the subscription snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigOverrides(BTreeMap<String, ConfigValue>);

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A subscription snapshot with one request's overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    base: Arc<MmsConfig>,
    overrides: ConfigOverrides,
}

impl ResolvedConfig {
    pub fn new(base: Arc<MmsConfig>, overrides: ConfigOverrides) -> Self {
        Self { base, overrides }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.base.subscription()
    }

    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        match self.overrides.get(key) {
            Some(value) if MmsConfig::is_valid_value(key, value) => Some(value),
            _ => self.base.get(key),
        }
    }

    pub fn bool_value(&self, key: &str) -> bool {
        matches!(self.value(key), Some(ConfigValue::Bool(true)))
    }

    pub fn int_value(&self, key: &str) -> Option<i64> {
        match self.value(key) {
            Some(ConfigValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn str_value(&self, key: &str) -> &str {
        match self.value(key) {
            Some(ConfigValue::Str(value)) => value.as_str(),
            _ => "",
        }
    }

    pub fn mms_enabled(&self) -> bool {
        self.bool_value(keys::ENABLED_MMS)
    }

    pub fn max_message_size(&self) -> usize {
        self.int_value(keys::MAX_MESSAGE_SIZE)
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(0)
    }

    pub fn http_socket_timeout(&self) -> Duration {
        let millis = self.int_value(keys::HTTP_SOCKET_TIMEOUT).unwrap_or(60_000).max(0);
        Duration::from_millis(millis as u64)
    }

    pub fn group_mms_enabled(&self) -> bool {
        self.bool_value(keys::ENABLE_GROUP_MMS)
    }

    pub fn user_agent(&self) -> &str {
        self.str_value(keys::USER_AGENT)
    }

    pub fn ua_prof_tag_name(&self) -> &str {
        self.str_value(keys::UA_PROF_TAG_NAME)
    }

    pub fn ua_prof_url(&self) -> &str {
        self.str_value(keys::UA_PROF_URL)
    }

    pub fn http_params(&self) -> &str {
        self.str_value(keys::HTTP_PARAMS)
    }

    pub fn nai_suffix(&self) -> &str {
        self.str_value(keys::NAI_SUFFIX)
    }
}

/// Process-scoped subscription → config map.
///
/// Lookups return `None` until a reload has produced a config for the
/// subscription; callers must treat that as a configuration error rather than
/// wait for one.
#[derive(Debug, Default)]
pub struct ConfigManager {
    configs: RwLock<HashMap<SubscriptionId, Arc<MmsConfig>>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs<I: IntoIterator<Item = MmsConfig>>(configs: I) -> Self {
        let manager = Self::new();
        manager.reload(configs);
        manager
    }

    /// Replaces every loaded config. The new map is built before the lock is taken.
    pub fn reload<I: IntoIterator<Item = MmsConfig>>(&self, configs: I) {
        let next: HashMap<_, _> =
            configs.into_iter().map(|config| (config.subscription(), Arc::new(config))).collect();
        log::info!("mms: loaded config for {} subscription(s)", next.len());
        let mut guard = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    pub fn config_for(&self, subscription: SubscriptionId) -> Option<Arc<MmsConfig>> {
        self.configs.read().unwrap_or_else(PoisonError::into_inner).get(&subscription).cloned()
    }

    pub fn resolve(
        &self,
        subscription: SubscriptionId,
        overrides: &ConfigOverrides,
    ) -> Option<ResolvedConfig> {
        self.config_for(subscription).map(|base| ResolvedConfig::new(base, overrides.clone()))
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        let guard = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = guard.keys().copied().collect();
        ids.sort();
        ids
    }
}
