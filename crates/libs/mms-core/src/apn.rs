use crate::config::SubscriptionId;
use crate::error::MmsError;
use serde::{Deserialize, Serialize};
use std::fmt;

const APN_TYPE_MMS: &str = "mms";
const APN_TYPE_ALL: &str = "*";
const DEFAULT_PROXY_PORT: u16 = 80;

/// Carrier access-point parameters needed to reach the MMSC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnSettings {
    mmsc_url: String,
    proxy_address: Option<String>,
    proxy_port: u16,
}

impl ApnSettings {
    pub fn new(mmsc_url: impl Into<String>) -> Self {
        Self { mmsc_url: mmsc_url.into(), proxy_address: None, proxy_port: DEFAULT_PROXY_PORT }
    }

    pub fn with_proxy(mut self, address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        self.proxy_address = if address.trim().is_empty() { None } else { Some(address) };
        self.proxy_port = port;
        self
    }

    pub fn mmsc_url(&self) -> &str {
        &self.mmsc_url
    }

    pub fn is_proxy_set(&self) -> bool {
        self.proxy_address.is_some()
    }

    pub fn proxy_address(&self) -> Option<&str> {
        self.proxy_address.as_deref()
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    pub fn proxy(&self) -> Option<(&str, u16)> {
        self.proxy_address.as_deref().map(|address| (address, self.proxy_port))
    }
}

impl fmt::Display for ApnSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "APN [MMSC: {}, PROXY: {}, PORT: {}]",
            self.mmsc_url,
            self.proxy_address.as_deref().unwrap_or("none"),
            self.proxy_port
        )
    }
}

/// Looks up access-point settings for a subscription, optionally constrained
/// to the access-point name reported by the MMS network.
pub trait ApnResolver: Send + Sync {
    fn resolve(
        &self,
        subscription: SubscriptionId,
        apn_name: Option<&str>,
    ) -> Result<ApnSettings, MmsError>;
}

/// Resolves with the reported name first and, when that finds nothing, once
/// more without any name constraint.
pub fn resolve_with_fallback(
    resolver: &dyn ApnResolver,
    subscription: SubscriptionId,
    apn_name: Option<&str>,
) -> Result<ApnSettings, MmsError> {
    match resolver.resolve(subscription, apn_name) {
        Ok(settings) => Ok(settings),
        Err(err) => match apn_name {
            None => Err(err),
            Some(name) => {
                log::info!("mms: no apn match for name {name} ({err}), trying without name");
                resolver.resolve(subscription, None)
            }
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortField {
    Number(u32),
    Text(String),
}

impl PortField {
    fn port(&self) -> Option<u16> {
        let port = match self {
            Self::Number(value) => u16::try_from(*value).ok()?,
            Self::Text(text) => text.trim().parse::<u16>().ok()?,
        };
        (port != 0).then_some(port)
    }
}

/// One carrier access-point row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnEntry {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub mmsc: String,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub port: Option<PortField>,
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
}

impl ApnEntry {
    fn serves_mms(&self) -> bool {
        self.types.is_empty()
            || self.types.iter().map(|kind| kind.trim()).any(|kind| {
                kind.eq_ignore_ascii_case(APN_TYPE_MMS) || kind == APN_TYPE_ALL
            })
    }

    fn matches(&self, subscription: SubscriptionId, apn_name: Option<&str>) -> bool {
        if self.subscription.is_some_and(|owner| owner != subscription) {
            return false;
        }
        match apn_name {
            Some(name) => self.name.trim().eq_ignore_ascii_case(name.trim()),
            None => true,
        }
    }

    fn settings(&self) -> Option<ApnSettings> {
        let mmsc = self.mmsc.trim();
        if mmsc.is_empty() {
            return None;
        }
        let mut settings = ApnSettings::new(mmsc);
        let proxy = self.proxy.as_deref().map(str::trim).filter(|proxy| !proxy.is_empty());
        if let Some(proxy) = proxy {
            let port = self.port.as_ref().and_then(PortField::port).unwrap_or(DEFAULT_PROXY_PORT);
            settings = settings.with_proxy(trim_v4_addr_zeros(proxy), port);
        }
        Some(settings)
    }
}

/// An [`ApnResolver`] over a fixed list of carrier rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApnTable {
    entries: Vec<ApnEntry>,
}

impl ApnTable {
    pub fn new(entries: Vec<ApnEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ApnEntry] {
        &self.entries
    }
}

impl ApnResolver for ApnTable {
    fn resolve(
        &self,
        subscription: SubscriptionId,
        apn_name: Option<&str>,
    ) -> Result<ApnSettings, MmsError> {
        self.entries
            .iter()
            .filter(|entry| entry.serves_mms() && entry.matches(subscription, apn_name))
            .find_map(ApnEntry::settings)
            .ok_or_else(|| {
                MmsError::Apn(format!(
                    "no mms apn for {subscription} (name {})",
                    apn_name.unwrap_or("<any>")
                ))
            })
    }
}

/// Strips leading zeros from dotted IPv4 octets ("010.001.002.003" → "10.1.2.3").
fn trim_v4_addr_zeros(address: &str) -> String {
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4 {
        return address.to_string();
    }
    let parsed: Option<Vec<u8>> = octets.iter().map(|octet| octet.parse::<u8>().ok()).collect();
    match parsed {
        Some(values) => {
            values.iter().map(u8::to_string).collect::<Vec<_>>().join(".")
        }
        None => address.to_string(),
    }
}
