//! Units of work driven by the engine.
//!
//! A [`Request`] bundles the state every variant shares ([`RequestCore`]) with
//! the hooks that differ between sending and downloading. The engine only
//! talks to requests through this trait.

mod download;
mod send;

pub use download::DownloadRequest;
pub use send::SendRequest;

use crate::apn::ApnSettings;
use crate::carrier::CarrierBroadcast;
use crate::completion::CompletionTarget;
use crate::config::{ConfigManager, ConfigOverrides, ResolvedConfig, SubscriptionId};
use crate::error::{MmsError, ResultCode};
use crate::host::ServiceHost;
use crate::http::HttpTransport;
use crate::network::BoundNetwork;
use crate::store::MessageLocator;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which serial lane a request runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Send,
    Download,
}

impl RequestKind {
    pub const ALL: [RequestKind; 2] = [RequestKind::Send, RequestKind::Download];

    pub fn index(self) -> usize {
        match self {
            Self::Send => 0,
            Self::Download => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Created,
    Preparing,
    Executing,
    Completed,
}

pub struct RequestCore {
    subscription: SubscriptionId,
    creator: String,
    overrides: ConfigOverrides,
    config: Option<ResolvedConfig>,
    completion: Arc<dyn CompletionTarget>,
    phase: RequestPhase,
}

impl RequestCore {
    pub fn new(
        subscription: SubscriptionId,
        creator: impl Into<String>,
        completion: Arc<dyn CompletionTarget>,
    ) -> Self {
        Self {
            subscription,
            creator: creator.into(),
            overrides: ConfigOverrides::new(),
            config: None,
            completion,
            phase: RequestPhase::Created,
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    pub fn config(&self) -> Option<&ResolvedConfig> {
        self.config.as_ref()
    }

    /// Resolves the config snapshot on first use and caches it. Returns
    /// `None` while the subscription has no loaded config.
    pub fn ensure_config(&mut self, configs: &ConfigManager) -> Option<&ResolvedConfig> {
        if self.config.is_none() {
            self.config = configs.resolve(self.subscription, &self.overrides);
        }
        self.config.as_ref()
    }

    pub fn completion(&self) -> &Arc<dyn CompletionTarget> {
        &self.completion
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: RequestPhase) {
        self.phase = phase;
    }
}

impl fmt::Debug for RequestCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCore")
            .field("subscription", &self.subscription)
            .field("creator", &self.creator)
            .field("config_loaded", &self.config.is_some())
            .field("phase", &self.phase)
            .finish()
    }
}

pub trait Request: Send {
    fn kind(&self) -> RequestKind;

    fn core(&self) -> &RequestCore;

    fn core_mut(&mut self) -> &mut RequestCore;

    /// Materialises whatever the HTTP leg needs before the network is
    /// reserved. Called with the config already resolved.
    fn prepare(&mut self, host: &ServiceHost) -> Result<(), MmsError>;

    fn perform_transport(
        &self,
        transport: &dyn HttpTransport,
        network: &BoundNetwork,
        apn: &ApnSettings,
        config: &ResolvedConfig,
    ) -> Result<Vec<u8>, MmsError>;

    /// Writes the message to the store when the caller would not do it
    /// itself. Failures are logged and reported as `None`.
    fn persist_if_required(
        &self,
        host: &ServiceHost,
        result: ResultCode,
        response: Option<&[u8]>,
    ) -> Option<MessageLocator>;

    /// Hands the response to the caller. `Ok(Some(..))` delivers the bytes
    /// inline with the completion signal.
    fn transfer_response(
        &self,
        host: &ServiceHost,
        response: &[u8],
    ) -> Result<Option<Vec<u8>>, MmsError>;

    fn revoke_access(&self, host: &ServiceHost);

    fn carrier_broadcast(&self, package: &str) -> CarrierBroadcast;
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
