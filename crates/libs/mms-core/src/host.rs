use crate::error::MmsError;
use crate::store::{MessageStore, PduInspector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied reference to PDU bytes (a content URI on the platform,
/// a path for the daemon).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocator(String);

impl ContentLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ContentAccess: Send + Sync {
    /// Reads at most `max_size` bytes; larger payloads are an error.
    fn read_pdu(&self, locator: &ContentLocator, max_size: usize) -> Result<Vec<u8>, MmsError>;

    fn write_pdu(&self, locator: &ContentLocator, pdu: &[u8]) -> Result<(), MmsError>;

    /// Drops any transient grant handed out for the locator.
    fn revoke_access(&self, locator: &ContentLocator);
}

/// Who gets their messages written to the store by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistPolicy {
    #[serde(default)]
    pub auto_persist: bool,
    #[serde(default)]
    pub default_sms_app: Option<String>,
}

impl PersistPolicy {
    /// The default SMS app persists its own messages; everyone else gets
    /// persisted on their behalf.
    pub fn should_write_for(&self, creator: &str) -> bool {
        match &self.default_sms_app {
            Some(app) => app != creator,
            None => true,
        }
    }
}

/// Collaborators handed to every request during prepare and post-processing.
#[derive(Clone)]
pub struct ServiceHost {
    pub content: Arc<dyn ContentAccess>,
    pub store: Arc<dyn MessageStore>,
    pub inspector: Arc<dyn PduInspector>,
    pub policy: PersistPolicy,
}
