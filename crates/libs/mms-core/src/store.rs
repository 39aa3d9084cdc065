//! Message-store and PDU-inspection seams used by request post-processing.

use crate::config::SubscriptionId;
use crate::error::MmsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// X-Mms-Response-Status value meaning the MMSC accepted the message.
pub const RESPONSE_STATUS_OK: u8 = 0x80;

/// Opaque reference to a persisted message row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLocator(String);

impl MessageLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Folder {
    Inbox,
    Sent,
    Outbox,
    Failed,
}

impl Folder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Outbox => "outbox",
            Self::Failed => "failed",
        }
    }
}

/// Column changes applied to a persisted row after the transfer finished.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub message_box: Option<Folder>,
    pub response_status: Option<u8>,
    pub message_id: Option<String>,
    pub date_secs: Option<i64>,
    pub read: Option<bool>,
    pub seen: Option<bool>,
    pub creator: Option<String>,
    pub subscription: Option<SubscriptionId>,
}

pub trait MessageStore: Send + Sync {
    fn persist(
        &self,
        pdu: &[u8],
        folder: Folder,
        create_thread: bool,
        group_enabled: bool,
    ) -> Result<MessageLocator, MmsError>;

    fn update_status(&self, locator: &MessageLocator, update: &StatusUpdate)
        -> Result<(), MmsError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    SendReq,
    SendConf,
    RetrieveConf,
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendConfSummary {
    pub response_status: u8,
    pub message_id: Option<String>,
}

impl SendConfSummary {
    pub fn is_accepted(&self) -> bool {
        self.response_status == RESPONSE_STATUS_OK
    }
}

/// Read-only view into encoded PDUs. Decoding lives outside the core.
pub trait PduInspector: Send + Sync {
    fn message_type(&self, pdu: &[u8]) -> Option<PduType>;

    fn send_conf(&self, pdu: &[u8]) -> Option<SendConfSummary>;
}
