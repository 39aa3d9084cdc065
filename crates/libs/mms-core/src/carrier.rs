//! Carrier-app delegation.
//!
//! Before a request goes to the serial queues it is offered to the carrier's
//! messaging app, if exactly one is installed. An app that claims the request
//! answers with a tracking reference; the request is parked under it until
//! the app reports back. Everything that is not claimed, and every failed
//! carrier transfer, falls back to direct transport.

use crate::host::ContentLocator;
use crate::queue::RequestSink;
use crate::request::{Request, RequestKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierAction {
    #[serde(rename = "MMS_SEND")]
    Send,
    #[serde(rename = "MMS_DOWNLOAD")]
    Download,
}

impl CarrierAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Send => "MMS_SEND",
            Self::Download => "MMS_DOWNLOAD",
        }
    }
}

impl From<RequestKind> for CarrierAction {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Send => Self::Send,
            RequestKind::Download => Self::Download,
        }
    }
}

impl fmt::Display for CarrierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered broadcast offering one request to one carrier package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierBroadcast {
    pub action: CarrierAction,
    pub package: String,
    pub content_locator: Option<ContentLocator>,
    pub location_url: Option<String>,
}

/// How the ordered broadcast finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The app took the request; `message_ref` is the tracking reference it
    /// put in the result extras, if any.
    Claimed { message_ref: Option<i32> },
    Declined,
}

pub type BroadcastReply = Box<dyn FnOnce(BroadcastOutcome) + Send>;

pub trait CarrierAppRegistry: Send + Sync {
    fn carrier_packages(&self, action: CarrierAction) -> Vec<String>;

    /// Delivers the broadcast and later invokes `reply` once. Dropping the
    /// reply without invoking it counts as a decline.
    fn send_ordered_broadcast(&self, broadcast: CarrierBroadcast, reply: BroadcastReply);
}

/// Completes a request whose transfer was done by the carrier app.
pub trait RequestFinalizer: Send + Sync {
    fn finalize(&self, request: Box<dyn Request>, response: Option<Vec<u8>>);
}

struct DelegateInner {
    registry: Arc<dyn CarrierAppRegistry>,
    queue: Arc<dyn RequestSink>,
    finalizer: Arc<dyn RequestFinalizer>,
    pending: Mutex<HashMap<i32, Box<dyn Request>>>,
}

impl DelegateInner {
    fn pending(&self) -> MutexGuard<'_, HashMap<i32, Box<dyn Request>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_broadcast_result(&self, request: Box<dyn Request>, outcome: BroadcastOutcome) {
        let kind = request.kind();
        match outcome {
            BroadcastOutcome::Claimed { message_ref: Some(message_ref) } => {
                log::debug!("mms: carrier app took {kind} request, messageref={message_ref}");
                let displaced = self.pending().insert(message_ref, request);
                if let Some(displaced) = displaced {
                    log::error!(
                        "mms: carrier messageref {message_ref} reused, sending earlier {} request directly",
                        displaced.kind()
                    );
                    self.queue.enqueue(displaced);
                }
            }
            BroadcastOutcome::Claimed { message_ref: None } => {
                log::error!("mms: carrier app claimed {kind} request without a messageref");
                self.queue.enqueue(request);
            }
            BroadcastOutcome::Declined => {
                log::debug!("mms: carrier app declined {kind} request, sending directly");
                self.queue.enqueue(request);
            }
        }
    }

    fn take_pending(&self, message_ref: i32, expected: RequestKind) -> Option<Box<dyn Request>> {
        let mut pending = self.pending();
        match pending.get(&message_ref).map(|request| request.kind()) {
            Some(kind) if kind == expected => pending.remove(&message_ref),
            Some(kind) => {
                log::error!(
                    "mms: carrier {expected} status for messageref {message_ref} names a {kind} request"
                );
                None
            }
            None => {
                log::error!("mms: no pending request for carrier messageref {message_ref}");
                None
            }
        }
    }
}

/// A request in flight to the carrier app. If the registry drops the reply
/// without calling it, the request goes to the queue.
struct Offer {
    request: Option<Box<dyn Request>>,
    inner: Arc<DelegateInner>,
}

impl Offer {
    fn resolve(mut self, outcome: BroadcastOutcome) {
        if let Some(request) = self.request.take() {
            self.inner.on_broadcast_result(request, outcome);
        }
    }
}

impl Drop for Offer {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            log::warn!("mms: carrier broadcast reply dropped, sending {} directly", request.kind());
            self.inner.queue.enqueue(request);
        }
    }
}

#[derive(Clone)]
pub struct CarrierAppDelegate {
    inner: Arc<DelegateInner>,
}

impl CarrierAppDelegate {
    pub fn new(
        registry: Arc<dyn CarrierAppRegistry>,
        queue: Arc<dyn RequestSink>,
        finalizer: Arc<dyn RequestFinalizer>,
    ) -> Self {
        Self {
            inner: Arc::new(DelegateInner {
                registry,
                queue,
                finalizer,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Offers the request to the carrier app, or queues it when there is no
    /// single eligible app.
    pub fn offer(&self, request: Box<dyn Request>) {
        let action = CarrierAction::from(request.kind());
        let mut packages = self.inner.registry.carrier_packages(action);
        if packages.len() != 1 {
            log::debug!("mms: {} carrier app(s) for {action}, sending directly", packages.len());
            self.inner.queue.enqueue(request);
            return;
        }
        let package = packages.remove(0);
        let broadcast = request.carrier_broadcast(&package);
        log::debug!("mms: offering {action} to carrier app {package}");
        let offer = Offer { request: Some(request), inner: Arc::clone(&self.inner) };
        self.inner
            .registry
            .send_ordered_broadcast(broadcast, Box::new(move |outcome| offer.resolve(outcome)));
    }

    /// Carrier app reports a send it took. Returns false if the reference is
    /// unknown.
    pub fn complete_send(&self, message_ref: i32, success: bool) -> bool {
        log::debug!("mms: carrier send status ref={message_ref} success={success}");
        let Some(request) = self.inner.take_pending(message_ref, RequestKind::Send) else {
            return false;
        };
        if success {
            self.inner.finalizer.finalize(request, None);
        } else {
            self.inner.queue.enqueue(request);
        }
        true
    }

    /// Carrier app reports a download it took; `pdu` is `None` on failure.
    pub fn complete_download(&self, message_ref: i32, pdu: Option<Vec<u8>>) -> bool {
        log::debug!(
            "mms: carrier download status ref={message_ref} pdu={:?}",
            pdu.as_ref().map(Vec::len)
        );
        let Some(request) = self.inner.take_pending(message_ref, RequestKind::Download) else {
            return false;
        };
        match pdu {
            Some(pdu) => self.inner.finalizer.finalize(request, Some(pdu)),
            None => self.inner.queue.enqueue(request),
        }
        true
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending().len()
    }
}
