//! MMS transport core.
//!
//! Sends and downloads MMS PDUs over the carrier's MMS network: reserves the
//! network, resolves the APN, talks HTTP to the MMSC and retries with
//! backoff. Requests run on one serial lane per kind and may first be offered
//! to a carrier messaging app.

pub mod apn;
pub mod carrier;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod http;
pub mod network;
pub mod queue;
pub mod request;
pub mod service;
pub mod store;

pub use apn::{ApnEntry, ApnResolver, ApnSettings, ApnTable};
pub use carrier::{
    BroadcastOutcome, BroadcastReply, CarrierAction, CarrierAppDelegate, CarrierAppRegistry,
    CarrierBroadcast, RequestFinalizer,
};
pub use completion::{CompletionCallback, CompletionSignal, CompletionTarget};
pub use config::{
    ConfigManager, ConfigOverrides, ConfigValue, MmsConfig, ResolvedConfig, SubscriptionId,
};
pub use engine::{RequestEngine, RetryPolicy, Sleeper};
pub use error::{Classification, MmsError, ResultCode};
pub use host::{ContentAccess, ContentLocator, PersistPolicy, ServiceHost};
pub use http::{HttpMethod, HttpParamMacros, HttpRequest, HttpTransport, MmsHttpClient};
pub use network::{
    BoundNetwork, ConnectivityProvider, NetworkCallbacks, NetworkReservation, ReservationSnapshot,
    ReservationTimeouts, ReservationToken,
};
pub use queue::{QueueDispatcher, RequestSink};
pub use request::{DownloadRequest, Request, RequestCore, RequestKind, RequestPhase, SendRequest};
pub use service::{MmsService, ServiceDeps};
pub use store::{
    Folder, MessageLocator, MessageStore, PduInspector, PduType, SendConfSummary, StatusUpdate,
};
