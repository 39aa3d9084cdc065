#![allow(dead_code)]

use mms_core::apn::{ApnEntry, ApnResolver, ApnTable, PortField};
use mms_core::completion::{CompletionSignal, CompletionTarget};
use mms_core::config::{ConfigManager, MmsConfig, SubscriptionId};
use mms_core::engine::{RequestEngine, RetryPolicy, Sleeper};
use mms_core::error::MmsError;
use mms_core::host::{ContentAccess, ContentLocator, PersistPolicy, ServiceHost};
use mms_core::http::{HttpMethod, HttpRequest, HttpTransport};
use mms_core::network::{
    BoundNetwork, ConnectivityProvider, NetworkCallbacks, NetworkReservation,
    ReservationTimeouts, ReservationToken,
};
use mms_core::request::{DownloadRequest, RequestCore, SendRequest};
use mms_core::store::{
    Folder, MessageLocator, MessageStore, PduInspector, PduType, SendConfSummary, StatusUpdate,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const SUB: SubscriptionId = SubscriptionId(1);
pub const MMSC_URL: &str = "http://mmsc.test/mms";
pub const PDU_LOCATOR: &str = "content://mms/outgoing/1";
pub const SMS_APP: &str = "com.example.sms";
pub const OTHER_APP: &str = "com.example.other";

pub const SEND_REQ: &[u8] = &[0x80, 0x01, 0x02, 0x03];
pub const SEND_CONF_OK: &[u8] = &[0x81, 0x80];
pub const SEND_CONF_REJECTED: &[u8] = &[0x81, 0x88];
pub const RETRIEVE_CONF: &[u8] = &[0x84, 0x10, 0x20];

pub fn short_timeouts() -> ReservationTimeouts {
    ReservationTimeouts {
        request_timeout: Duration::from_millis(150),
        acquire_grace: Duration::from_millis(50),
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityMode {
    /// Reports the network available from inside `request_network`.
    AutoAvailable,
    /// Leaves every request outstanding until the test fires a callback.
    Manual,
    /// Reports the network unavailable from inside `request_network`.
    Unavailable,
}

pub struct FakeConnectivity {
    mode: ConnectivityMode,
    apn_name: Option<String>,
    requests: Mutex<Vec<NetworkCallbacks>>,
    released: Mutex<Vec<ReservationToken>>,
}

impl FakeConnectivity {
    pub fn new(mode: ConnectivityMode, apn_name: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            mode,
            apn_name: apn_name.map(str::to_string),
            requests: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn auto() -> Arc<Self> {
        Self::new(ConnectivityMode::AutoAvailable, Some("mms"))
    }

    pub fn manual() -> Arc<Self> {
        Self::new(ConnectivityMode::Manual, Some("mms"))
    }

    pub fn unavailable() -> Arc<Self> {
        Self::new(ConnectivityMode::Unavailable, None)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }

    pub fn release_count(&self) -> usize {
        self.released.lock().expect("released").len()
    }

    pub fn released(&self) -> Vec<ReservationToken> {
        self.released.lock().expect("released").clone()
    }

    pub fn callbacks(&self, index: usize) -> NetworkCallbacks {
        self.requests.lock().expect("requests")[index].clone()
    }

    pub fn network_for(&self, index: usize) -> BoundNetwork {
        BoundNetwork::new(index as u64 + 100, self.apn_name.clone())
    }
}

impl ConnectivityProvider for FakeConnectivity {
    fn request_network(
        &self,
        token: ReservationToken,
        _timeout: Duration,
        callbacks: NetworkCallbacks,
    ) {
        self.requests.lock().expect("requests").push(callbacks.clone());
        match self.mode {
            ConnectivityMode::AutoAvailable => {
                callbacks.on_available(BoundNetwork::new(token.value(), self.apn_name.clone()))
            }
            ConnectivityMode::Unavailable => callbacks.on_unavailable(),
            ConnectivityMode::Manual => {}
        }
    }

    fn release_request(&self, token: ReservationToken) {
        self.released.lock().expect("released").push(token);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<Vec<u8>>,
    pub proxy: Option<(String, u16)>,
}

/// Answers HTTP calls from a script, then from a fixed fallback.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Vec<u8>, MmsError>>>,
    fallback: Result<Vec<u8>, MmsError>,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        script: Vec<Result<Vec<u8>, MmsError>>,
        fallback: Result<Vec<u8>, MmsError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn always(result: Result<Vec<u8>, MmsError>) -> Arc<Self> {
        Self::new(Vec::new(), result)
    }

    pub fn slow(result: Result<Vec<u8>, MmsError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: result,
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls").len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl HttpTransport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<Vec<u8>, MmsError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().expect("calls").push(RecordedCall {
            url: request.url.to_string(),
            method: request.method,
            body: request.body.map(<[u8]>::to_vec),
            proxy: request.proxy.map(|(host, port)| (host.to_string(), port)),
        });
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let scripted = self.script.lock().expect("script").pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Default)]
pub struct MemoryContent {
    files: Mutex<HashMap<String, Vec<u8>>>,
    revoked: Mutex<Vec<String>>,
    fail_writes: bool,
}

impl MemoryContent {
    pub fn with_pdu(locator: &str, pdu: &[u8]) -> Arc<Self> {
        let content = Self::default();
        content.files.lock().expect("files").insert(locator.to_string(), pdu.to_vec());
        Arc::new(content)
    }

    pub fn failing_writes() -> Arc<Self> {
        Arc::new(Self { fail_writes: true, ..Self::default() })
    }

    pub fn file(&self, locator: &str) -> Option<Vec<u8>> {
        self.files.lock().expect("files").get(locator).cloned()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().expect("revoked").clone()
    }
}

impl ContentAccess for MemoryContent {
    fn read_pdu(&self, locator: &ContentLocator, max_size: usize) -> Result<Vec<u8>, MmsError> {
        let files = self.files.lock().expect("files");
        let pdu = files
            .get(locator.as_str())
            .ok_or_else(|| MmsError::Io(format!("no content at {locator}")))?;
        if pdu.len() > max_size {
            return Err(MmsError::Io(format!("pdu of {} bytes exceeds {max_size}", pdu.len())));
        }
        Ok(pdu.clone())
    }

    fn write_pdu(&self, locator: &ContentLocator, pdu: &[u8]) -> Result<(), MmsError> {
        if self.fail_writes {
            return Err(MmsError::Io("read-only".into()));
        }
        self.files.lock().expect("files").insert(locator.as_str().to_string(), pdu.to_vec());
        Ok(())
    }

    fn revoke_access(&self, locator: &ContentLocator) {
        self.revoked.lock().expect("revoked").push(locator.as_str().to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub pdu: Vec<u8>,
    pub folder: Folder,
    pub create_thread: bool,
    pub group_enabled: bool,
    pub updates: Vec<StatusUpdate>,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredRow>>,
}

impl MemoryStore {
    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows.lock().expect("rows").clone()
    }
}

impl MessageStore for MemoryStore {
    fn persist(
        &self,
        pdu: &[u8],
        folder: Folder,
        create_thread: bool,
        group_enabled: bool,
    ) -> Result<MessageLocator, MmsError> {
        let mut rows = self.rows.lock().expect("rows");
        rows.push(StoredRow {
            pdu: pdu.to_vec(),
            folder,
            create_thread,
            group_enabled,
            updates: Vec::new(),
        });
        Ok(MessageLocator::new(format!("mem://{}", rows.len())))
    }

    fn update_status(
        &self,
        locator: &MessageLocator,
        update: &StatusUpdate,
    ) -> Result<(), MmsError> {
        let index = locator
            .as_str()
            .strip_prefix("mem://")
            .and_then(|id| id.parse::<usize>().ok())
            .ok_or_else(|| MmsError::Store(format!("bad locator {locator}")))?;
        let mut rows = self.rows.lock().expect("rows");
        let row = rows
            .get_mut(index - 1)
            .ok_or_else(|| MmsError::Store(format!("no row {locator}")))?;
        row.updates.push(update.clone());
        Ok(())
    }
}

/// Classifies PDUs by their first byte; send-conf status is the second byte.
pub struct FakeInspector;

impl PduInspector for FakeInspector {
    fn message_type(&self, pdu: &[u8]) -> Option<PduType> {
        match pdu.first()? {
            0x80 => Some(PduType::SendReq),
            0x81 => Some(PduType::SendConf),
            0x84 => Some(PduType::RetrieveConf),
            other => Some(PduType::Other(*other)),
        }
    }

    fn send_conf(&self, pdu: &[u8]) -> Option<SendConfSummary> {
        if self.message_type(pdu) != Some(PduType::SendConf) {
            return None;
        }
        Some(SendConfSummary {
            response_status: *pdu.get(1)?,
            message_id: Some("msg-0001".to_string()),
        })
    }
}

/// Completion target that keeps every signal it receives.
pub struct Recorder {
    signals: Mutex<Vec<CompletionSignal>>,
    arrived: Condvar,
    reject: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { signals: Mutex::new(Vec::new()), arrived: Condvar::new(), reject: false })
    }

    /// A target that has gone away: it records, then reports cancellation.
    pub fn cancelled() -> Arc<Self> {
        Arc::new(Self { signals: Mutex::new(Vec::new()), arrived: Condvar::new(), reject: true })
    }

    pub fn signals(&self) -> Vec<CompletionSignal> {
        self.signals.lock().expect("signals").clone()
    }

    pub fn count(&self) -> usize {
        self.signals.lock().expect("signals").len()
    }

    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<CompletionSignal> {
        let deadline = Instant::now() + timeout;
        let mut signals = self.signals.lock().expect("signals");
        while signals.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            signals = self.arrived.wait_timeout(signals, deadline - now).expect("wait").0;
        }
        signals.clone()
    }
}

impl CompletionTarget for Recorder {
    fn complete(&self, signal: &CompletionSignal) -> Result<(), MmsError> {
        self.signals.lock().expect("signals").push(signal.clone());
        self.arrived.notify_all();
        if self.reject {
            return Err(MmsError::Cancelled("pending intent cancelled".into()));
        }
        Ok(())
    }
}

pub fn apn_table() -> ApnTable {
    ApnTable::new(vec![ApnEntry {
        name: "mms".to_string(),
        types: vec!["default".to_string(), "mms".to_string()],
        mmsc: MMSC_URL.to_string(),
        proxy: Some("10.0.0.1".to_string()),
        port: Some(PortField::Text("8080".to_string())),
        subscription: None,
    }])
}

pub fn send_request(target: &Arc<Recorder>, creator: &str) -> SendRequest {
    SendRequest::new(RequestCore::new(SUB, creator, target.clone()), ContentLocator::new(PDU_LOCATOR))
}

pub fn download_request(target: &Arc<Recorder>, url: &str) -> DownloadRequest {
    DownloadRequest::new(RequestCore::new(SUB, OTHER_APP, target.clone()), url)
}

/// Fakes wired together the way the service wires real collaborators.
pub struct Harness {
    pub connectivity: Arc<FakeConnectivity>,
    pub transport: Arc<ScriptedTransport>,
    pub content: Arc<MemoryContent>,
    pub store: Arc<MemoryStore>,
    pub apn: Arc<dyn ApnResolver>,
    pub configs: Arc<ConfigManager>,
    pub policy: PersistPolicy,
    pub network: Arc<NetworkReservation>,
    pub sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl Harness {
    pub fn new(connectivity: Arc<FakeConnectivity>, transport: Arc<ScriptedTransport>) -> Self {
        let network = Arc::new(NetworkReservation::new(connectivity.clone(), short_timeouts()));
        Self {
            connectivity,
            transport,
            content: MemoryContent::with_pdu(PDU_LOCATOR, SEND_REQ),
            store: Arc::new(MemoryStore::default()),
            apn: Arc::new(apn_table()),
            configs: Arc::new(ConfigManager::with_configs([MmsConfig::new(SUB)])),
            policy: PersistPolicy { auto_persist: false, default_sms_app: Some(SMS_APP.into()) },
            network,
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn host(&self) -> ServiceHost {
        ServiceHost {
            content: self.content.clone(),
            store: self.store.clone(),
            inspector: Arc::new(FakeInspector),
            policy: self.policy.clone(),
        }
    }

    pub fn sleeper(&self) -> Sleeper {
        let sleeps = Arc::clone(&self.sleeps);
        Arc::new(move |delay| sleeps.lock().expect("sleeps").push(delay))
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps").clone()
    }

    pub fn engine(&self) -> RequestEngine {
        RequestEngine::new(
            self.network.clone(),
            self.apn.clone(),
            self.transport.clone(),
            self.configs.clone(),
            self.host(),
        )
        .with_retry(RetryPolicy::default())
        .with_sleeper(self.sleeper())
    }
}
