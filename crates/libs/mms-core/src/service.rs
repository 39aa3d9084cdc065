use crate::apn::ApnResolver;
use crate::carrier::{CarrierAppDelegate, CarrierAppRegistry};
use crate::config::{ConfigManager, MmsConfig};
use crate::engine::{RequestEngine, RetryPolicy, Sleeper};
use crate::host::ServiceHost;
use crate::http::HttpTransport;
use crate::network::{ConnectivityProvider, NetworkReservation, ReservationTimeouts};
use crate::queue::QueueDispatcher;
use crate::request::{DownloadRequest, SendRequest};
use std::sync::Arc;

/// Collaborators the service is assembled from.
pub struct ServiceDeps {
    pub provider: Arc<dyn ConnectivityProvider>,
    pub timeouts: ReservationTimeouts,
    pub apn: Arc<dyn ApnResolver>,
    pub transport: Arc<dyn HttpTransport>,
    pub carrier: Arc<dyn CarrierAppRegistry>,
    pub host: ServiceHost,
    pub retry: RetryPolicy,
    pub configs: Arc<ConfigManager>,
    pub sleeper: Option<Sleeper>,
}

/// Entry point for MMS callers: routes requests through carrier delegation
/// and the serial queues, and takes the carrier app's status reports.
pub struct MmsService {
    network: Arc<NetworkReservation>,
    configs: Arc<ConfigManager>,
    engine: Arc<RequestEngine>,
    queue: Arc<QueueDispatcher>,
    carrier: CarrierAppDelegate,
}

impl MmsService {
    pub fn new(deps: ServiceDeps) -> Self {
        let network = Arc::new(NetworkReservation::new(deps.provider, deps.timeouts));
        let mut engine = RequestEngine::new(
            Arc::clone(&network),
            deps.apn,
            deps.transport,
            Arc::clone(&deps.configs),
            deps.host,
        )
        .with_retry(deps.retry);
        if let Some(sleeper) = deps.sleeper {
            engine = engine.with_sleeper(sleeper);
        }
        let engine = Arc::new(engine);
        let queue = Arc::new(QueueDispatcher::new(Arc::clone(&engine)));
        let carrier = CarrierAppDelegate::new(deps.carrier, queue.clone(), engine.clone());
        log::info!(
            "mms: service ready (request timeout {:?}, {} attempt(s))",
            deps.timeouts.request_timeout,
            deps.retry.max_attempts
        );
        Self { network, configs: deps.configs, engine, queue, carrier }
    }

    pub fn send_message(&self, request: SendRequest) {
        log::debug!("mms: send_message to {:?}", request.location_url());
        self.carrier.offer(Box::new(request));
    }

    pub fn download_message(&self, request: DownloadRequest) {
        log::debug!("mms: download_message from {}", request.location_url());
        self.carrier.offer(Box::new(request));
    }

    pub fn update_send_status(&self, message_ref: i32, success: bool) -> bool {
        self.carrier.complete_send(message_ref, success)
    }

    pub fn update_download_status(&self, message_ref: i32, pdu: Option<Vec<u8>>) -> bool {
        self.carrier.complete_download(message_ref, pdu)
    }

    /// Swaps in configs for the current set of subscriptions.
    pub fn reload_config<I: IntoIterator<Item = MmsConfig>>(&self, configs: I) {
        self.configs.reload(configs);
    }

    /// The reservation platform callbacks should report into.
    pub fn network(&self) -> &Arc<NetworkReservation> {
        &self.network
    }

    pub fn configs(&self) -> &Arc<ConfigManager> {
        &self.configs
    }

    pub fn engine(&self) -> &Arc<RequestEngine> {
        &self.engine
    }

    pub fn pending_carrier_requests(&self) -> usize {
        self.carrier.pending_len()
    }

    /// Waits for queued work to finish. In-flight requests are not cancelled.
    pub fn shutdown(&self) {
        self.queue.close();
    }
}
