//! Platform adapters for hosts without a telephony stack: the MMS network is
//! whatever route the host already has, and no carrier app is installed.

use mms_core::carrier::{
    BroadcastOutcome, BroadcastReply, CarrierAction, CarrierAppRegistry, CarrierBroadcast,
};
use mms_core::network::{BoundNetwork, ConnectivityProvider, NetworkCallbacks, ReservationToken};
use std::thread;
use std::time::Duration;

/// Answers every network request with the same pre-routed network.
///
/// The answer is delivered from a short-lived thread so it arrives after
/// `request_network` returns, the way a platform callback would.
#[derive(Debug, Clone)]
pub struct StaticConnectivity {
    network_id: u64,
    apn_name: Option<String>,
}

impl StaticConnectivity {
    pub fn new(apn_name: Option<String>) -> Self {
        Self { network_id: 1, apn_name }
    }

    pub fn with_network_id(mut self, network_id: u64) -> Self {
        self.network_id = network_id;
        self
    }
}

impl ConnectivityProvider for StaticConnectivity {
    fn request_network(
        &self,
        token: ReservationToken,
        _timeout: Duration,
        callbacks: NetworkCallbacks,
    ) {
        let network = BoundNetwork::new(self.network_id, self.apn_name.clone());
        let fallback = callbacks.clone();
        let spawned = thread::Builder::new()
            .name(format!("mms-net-{}", token.value()))
            .spawn(move || callbacks.on_available(network));
        if let Err(err) = spawned {
            log::error!("net: failed to spawn callback thread for {token}: {err}");
            fallback.on_unavailable();
        }
    }

    fn release_request(&self, token: ReservationToken) {
        log::debug!("net: released {token}");
    }
}

/// Carrier-app registry with nothing installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCarrierApps;

impl CarrierAppRegistry for NoCarrierApps {
    fn carrier_packages(&self, _action: CarrierAction) -> Vec<String> {
        Vec::new()
    }

    fn send_ordered_broadcast(&self, broadcast: CarrierBroadcast, reply: BroadcastReply) {
        log::warn!("carrier: no app to receive {} for {}", broadcast.action, broadcast.package);
        reply(BroadcastOutcome::Declined);
    }
}
