//! Exclusive, reference-counted reservation of the MMS network path.
//!
//! Every HTTP attempt brackets itself with [`NetworkReservation::acquire`] and
//! [`NetworkReservation::release`]. The first acquirer issues one platform
//! request; later acquirers share it until the holder count drops back to
//! zero. Platform callbacks arrive through [`NetworkCallbacks`], which carry
//! the token of the request they answer so that answers to a superseded
//! request are dropped.
//!
//! State lives behind one mutex with one condition variable. Calls into the
//! [`ConnectivityProvider`] are made with the lock released, so a provider may
//! invoke callbacks synchronously from inside `request_network`.

use crate::error::MmsError;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3 * 60);
const DEFAULT_ACQUIRE_GRACE: Duration = Duration::from_secs(15);

/// Identity of one platform network request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationToken(u64);

impl ReservationToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// A network the platform bound for MMS traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundNetwork {
    pub id: u64,
    pub apn_name: Option<String>,
}

impl BoundNetwork {
    pub fn new(id: u64, apn_name: Option<String>) -> Self {
        Self { id, apn_name }
    }
}

/// Platform side of the reservation: issues and withdraws network requests.
///
/// Outcomes are reported later through the [`NetworkCallbacks`] handed to
/// `request_network`.
pub trait ConnectivityProvider: Send + Sync {
    fn request_network(
        &self,
        token: ReservationToken,
        timeout: Duration,
        callbacks: NetworkCallbacks,
    );

    fn release_request(&self, token: ReservationToken);
}

/// Timeouts for one reservation.
///
/// `request_timeout` is passed to the platform with each request; callers wait
/// `request_timeout + acquire_grace` so the platform's own timeout fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationTimeouts {
    pub request_timeout: Duration,
    pub acquire_grace: Duration,
}

impl ReservationTimeouts {
    pub fn acquire_timeout(&self) -> Duration {
        self.request_timeout.saturating_add(self.acquire_grace)
    }
}

impl Default for ReservationTimeouts {
    fn default() -> Self {
        Self { request_timeout: DEFAULT_REQUEST_TIMEOUT, acquire_grace: DEFAULT_ACQUIRE_GRACE }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationSnapshot {
    pub holders: usize,
    pub request: Option<ReservationToken>,
    pub network: Option<BoundNetwork>,
}

#[derive(Debug, Default)]
struct ReservationState {
    request: Option<ReservationToken>,
    network: Option<BoundNetwork>,
    holders: usize,
    next_token: u64,
}

impl ReservationState {
    fn issue_token(&mut self) -> ReservationToken {
        self.next_token += 1;
        ReservationToken(self.next_token)
    }
}

struct Shared {
    state: Mutex<ReservationState>,
    changed: Condvar,
    provider: Arc<dyn ConnectivityProvider>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ReservationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct NetworkReservation {
    shared: Arc<Shared>,
    timeouts: ReservationTimeouts,
}

impl NetworkReservation {
    pub fn new(provider: Arc<dyn ConnectivityProvider>, timeouts: ReservationTimeouts) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ReservationState::default()),
                changed: Condvar::new(),
                provider,
            }),
            timeouts,
        }
    }

    pub fn timeouts(&self) -> ReservationTimeouts {
        self.timeouts
    }

    /// Joins the reservation, blocking until the MMS network is bound.
    ///
    /// The holder count is incremented whether or not this succeeds, so every
    /// call must be paired with exactly one [`release`](Self::release).
    pub fn acquire(&self) -> Result<BoundNetwork, MmsError> {
        let mut state = self.shared.lock();
        state.holders += 1;
        if let Some(network) = &state.network {
            log::debug!("net: already available, holders={}", state.holders);
            return Ok(network.clone());
        }

        if state.request.is_none() {
            let token = state.issue_token();
            state.request = Some(token);
            drop(state);
            log::debug!("net: start new network request {token}");
            self.shared.provider.request_network(
                token,
                self.timeouts.request_timeout,
                NetworkCallbacks { shared: Arc::downgrade(&self.shared), token },
            );
            state = self.shared.lock();
        }

        let deadline = Instant::now() + self.timeouts.acquire_timeout();
        loop {
            if let Some(network) = &state.network {
                return Ok(network.clone());
            }
            if state.request.is_none() {
                log::debug!("net: network request withdrawn while waiting");
                return Err(MmsError::NetworkUnavailable("mms network request withdrawn".into()));
            }
            let now = Instant::now();
            if now >= deadline {
                let withdrawn = state.request.take();
                drop(state);
                self.shared.changed.notify_all();
                log::debug!("net: timed out waiting for mms network");
                if let Some(token) = withdrawn {
                    self.shared.provider.release_request(token);
                }
                return Err(MmsError::NetworkUnavailable("acquiring mms network timed out".into()));
            }
            let (guard, _) = self
                .shared
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Leaves the reservation. The last holder out withdraws the platform
    /// request and forgets the bound network; surplus releases are ignored.
    pub fn release(&self) {
        let mut state = self.shared.lock();
        if state.holders == 0 {
            log::warn!("net: release without a matching acquire ignored");
            return;
        }
        state.holders -= 1;
        log::debug!("net: release, holders={}", state.holders);
        if state.holders > 0 {
            return;
        }
        let withdrawn = state.request.take();
        state.network = None;
        drop(state);
        self.shared.changed.notify_all();
        if let Some(token) = withdrawn {
            self.shared.provider.release_request(token);
        }
    }

    /// Access-point name of the currently bound network, if any.
    pub fn apn_name(&self) -> Option<String> {
        self.shared.lock().network.as_ref().and_then(|network| network.apn_name.clone())
    }

    pub fn snapshot(&self) -> ReservationSnapshot {
        let state = self.shared.lock();
        ReservationSnapshot {
            holders: state.holders,
            request: state.request,
            network: state.network.clone(),
        }
    }
}

/// Callback handle for one platform request.
#[derive(Clone)]
pub struct NetworkCallbacks {
    shared: Weak<Shared>,
    token: ReservationToken,
}

impl fmt::Debug for NetworkCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCallbacks").field("token", &self.token).finish()
    }
}

impl NetworkCallbacks {
    pub fn token(&self) -> ReservationToken {
        self.token
    }

    pub fn on_available(&self, network: BoundNetwork) {
        self.apply("available", move |state| {
            state.network = Some(network);
            None
        });
    }

    pub fn on_lost(&self) {
        self.apply("lost", |state| {
            state.network = None;
            state.request.take()
        });
    }

    pub fn on_unavailable(&self) {
        self.apply("unavailable", |state| state.request.take());
    }

    fn apply<F>(&self, event: &str, update: F)
    where
        F: FnOnce(&mut ReservationState) -> Option<ReservationToken>,
    {
        let Some(shared) = self.shared.upgrade() else {
            log::debug!("net: {event} for {} after reservation dropped", self.token);
            return;
        };
        let mut state = shared.lock();
        if state.request != Some(self.token) {
            log::debug!(
                "net: ignoring stale {event} for {} (current {:?})",
                self.token,
                state.request
            );
            return;
        }
        log::debug!("net: {event} for {}", self.token);
        let withdrawn = update(&mut state);
        drop(state);
        shared.changed.notify_all();
        if let Some(token) = withdrawn {
            shared.provider.release_request(token);
        }
    }
}
