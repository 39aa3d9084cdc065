//! Retry and orchestration for a single request.
//!
//! Each attempt reserves the MMS network, resolves the APN against the name
//! the network reports, runs the request's HTTP leg and gives the reservation
//! back before the outcome is looked at. Failures are classified through
//! [`MmsError::classify`]; retryable ones back off exponentially up to the
//! attempt budget. Whatever happens, post-processing runs and the completion
//! target hears about the request exactly once.

use crate::apn::{resolve_with_fallback, ApnResolver};
use crate::carrier::RequestFinalizer;
use crate::completion::CompletionSignal;
use crate::config::{ConfigManager, ResolvedConfig};
use crate::error::{MmsError, ResultCode};
use crate::host::ServiceHost;
use crate::http::HttpTransport;
use crate::network::NetworkReservation;
use crate::request::{Request, RequestPhase};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, initial_delay: DEFAULT_INITIAL_DELAY }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling from the initial delay.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31);
        self.initial_delay.saturating_mul(1u32 << doublings)
    }
}

pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

#[derive(Debug)]
struct AttemptOutcome {
    result: ResultCode,
    response: Option<Vec<u8>>,
    http_status: Option<u16>,
}

/// Gives the reservation back when an attempt ends, however it ends.
struct HeldReservation<'a> {
    network: &'a NetworkReservation,
}

impl Drop for HeldReservation<'_> {
    fn drop(&mut self) {
        self.network.release();
    }
}

pub struct RequestEngine {
    network: Arc<NetworkReservation>,
    apn: Arc<dyn ApnResolver>,
    transport: Arc<dyn HttpTransport>,
    configs: Arc<ConfigManager>,
    host: ServiceHost,
    retry: RetryPolicy,
    sleeper: Sleeper,
}

impl RequestEngine {
    pub fn new(
        network: Arc<NetworkReservation>,
        apn: Arc<dyn ApnResolver>,
        transport: Arc<dyn HttpTransport>,
        configs: Arc<ConfigManager>,
        host: ServiceHost,
    ) -> Self {
        Self {
            network,
            apn,
            transport,
            configs,
            host,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(thread::sleep),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the backoff sleep; tests use this to observe delays.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn network(&self) -> &Arc<NetworkReservation> {
        &self.network
    }

    pub fn host(&self) -> &ServiceHost {
        &self.host
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs the request to completion. Returns the signal delivered to the
    /// completion target, or `None` if the request had already completed.
    pub fn execute(&self, request: &mut dyn Request) -> Option<CompletionSignal> {
        if request.core().phase() == RequestPhase::Completed {
            log::error!("mms: {} request executed after completion", request.kind());
            return None;
        }
        request.core_mut().set_phase(RequestPhase::Preparing);

        let Some(config) = request.core_mut().ensure_config(&self.configs).cloned() else {
            log::error!("mms: config for {} is not loaded yet", request.core().subscription());
            return self.process_result(request, ResultCode::ConfigurationError, None, None);
        };
        if let Err(err) = request.prepare(&self.host) {
            log::error!("mms: failed to prepare {} request: {err}", request.kind());
            return self.process_result(request, ResultCode::IoError, None, None);
        }

        request.core_mut().set_phase(RequestPhase::Executing);
        let outcome = self.run_attempts(&*request, &config);
        self.process_result(request, outcome.result, outcome.response, outcome.http_status)
    }

    fn run_attempts(&self, request: &dyn Request, config: &ResolvedConfig) -> AttemptOutcome {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut result = ResultCode::Unspecified;
        let mut http_status = None;

        for attempt in 1..=max_attempts {
            match self.guarded_attempt(request, config) {
                Ok(response) => {
                    log::debug!("mms: {} succeeded on attempt {attempt}", request.kind());
                    return AttemptOutcome {
                        result: ResultCode::Ok,
                        response: Some(response),
                        http_status: None,
                    };
                }
                Err(err) => {
                    let class = err.classify();
                    log::error!(
                        "mms: {} attempt {attempt}/{max_attempts} failed ({:?}): {err}",
                        request.kind(),
                        class.result
                    );
                    result = class.result;
                    http_status = err.http_status();
                    if !class.retryable {
                        break;
                    }
                }
            }
            if attempt < max_attempts {
                (self.sleeper)(self.retry.delay_after(attempt));
            }
        }

        AttemptOutcome { result, response: None, http_status }
    }

    fn guarded_attempt(
        &self,
        request: &dyn Request,
        config: &ResolvedConfig,
    ) -> Result<Vec<u8>, MmsError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.attempt(request, config)))
            .unwrap_or_else(|payload| Err(MmsError::Unexpected(panic_message(&*payload))))
    }

    fn attempt(&self, request: &dyn Request, config: &ResolvedConfig) -> Result<Vec<u8>, MmsError> {
        let _held = HeldReservation { network: &self.network };
        let network = self.network.acquire()?;
        let apn = resolve_with_fallback(
            &*self.apn,
            request.core().subscription(),
            network.apn_name.as_deref(),
        )?;
        log::info!("mms: using {apn}");
        request.perform_transport(&*self.transport, &network, &apn, config)
    }

    /// Post-processing shared by the direct and carrier-app paths: persist,
    /// hand over the response, signal the caller, revoke access.
    pub fn process_result(
        &self,
        request: &mut dyn Request,
        result: ResultCode,
        response: Option<Vec<u8>>,
        http_status: Option<u16>,
    ) -> Option<CompletionSignal> {
        if request.core().phase() == RequestPhase::Completed {
            log::error!("mms: dropping duplicate {} result {result:?}", request.kind());
            return None;
        }

        let locator = request.persist_if_required(&self.host, result, response.as_deref());
        let http_status = http_status.filter(|status| result == ResultCode::HttpFailure && *status != 0);

        let mut result = result;
        let mut delivered = None;
        if let Some(bytes) = response.as_deref() {
            match request.transfer_response(&self.host, bytes) {
                Ok(inline) => delivered = inline,
                Err(err) => {
                    log::error!("mms: failed to transfer {} response: {err}", request.kind());
                    result = ResultCode::IoError;
                }
            }
        }

        let signal = CompletionSignal { result, response: delivered, locator, http_status };
        if let Err(err) = request.core().completion().complete(&signal) {
            log::warn!("mms: completion target for {} request rejected result: {err}", request.kind());
        }
        request.revoke_access(&self.host);
        request.core_mut().set_phase(RequestPhase::Completed);
        Some(signal)
    }
}

impl RequestFinalizer for RequestEngine {
    fn finalize(&self, mut request: Box<dyn Request>, response: Option<Vec<u8>>) {
        // The carrier app did the transfer; the payload is only needed for persisting.
        if request.core_mut().ensure_config(&self.configs).is_some() {
            if let Err(err) = request.prepare(&self.host) {
                log::warn!("mms: carrier-handled {} request not prepared: {err}", request.kind());
            }
        }
        self.process_result(&mut *request, ResultCode::Ok, response, None);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during mms attempt".to_string()
    }
}
