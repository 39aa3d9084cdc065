use crate::config::DaemonConfig;
use crate::pdu_peek::HeaderPeek;
use crate::platform::{NoCarrierApps, StaticConnectivity};
use mms_core::config::ConfigManager;
use mms_core::host::{ContentAccess, ServiceHost};
use mms_core::http::MmsHttpClient;
use mms_core::service::{MmsService, ServiceDeps};
use mms_core::store::MessageStore;
use std::sync::Arc;

/// Collaborators for a host without telephony: static routing, no carrier
/// apps, the ureq transport and the given store and content access.
pub fn service_deps(
    config: &DaemonConfig,
    store: Arc<dyn MessageStore>,
    content: Arc<dyn ContentAccess>,
) -> ServiceDeps {
    ServiceDeps {
        provider: Arc::new(StaticConnectivity::new(config.network.apn_name.clone())),
        timeouts: config.timeouts(),
        apn: Arc::new(config.apn_table()),
        transport: Arc::new(MmsHttpClient::new(config.http_macros())),
        carrier: Arc::new(NoCarrierApps),
        host: ServiceHost {
            content,
            store,
            inspector: Arc::new(HeaderPeek),
            policy: config.persist_policy(),
        },
        retry: config.retry_policy(),
        configs: Arc::new(ConfigManager::with_configs(config.mms_configs())),
        sleeper: None,
    }
}

pub fn build_service(
    config: &DaemonConfig,
    store: Arc<dyn MessageStore>,
    content: Arc<dyn ContentAccess>,
) -> MmsService {
    log::info!(
        "mmsd: {} apn row(s), {} subscription(s)",
        config.apns.len(),
        config.mms_configs().len()
    );
    MmsService::new(service_deps(config, store, content))
}
