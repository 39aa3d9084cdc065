use super::{Cli, Command};
use anyhow::{Context, Result};
use mms_core::completion::{CompletionCallback, CompletionTarget};
use mms_core::config::SubscriptionId;
use mms_core::error::MmsError;
use mms_core::host::ContentLocator;
use mms_core::request::{DownloadRequest, RequestCore, SendRequest};
use mms_daemon::bootstrap::build_service;
use mms_daemon::config::{default_config_path, DaemonConfig};
use mms_daemon::content::FsContent;
use mms_daemon::report::CompletionReport;
use mms_daemon::storage::SqliteMessageStore;
use std::fs;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

pub(super) const DEFAULT_CREATOR: &str = "mmsd";

fn load_config(explicit: Option<&Path>) -> Result<DaemonConfig> {
    if let Some(path) = explicit {
        return DaemonConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    match default_config_path().filter(|path| path.exists()) {
        Some(path) => DaemonConfig::from_path(&path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            log::info!("mmsd: no config file, using defaults");
            Ok(DaemonConfig::default())
        }
    }
}

fn open_store(config: &DaemonConfig, override_path: Option<&Path>) -> Result<SqliteMessageStore> {
    let path = override_path.map(Path::to_path_buf).unwrap_or_else(|| config.database_path());
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteMessageStore::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn locator(path: &Path) -> ContentLocator {
    ContentLocator::new(path.display().to_string())
}

pub(super) fn run(cli: Cli) -> Result<CompletionReport> {
    let config = load_config(cli.config.as_deref())?;
    let store = Arc::new(open_store(&config, cli.db.as_deref())?);
    let service = build_service(&config, store, Arc::new(FsContent::new()));

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let completion: Arc<dyn CompletionTarget> = Arc::new(CompletionCallback::new(move |signal| {
        tx.lock()
            .map_err(|_| MmsError::Cancelled("completion channel poisoned".into()))?
            .send(signal.clone())
            .map_err(|_| MmsError::Cancelled("mmsd stopped waiting".into()))
    }));
    let subscription = |sub_id: Option<i64>| {
        sub_id.map(SubscriptionId).unwrap_or_else(|| config.default_subscription())
    };

    match cli.command {
        Command::Send { pdu, location_url, sub_id, creator } => {
            let core = RequestCore::new(subscription(sub_id), creator, completion);
            let mut request = SendRequest::new(core, locator(&pdu));
            if let Some(url) = location_url {
                request = request.with_location_url(url);
            }
            service.send_message(request);
        }
        Command::Download { url, output, sub_id, creator } => {
            let core = RequestCore::new(subscription(sub_id), creator, completion);
            service.download_message(DownloadRequest::new(core, url).with_output(locator(&output)));
        }
    }

    let signal = rx.recv().context("request finished without a completion signal");
    service.shutdown();
    Ok(CompletionReport::from(&signal?))
}
