use super::{now_secs, Request, RequestCore, RequestKind};
use crate::apn::ApnSettings;
use crate::carrier::{CarrierAction, CarrierBroadcast};
use crate::config::ResolvedConfig;
use crate::error::{MmsError, ResultCode};
use crate::host::{ContentLocator, ServiceHost};
use crate::http::{HttpMethod, HttpRequest, HttpTransport};
use crate::network::BoundNetwork;
use crate::store::{Folder, MessageLocator, PduType, StatusUpdate};

/// Fetches a retrieve-conf PDU from the location announced in a notification.
#[derive(Debug)]
pub struct DownloadRequest {
    core: RequestCore,
    location_url: String,
    output: Option<ContentLocator>,
}

impl DownloadRequest {
    pub fn new(core: RequestCore, location_url: impl Into<String>) -> Self {
        Self { core, location_url: location_url.into(), output: None }
    }

    /// Writes the downloaded PDU here instead of returning it inline.
    pub fn with_output(mut self, output: ContentLocator) -> Self {
        self.output = Some(output);
        self
    }

    pub fn location_url(&self) -> &str {
        &self.location_url
    }

    pub fn output(&self) -> Option<&ContentLocator> {
        self.output.as_ref()
    }

    fn persist(&self, host: &ServiceHost, pdu: &[u8]) -> Result<Option<MessageLocator>, MmsError> {
        if host.inspector.message_type(pdu) != Some(PduType::RetrieveConf) {
            log::error!("mms: download persist skipped, invalid retrieve-conf");
            return Ok(None);
        }
        let group_enabled = self.core.config().map_or(true, ResolvedConfig::group_mms_enabled);
        let locator = host.store.persist(pdu, Folder::Inbox, true, group_enabled)?;
        let update = StatusUpdate {
            date_secs: Some(now_secs()),
            read: Some(false),
            seen: Some(false),
            ..StatusUpdate::default()
        };
        if let Err(err) = host.store.update_status(&locator, &update) {
            log::error!("mms: failed to update downloaded message {locator}: {err}");
        }
        Ok(Some(locator))
    }
}

impl Request for DownloadRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::Download
    }

    fn core(&self) -> &RequestCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RequestCore {
        &mut self.core
    }

    fn prepare(&mut self, _host: &ServiceHost) -> Result<(), MmsError> {
        if self.location_url.trim().is_empty() {
            return Err(MmsError::Io("download location url is empty".into()));
        }
        Ok(())
    }

    fn perform_transport(
        &self,
        transport: &dyn HttpTransport,
        network: &BoundNetwork,
        apn: &ApnSettings,
        config: &ResolvedConfig,
    ) -> Result<Vec<u8>, MmsError> {
        transport.execute(&HttpRequest {
            url: &self.location_url,
            method: HttpMethod::Get,
            body: None,
            proxy: apn.proxy(),
            network,
            config,
        })
    }

    fn persist_if_required(
        &self,
        host: &ServiceHost,
        result: ResultCode,
        response: Option<&[u8]>,
    ) -> Option<MessageLocator> {
        let pdu = response.filter(|bytes| !bytes.is_empty())?;
        if !result.is_ok() {
            return None;
        }
        if !host.policy.auto_persist && !host.policy.should_write_for(self.core.creator()) {
            return None;
        }
        match self.persist(host, pdu) {
            Ok(locator) => locator,
            Err(err) => {
                log::error!("mms: can not persist downloaded message: {err}");
                None
            }
        }
    }

    fn transfer_response(
        &self,
        host: &ServiceHost,
        response: &[u8],
    ) -> Result<Option<Vec<u8>>, MmsError> {
        match &self.output {
            Some(output) => {
                host.content.write_pdu(output, response).map_err(|err| {
                    MmsError::Io(format!("failed to write downloaded pdu to {output}: {err}"))
                })?;
                Ok(None)
            }
            None => Ok(Some(response.to_vec())),
        }
    }

    fn revoke_access(&self, host: &ServiceHost) {
        if let Some(output) = &self.output {
            host.content.revoke_access(output);
        }
    }

    fn carrier_broadcast(&self, package: &str) -> CarrierBroadcast {
        CarrierBroadcast {
            action: CarrierAction::Download,
            package: package.to_string(),
            content_locator: self.output.clone(),
            location_url: Some(self.location_url.clone()),
        }
    }
}
