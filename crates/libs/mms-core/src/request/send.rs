use super::{now_secs, Request, RequestCore, RequestKind};
use crate::apn::ApnSettings;
use crate::carrier::{CarrierAction, CarrierBroadcast};
use crate::config::ResolvedConfig;
use crate::error::{MmsError, ResultCode};
use crate::host::{ContentLocator, ServiceHost};
use crate::http::{HttpMethod, HttpRequest, HttpTransport};
use crate::network::BoundNetwork;
use crate::store::{Folder, MessageLocator, PduType, StatusUpdate};

/// Uploads a caller-composed send-req PDU to the MMSC.
#[derive(Debug)]
pub struct SendRequest {
    core: RequestCore,
    content: ContentLocator,
    location_url: Option<String>,
    pdu: Option<Vec<u8>>,
}

impl SendRequest {
    pub fn new(core: RequestCore, content: ContentLocator) -> Self {
        Self { core, content, location_url: None, pdu: None }
    }

    /// Posts to this URL instead of the MMSC from the APN.
    pub fn with_location_url(mut self, url: impl Into<String>) -> Self {
        self.location_url = Some(url.into());
        self
    }

    pub fn content(&self) -> &ContentLocator {
        &self.content
    }

    pub fn location_url(&self) -> Option<&str> {
        self.location_url.as_deref()
    }

    pub fn pdu(&self) -> Option<&[u8]> {
        self.pdu.as_deref()
    }

    fn persist(
        &self,
        host: &ServiceHost,
        result: ResultCode,
        response: Option<&[u8]>,
    ) -> Result<Option<MessageLocator>, MmsError> {
        let Some(pdu) = self.pdu.as_deref() else {
            log::error!("mms: send persist skipped, pdu never loaded");
            return Ok(None);
        };
        if host.inspector.message_type(pdu) != Some(PduType::SendReq) {
            log::debug!("mms: send persist skipped, not a send-req");
            return Ok(None);
        }
        let group_enabled = self.core.config().map_or(true, ResolvedConfig::group_mms_enabled);
        let locator = host.store.persist(pdu, Folder::Sent, true, group_enabled)?;

        let send_conf = response
            .filter(|bytes| !bytes.is_empty())
            .and_then(|bytes| host.inspector.send_conf(bytes));
        let accepted = result.is_ok() && send_conf.as_ref().is_some_and(|conf| conf.is_accepted());
        let creator = self.core.creator();
        let update = StatusUpdate {
            message_box: (!accepted).then_some(Folder::Failed),
            response_status: send_conf.as_ref().map(|conf| conf.response_status),
            message_id: send_conf.and_then(|conf| conf.message_id),
            date_secs: Some(now_secs()),
            read: Some(true),
            seen: Some(true),
            creator: (!creator.is_empty()).then(|| creator.to_string()),
            subscription: Some(self.core.subscription()),
        };
        if let Err(err) = host.store.update_status(&locator, &update) {
            log::error!("mms: failed to update sent message {locator}: {err}");
        }
        Ok(Some(locator))
    }
}

impl Request for SendRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::Send
    }

    fn core(&self) -> &RequestCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RequestCore {
        &mut self.core
    }

    fn prepare(&mut self, host: &ServiceHost) -> Result<(), MmsError> {
        if self.pdu.is_some() {
            return Ok(());
        }
        let max_size = self
            .core
            .config()
            .map(ResolvedConfig::max_message_size)
            .ok_or_else(|| MmsError::Config(format!("no config for {}", self.core.subscription())))?;
        let pdu = host.content.read_pdu(&self.content, max_size)?;
        if pdu.is_empty() {
            return Err(MmsError::Io(format!("empty pdu at {}", self.content)));
        }
        self.pdu = Some(pdu);
        Ok(())
    }

    fn perform_transport(
        &self,
        transport: &dyn HttpTransport,
        network: &BoundNetwork,
        apn: &ApnSettings,
        config: &ResolvedConfig,
    ) -> Result<Vec<u8>, MmsError> {
        let body = self
            .pdu
            .as_deref()
            .ok_or_else(|| MmsError::Unexpected("send pdu not prepared".into()))?;
        transport.execute(&HttpRequest {
            url: self.location_url.as_deref().unwrap_or(apn.mmsc_url()),
            method: HttpMethod::Post,
            body: Some(body),
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
        if !host.policy.should_write_for(self.core.creator()) {
            return None;
        }
        match self.persist(host, result, response) {
            Ok(locator) => locator,
            Err(err) => {
                log::error!("mms: can not persist sent message: {err}");
                None
            }
        }
    }

    fn transfer_response(
        &self,
        _host: &ServiceHost,
        response: &[u8],
    ) -> Result<Option<Vec<u8>>, MmsError> {
        // Send-conf PDUs are small enough to hand back inline.
        Ok(Some(response.to_vec()))
    }

    fn revoke_access(&self, host: &ServiceHost) {
        host.content.revoke_access(&self.content);
    }

    fn carrier_broadcast(&self, package: &str) -> CarrierBroadcast {
        CarrierBroadcast {
            action: CarrierAction::Send,
            package: package.to_string(),
            content_locator: Some(self.content.clone()),
            location_url: self.location_url.clone(),
        }
    }
}
