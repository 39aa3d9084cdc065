//! HTTP leg of an MMS attempt.
//!
//! [`HttpTransport`] is the seam the engine calls through. [`MmsHttpClient`]
//! is the ureq-backed implementation: it builds a short-lived agent per call
//! so that the socket timeout and the APN proxy follow the request's config.

use crate::config::ResolvedConfig;
use crate::error::MmsError;
use crate::network::BoundNetwork;
use base64::Engine as _;
use std::fmt;
use std::io::Read;
use ureq::ErrorKind;

const HEADER_ACCEPT: &str = "Accept";
const HEADER_ACCEPT_LANGUAGE: &str = "Accept-Language";
const HEADER_USER_AGENT: &str = "User-Agent";
const HEADER_CONTENT_TYPE: &str = "Content-Type";

const ACCEPT_MMS: &str = "*/*, application/vnd.wap.mms-message, application/vnd.wap.sic";
const CONTENT_TYPE_MMS: &str = "application/vnd.wap.mms-message";
const ACCEPT_LANGUAGE: &str = "en-US, en";

/// Largest response body accepted unless the client is built with another.
pub const DEFAULT_RESPONSE_LIMIT: usize = 8 * 1024 * 1024;

const MACRO_LINE1: &str = "LINE1";
const MACRO_NAI: &str = "NAI";
const MACRO_DELIMITER: &str = "##";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP exchange with the MMSC, made over the reserved network.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub method: HttpMethod,
    pub body: Option<&'a [u8]>,
    pub proxy: Option<(&'a str, u16)>,
    pub network: &'a BoundNetwork,
    pub config: &'a ResolvedConfig,
}

pub trait HttpTransport: Send + Sync {
    /// Returns the response body of a 2xx answer. Anything else is an
    /// [`MmsError::Http`], with the status when the server answered.
    fn execute(&self, request: &HttpRequest<'_>) -> Result<Vec<u8>, MmsError>;
}

/// Device identity values substituted into carrier `httpParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpParamMacros {
    pub line1: Option<String>,
    pub nai: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MmsHttpClient {
    macros: HttpParamMacros,
    response_limit: usize,
}

impl Default for MmsHttpClient {
    fn default() -> Self {
        Self::new(HttpParamMacros::default())
    }
}

impl MmsHttpClient {
    pub fn new(macros: HttpParamMacros) -> Self {
        Self { macros, response_limit: DEFAULT_RESPONSE_LIMIT }
    }

    pub fn with_response_limit(mut self, limit: usize) -> Self {
        self.response_limit = limit;
        self
    }

    /// Every header sent with a request, in order.
    pub fn headers(&self, method: HttpMethod, config: &ResolvedConfig) -> Vec<(String, String)> {
        let mut headers = vec![
            (HEADER_ACCEPT.to_string(), ACCEPT_MMS.to_string()),
            (HEADER_ACCEPT_LANGUAGE.to_string(), ACCEPT_LANGUAGE.to_string()),
        ];
        let user_agent = config.user_agent();
        if !user_agent.is_empty() {
            headers.push((HEADER_USER_AGENT.to_string(), user_agent.to_string()));
        }
        let tag = config.ua_prof_tag_name();
        let ua_prof_url = config.ua_prof_url();
        if !tag.is_empty() && !ua_prof_url.is_empty() {
            headers.push((tag.to_string(), ua_prof_url.to_string()));
        }
        if method == HttpMethod::Post {
            headers.push((HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_MMS.to_string()));
        }
        headers.extend(self.carrier_params(config));
        headers
    }

    /// Parses `Name: value|Name2: value2`, expanding `##MACRO##` values.
    fn carrier_params(&self, config: &ResolvedConfig) -> Vec<(String, String)> {
        config
            .http_params()
            .split('|')
            .filter_map(|pair| {
                let (name, value) = pair.split_once(':')?;
                let name = name.trim();
                let value = value.trim();
                if name.is_empty() || value.is_empty() {
                    return None;
                }
                Some((name.to_string(), self.expand_macros(value, config)))
            })
            .collect()
    }

    fn expand_macros(&self, value: &str, config: &ResolvedConfig) -> String {
        let mut expanded = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(MACRO_DELIMITER) {
            let after = &rest[start + MACRO_DELIMITER.len()..];
            let Some(end) = after.find(MACRO_DELIMITER) else {
                break;
            };
            expanded.push_str(&rest[..start]);
            expanded.push_str(&self.macro_value(&after[..end], config));
            rest = &after[end + MACRO_DELIMITER.len()..];
        }
        expanded.push_str(rest);
        expanded
    }

    fn macro_value(&self, name: &str, config: &ResolvedConfig) -> String {
        match name {
            MACRO_LINE1 => self.macros.line1.clone().unwrap_or_default(),
            MACRO_NAI => match self.macros.nai.as_deref() {
                Some(nai) if !nai.is_empty() => {
                    let full = format!("{nai}{}", config.nai_suffix());
                    base64::engine::general_purpose::STANDARD.encode(full.as_bytes())
                }
                _ => String::new(),
            },
            other => {
                log::error!("mms: invalid http param macro {other}");
                String::new()
            }
        }
    }

    fn agent(&self, request: &HttpRequest<'_>) -> Result<ureq::Agent, MmsError> {
        let timeout = request.config.http_socket_timeout();
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout);
        if let Some((host, port)) = request.proxy {
            let proxy = ureq::Proxy::new(format!("{host}:{port}")).map_err(|err| {
                MmsError::http(None, format!("invalid proxy {host}:{port}: {err}"))
            })?;
            builder = builder.proxy(proxy);
        }
        Ok(builder.build())
    }
}

impl HttpTransport for MmsHttpClient {
    fn execute(&self, request: &HttpRequest<'_>) -> Result<Vec<u8>, MmsError> {
        log::debug!(
            "mms: http {} {} proxy={:?} network={}",
            request.method,
            request.url,
            request.proxy,
            request.network.id
        );
        let agent = self.agent(request)?;
        let mut call = agent.request(request.method.as_str(), request.url);
        for (name, value) in self.headers(request.method, request.config) {
            call = call.set(&name, &value);
        }
        let result = match (request.method, request.body) {
            (HttpMethod::Post, Some(body)) => call.send_bytes(body),
            (HttpMethod::Post, None) => call.send_bytes(&[]),
            (HttpMethod::Get, _) => call.call(),
        };
        let response = result.map_err(|err| map_http_error(request.url, err))?;
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(MmsError::http(Some(status), format!("http status {status} from {}", request.url)));
        }
        read_response_body(response, self.response_limit)
    }
}

/// Reads at most `limit` bytes of body. A declared length over the limit is
/// refused before reading, and a body that ends early is a failure.
fn read_response_body(response: ureq::Response, limit: usize) -> Result<Vec<u8>, MmsError> {
    let declared = response.header("Content-Length").and_then(|value| value.trim().parse::<u64>().ok());
    let cap = limit as u64;
    if let Some(length) = declared.filter(|length| *length > cap) {
        return Err(MmsError::http(None, format!("mmsc response of {length} bytes exceeds {limit}")));
    }

    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(cap.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| MmsError::http(None, format!("mmsc response body: {err}")))?;
    if bytes.len() > limit {
        return Err(MmsError::http(None, format!("mmsc response exceeds {limit} bytes")));
    }
    if let Some(length) = declared.filter(|length| *length != bytes.len() as u64) {
        return Err(MmsError::http(
            None,
            format!("mmsc response truncated: {} of {length} bytes", bytes.len()),
        ));
    }
    Ok(bytes)
}

fn map_http_error(url: &str, err: ureq::Error) -> MmsError {
    match err {
        ureq::Error::Status(code, _) => {
            MmsError::http(Some(code), format!("http status {code} from {url}"))
        }
        ureq::Error::Transport(transport) => {
            MmsError::http(None, format!("{url}: {}", transport_failure(&transport)))
        }
    }
}

fn transport_failure(transport: &ureq::Transport) -> String {
    let reason = match transport.kind() {
        ErrorKind::Dns => "mmsc host not resolved",
        ErrorKind::ConnectionFailed | ErrorKind::Io => "mmsc unreachable over mms network",
        ErrorKind::ProxyConnect | ErrorKind::ProxyUnauthorized | ErrorKind::InvalidProxyUrl => {
            "apn proxy rejected the request"
        }
        ErrorKind::InvalidUrl | ErrorKind::UnknownScheme | ErrorKind::InsecureRequestHttpsOnly => {
            "unusable mmsc url"
        }
        ErrorKind::BadStatus | ErrorKind::BadHeader | ErrorKind::TooManyRedirects | ErrorKind::HTTP => {
            "malformed mmsc response"
        }
    };
    let detail = transport
        .message()
        .map(str::to_string)
        .or_else(|| std::error::Error::source(transport).map(ToString::to_string));
    match detail.as_deref().map(str::trim) {
        Some(detail) if !detail.is_empty() => format!("{reason} ({detail})"),
        _ => reason.to_string(),
    }
}
