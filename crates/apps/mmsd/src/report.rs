use mms_core::completion::CompletionSignal;
use mms_core::error::ResultCode;
use serde::Serialize;

/// Printable form of a completion signal; the response body is summarised
/// by size rather than dumped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub result: ResultCode,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl From<&CompletionSignal> for CompletionReport {
    fn from(signal: &CompletionSignal) -> Self {
        Self {
            result: signal.result,
            code: signal.result.as_i32(),
            response_bytes: signal.response.as_ref().map(Vec::len),
            locator: signal.locator.as_ref().map(|locator| locator.as_str().to_string()),
            http_status: signal.http_status,
        }
    }
}
