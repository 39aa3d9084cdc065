use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by the transport core and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmsError {
    #[error("apn error: {0}")]
    Apn(String),
    #[error("mms network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("http failure (status {status:?}): {message}")]
    Http { status: Option<u16>, message: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("completion target cancelled: {0}")]
    Cancelled(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

/// Result codes reported to callers. The numeric values follow the
/// platform's published MMS result constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Ok,
    Unspecified,
    InvalidApn,
    UnableToConnect,
    HttpFailure,
    IoError,
    ConfigurationError,
}

impl ResultCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ok => -1,
            Self::Unspecified => 1,
            Self::InvalidApn => 2,
            Self::UnableToConnect => 3,
            Self::HttpFailure => 4,
            Self::IoError => 5,
            Self::ConfigurationError => 7,
        }
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        let result = match code {
            -1 => Self::Ok,
            1 => Self::Unspecified,
            2 => Self::InvalidApn,
            3 => Self::UnableToConnect,
            4 => Self::HttpFailure,
            5 => Self::IoError,
            7 => Self::ConfigurationError,
            _ => return None,
        };
        Some(result)
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// How a single failed attempt is reported and whether the engine may try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub result: ResultCode,
    pub retryable: bool,
}

impl MmsError {
    /// Classifies a failure raised inside one network attempt.
    pub fn classify(&self) -> Classification {
        let (result, retryable) = match self {
            Self::Apn(_) => (ResultCode::InvalidApn, false),
            Self::NetworkUnavailable(_) => (ResultCode::UnableToConnect, true),
            Self::Http { .. } => (ResultCode::HttpFailure, true),
            Self::Io(_)
            | Self::Config(_)
            | Self::Store(_)
            | Self::Cancelled(_)
            | Self::Unexpected(_) => (ResultCode::Unspecified, false),
        };
        Classification { result, retryable }
    }

    /// HTTP status carried by a transport failure, when the server answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    pub fn http(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_failures_map_to_stable_codes() {
        let apn = MmsError::Apn("no mms apn".into()).classify();
        assert_eq!(apn, Classification { result: ResultCode::InvalidApn, retryable: false });

        let network = MmsError::NetworkUnavailable("timed out".into()).classify();
        assert_eq!(network.result, ResultCode::UnableToConnect);
        assert!(network.retryable);

        let http = MmsError::http(Some(503), "busy");
        assert_eq!(http.classify().result, ResultCode::HttpFailure);
        assert!(http.classify().retryable);
        assert_eq!(http.http_status(), Some(503));

        let other = MmsError::Unexpected("boom".into()).classify();
        assert_eq!(other, Classification { result: ResultCode::Unspecified, retryable: false });
    }

    #[test]
    fn result_codes_round_trip_through_platform_values() {
        for code in [
            ResultCode::Ok,
            ResultCode::Unspecified,
            ResultCode::InvalidApn,
            ResultCode::UnableToConnect,
            ResultCode::HttpFailure,
            ResultCode::IoError,
            ResultCode::ConfigurationError,
        ] {
            assert_eq!(ResultCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ResultCode::from_i32(6), None);
        assert_eq!(ResultCode::Ok.as_i32(), -1);
    }
}
