use crate::error::{MmsError, ResultCode};
use crate::store::MessageLocator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a caller learns when its request finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub result: ResultCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<MessageLocator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl CompletionSignal {
    pub fn result_only(result: ResultCode) -> Self {
        Self { result, response: None, locator: None, http_status: None }
    }
}

/// Destination for a request's single completion signal.
///
/// Implementations may have gone away by the time a request finishes; they
/// report that as [`MmsError::Cancelled`] and the caller carries on.
pub trait CompletionTarget: Send + Sync {
    fn complete(&self, signal: &CompletionSignal) -> Result<(), MmsError>;
}

type CompletionFn = dyn Fn(&CompletionSignal) -> Result<(), MmsError> + Send + Sync;

/// A [`CompletionTarget`] backed by a closure.
pub struct CompletionCallback {
    callback: Box<CompletionFn>,
}

impl CompletionCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&CompletionSignal) -> Result<(), MmsError> + Send + Sync + 'static,
    {
        Self { callback: Box::new(callback) }
    }
}

impl fmt::Debug for CompletionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionCallback").finish_non_exhaustive()
    }
}

impl CompletionTarget for CompletionCallback {
    fn complete(&self, signal: &CompletionSignal) -> Result<(), MmsError> {
        (self.callback)(signal)
    }
}
