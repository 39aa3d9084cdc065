//! Host-side pieces of the `mmsd` daemon: configuration, SQLite message
//! storage, filesystem content access and the static platform adapters the
//! MMS transport core runs against outside a phone.

pub mod bootstrap;
pub mod config;
pub mod content;
pub mod error;
pub mod pdu_peek;
pub mod platform;
pub mod report;
pub mod storage;

pub use error::DaemonError;
