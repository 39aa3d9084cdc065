pub mod messages;

pub use messages::{SqliteMessageStore, StoredMessage};
