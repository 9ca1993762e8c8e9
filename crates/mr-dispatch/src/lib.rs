//! MailRelay dispatch engine
//!
//! Validates outbound messages, picks a reachable provider, sends the
//! provider's wire format and decides between a sent and a queued outcome.

pub mod error;
pub mod validator;
pub mod wire;
pub mod health;
pub mod transport;
pub mod interpreter;
pub mod repository;
pub mod recorder;
pub mod memory;
pub mod dispatcher;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export key types
pub use dispatcher::{DispatchStage, Dispatcher, MailSender};
pub use error::{DispatchError, Result};
pub use health::ProviderHealthChecker;
pub use interpreter::Interpretation;
pub use memory::InMemoryMailStore;
pub use recorder::MailRecorder;
pub use repository::{HistoryRepository, QueueRepository};
pub use transport::{DispatchTarget, RawResponse, ResponseStream, TransportClient};
pub use wire::WireRequest;
