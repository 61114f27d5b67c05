//! WebToolkit bridge: coordinator, page contexts and the message bus between them.

pub mod bus;
pub mod config;
pub mod orchestrator;
pub mod page;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod types;

pub use bus::{MessageBus, TabInfo};
pub use config::{resolve_store_path, Timeouts};
pub use page::{HostPage, PageContext, RelayBehavior};
pub use protocol::Coordinator;
pub use state::{FileStateStore, MemoryStateStore, SharedStore, StateStore};
pub use transport::StdioTransport;
pub use types::{BridgeError, BridgeResult, PageRequest, Request, Response};
