pub mod assembly;
pub mod config;
pub mod decode;
pub mod error;
pub mod fragment;
pub mod identity;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use config::Config;
pub use error::{ExchangeError, IdentityError};
pub use identity::{FileIdentityStore, Identity, IdentityStore, MemoryIdentityStore};
pub use session::{ChatSession, ChatUi, InputControls, MessageSink, TurnOutcome, TurnReport};
pub use state::{ChatMessage, ChatRole, SessionState, SlotId};
pub use transport::{ChatRequest, ChatTransport, HttpTransport};
