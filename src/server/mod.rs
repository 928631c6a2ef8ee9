//! Connection handling: acceptor, sessions and the presence registry.

pub mod acceptor;
pub mod context;
pub mod registry;
pub mod session;
pub mod state;
pub mod wire;

pub use acceptor::{Acceptor, SequentialUsernames, UsernameSource};
pub use context::SessionContext;
pub use registry::Registry;
pub use session::{Session, SessionLimits};
pub use state::ServerState;
