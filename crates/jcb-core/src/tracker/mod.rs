//! Jira REST access: transport port, session handling and query execution.

pub mod executor;
pub mod session;
pub mod transport;

pub use executor::QueryExecutor;
pub use session::{Credentials, Session, SessionManager};
pub use transport::{TrackerResponse, TrackerTransport};
