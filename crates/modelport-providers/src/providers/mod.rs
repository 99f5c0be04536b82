//! Provider variant implementations

pub mod local;
pub mod mock;
pub mod remote;

pub use local::{LocalProvider, DEFAULT_LOCAL_ENDPOINT};
pub use mock::MockProvider;
pub use remote::RemoteProvider;
