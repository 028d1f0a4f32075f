//! Contract drivers
//!
//! Each driver owns a [`ContractClient`](crate::client::ContractClient) and
//! asserts one part of the service surface. Drivers never share state; the
//! suite composes them per scenario.

pub mod notify;
pub mod resource;
pub mod session;
pub mod upload;

pub use notify::NotificationContract;
pub use resource::ResourceContractRunner;
pub use session::{SessionLifecycleVerifier, SessionState};
pub use upload::UploadContractVerifier;
