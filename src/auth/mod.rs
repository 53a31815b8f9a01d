//! Authentication session lifecycle.
//!
//! ARCHITECTURE
//! ============
//! - `store`: `CredentialStore`, the only writer of `Session`
//! - `interceptor`: `AuthenticatedClient`, 401 recovery around the transport
//! - `single_flight`: the one-refresh-at-a-time primitive behind the store's refresh
//! - `guards`: pre-navigation checks that read the store

pub mod guards;
pub mod interceptor;
pub mod single_flight;
pub mod store;

pub use guards::{AuthBootstrap, GuardOutcome, RenderMode, admin_guard, auth_guard, guest_guard};
pub use interceptor::AuthenticatedClient;
pub use single_flight::{Flight, SingleFlight};
pub use store::{AUTH_STORAGE_KEY, CredentialStore, RefreshOutcome, Session};
