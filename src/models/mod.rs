//! Wire DTOs for the gallery REST API.
//!
//! DESIGN
//! ======
//! Field names follow the API's camelCase JSON. Optional server fields
//! default on absence so partial payloads (login stubs, list summaries)
//! still decode.

pub mod auth;
pub mod cart;
pub mod notification;
pub mod page;
pub mod user;

pub use auth::{AuthResponse, LoginCredentials, MessageResponse, RegisterData};
pub use page::{ListParams, Page, Pagination};
pub use user::{Role, User, UserPreferences, UserProfile, UserStatus};

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
