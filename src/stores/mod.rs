//! Client-side state stores built on the services.
//!
//! Each store keeps its state behind a `std::sync::RwLock` that is never
//! held across an `.await`, and exposes `snapshot()` for rendering.

pub mod cart;
pub mod notifications;
pub mod users;

pub use cart::{CART_STORAGE_KEY, CartState, CartStore};
pub use notifications::{NotificationState, NotificationStore};
pub use users::{UserAdminState, UserAdminStore};
