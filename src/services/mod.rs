//! Thin endpoint wrappers over `ApiClient`.
//!
//! Services own paths, query strings and request bodies. They hold no state
//! and surface `ApiError` unchanged; the stores decide what a failure means.

pub mod cart;
pub mod notifications;
pub mod users;

pub use cart::{CartOwner, CartService};
pub use notifications::NotificationService;
pub use users::UserService;
