//! HTTP edge: the transport seam and its typed errors.

pub mod error;
pub mod transport;

pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
