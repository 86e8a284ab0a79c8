pub mod auth;
pub mod categories;
pub mod error;
pub mod tasks;

pub use error::{ApiError, ErrorDetail, ServiceError};
