//! Core library with shared types, traits, and error handling.
//!
//! - Error type with automatic HTTP response conversion
//! - Request validation (`Validate`, `ValidJson`)
//! - String helpers
//! - JWT issuing/validation and auth extractors (with `jwt` feature)

pub mod error;
#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(feature = "jwt")]
pub mod request_ext;
pub mod str_ext;
pub mod validation;

pub use error::{AppError, AppResult, ErrorBody, OptionStatusExt, StatusExt};
#[cfg(feature = "jwt")]
pub use jwt::{AuthInfo, IssuedToken, JwtError, JwtSubject, JwtValidator, UserRole};
#[cfg(feature = "jwt")]
pub use request_ext::AdminAuth;
pub use str_ext::StrExt;
pub use validation::{Validate, ValidJson};
