//! Authentication
//!
//! - [`TokenService`]: issues and validates HS256 tokens carrying flat
//!   [`Claims`]
//! - [`password`]: bcrypt hashing on the blocking pool

mod error;
pub mod password;
mod token;

pub use error::{AuthError, AuthResult};
pub use token::{Claims, TokenService};
