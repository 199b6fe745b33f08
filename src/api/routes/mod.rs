//! API Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod posts;
pub mod users;
