//! Data models for Snippy entities

mod link;
mod user;

pub use link::*;
pub use user::*;
