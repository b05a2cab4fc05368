//! Request middleware and extractors

pub mod auth;

pub use auth::{issue_token, AuthUser, Claims, CurrentUser, OptionalUser};
