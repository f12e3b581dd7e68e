//! Authentication module for the content site
//!
//! OAuth2 password grant for login, refresh-token grant for renewal. The
//! token record lives in a [`crate::storage::KeyValueStore`].

mod error;
mod fetch;
pub mod manager;
pub mod tokens;

pub use error::AuthError;
pub use fetch::RequestOptions;
pub use manager::TokenManager;
pub use tokens::Token;
