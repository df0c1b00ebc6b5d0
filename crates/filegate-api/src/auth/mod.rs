//! Credential authentication
//!
//! The principal credential travels in the `X-API-Key` header as an HS256 token.
//! A verified principal is registered on first sight and attached to the request.

pub mod middleware;

pub use middleware::{auth_middleware, authenticate, AuthPrincipal, API_KEY_HEADER};
