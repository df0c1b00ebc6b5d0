//! Data models shared by the gateway, its stores and the client.

mod access;
mod multipart;
mod object;
mod principal;

pub use access::*;
pub use multipart::*;
pub use object::*;
pub use principal::*;
