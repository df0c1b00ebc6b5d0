pub mod cors;

pub use cors::{cors_layer, preflight_no_content};
