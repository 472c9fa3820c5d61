//! Inbound HTTP surface.

pub mod error;
pub mod proxy;
pub mod routes;
pub mod status;

pub use routes::*;
