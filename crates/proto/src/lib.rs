//! Wire types shared by the HTTP server and its clients.

pub mod methods;

pub use crate::methods::*;
