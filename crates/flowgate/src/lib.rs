pub mod config;
pub mod filters;
pub mod http;
pub mod proxy;
pub mod router;
pub mod serve;

pub use flowgate_core::prelude::*;
