pub mod worker_handlers;

pub use worker_handlers::*;
