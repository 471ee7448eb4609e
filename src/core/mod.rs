// src/core/mod.rs
//! Configuration, HTTP plumbing and deadlines shared by every pipeline stage

pub mod config;
pub mod service_client;
pub mod sleeper;
pub mod timeout;

pub use config::{AppConfig, SearchMode};
pub use service_client::{Credential, ServiceClient};
pub use sleeper::{Sleeper, TokioSleeper};
pub use timeout::guard;
