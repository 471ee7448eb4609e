pub mod cli;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod matching;
pub mod profile_analysis;
pub mod utils;
pub mod web;

#[cfg(test)]
mod testing;

pub use dispatcher::{Dispatcher, WorkerRequest, WorkerResponse};
pub use error::{PipelineError, PipelineResult};
pub use web::start_web_server;
