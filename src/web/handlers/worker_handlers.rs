// src/web/handlers/worker_handlers.rs

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

use crate::dispatcher::{Dispatcher, WorkerResponse};
use crate::web::types::{ApiError, ErrorResponse};

pub async fn worker_handler(
    body: String,
    dispatcher: &State<Dispatcher>,
) -> Result<Json<WorkerResponse>, ApiError> {
    match dispatcher.dispatch(&body).await {
        Ok(response) => {
            info!("Request completed");
            Ok(Json(response))
        }
        Err(e) => {
            let status = e.status_code();
            Err((status, Json(ErrorResponse::from(e))))
        }
    }
}

pub fn method_not_allowed_handler() -> ApiError {
    ErrorResponse::with_status(Status::MethodNotAllowed, "Method not allowed")
}
