// src/web/mod.rs

pub mod handlers;
pub mod types;

pub use types::*;

use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::{
    catch, catchers, delete, get, options, patch, post, put, routes, Build, Request, Response,
    Rocket, State,
};
use tracing::{error, info};

use crate::core::AppConfig;
use crate::dispatcher::{Dispatcher, WorkerResponse};

pub struct Cors {
    policy: CorsPolicy,
}

impl Cors {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        for header in self.policy.headers() {
            response.set_header(header);
        }
        if response.content_type().is_none() {
            response.set_header(ContentType::JSON);
        }
    }
}

// The body is taken raw so malformed JSON surfaces as a validation error
#[post("/", data = "<body>")]
pub async fn worker(
    body: String,
    dispatcher: &State<Dispatcher>,
) -> Result<Json<WorkerResponse>, ApiError> {
    handlers::worker_handler(body, dispatcher).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

#[get("/<_..>")]
pub fn reject_get() -> ApiError {
    handlers::method_not_allowed_handler()
}

#[put("/<_..>")]
pub fn reject_put() -> ApiError {
    handlers::method_not_allowed_handler()
}

#[patch("/<_..>")]
pub fn reject_patch() -> ApiError {
    handlers::method_not_allowed_handler()
}

#[delete("/<_..>")]
pub fn reject_delete() -> ApiError {
    handlers::method_not_allowed_handler()
}

// Error catchers
#[catch(400)]
pub fn bad_request() -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Invalid request format"))
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(format!("No route for {}", request.uri())))
}

#[catch(500)]
pub fn internal_error() -> Json<ErrorResponse> {
    Json(ErrorResponse::new("Internal server error"))
}

#[catch(default)]
pub fn fallback(status: Status, _request: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(status.reason_lossy()))
}

pub fn build_rocket(figment: Figment, dispatcher: Dispatcher, cors: CorsPolicy) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors::new(cors))
        .manage(dispatcher)
        .register(
            "/",
            catchers![bad_request, not_found, internal_error, fallback],
        )
        .mount(
            "/",
            routes![
                worker,
                options,
                reject_get,
                reject_put,
                reject_patch,
                reject_delete
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: AppConfig) -> Result<()> {
    let dispatcher = Dispatcher::from_config(&config)?;

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port));

    info!("Starting profile matcher worker");
    info!(
        "Server: http://{}:{}",
        config.server.address, config.server.port
    );
    info!("Search mode: {:?}", config.search.mode);

    if let Err(e) = build_rocket(figment, dispatcher, CorsPolicy::default())
        .launch()
        .await
    {
        error!("Server failed: {}", e);
        return Err(anyhow::anyhow!("Server failed: {}", e));
    }

    Ok(())
}
