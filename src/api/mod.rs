pub mod handlers;

use crate::background::registry::TaskRegistry;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{Build, Rocket};
use serde_json::json;
use std::io::Cursor;

/// Error responder shared by all handlers. Renders the error-shaped JSON
/// body used across the API.
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub error: anyhow::Error,
}

impl ApiError {
    pub fn bad_request(error: anyhow::Error) -> Self {
        ApiError {
            status: Status::BadRequest,
            error,
        }
    }

    pub fn not_found(error: anyhow::Error) -> Self {
        ApiError {
            status: Status::NotFound,
            error,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'o> {
        let body = json!({
            "status": "error",
            "message": self.error.to_string(),
        })
        .to_string();

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl<E> From<E> for ApiError
where
    anyhow::Error: From<E>,
{
    fn from(err: E) -> Self {
        ApiError {
            status: Status::InternalServerError,
            error: anyhow::Error::from(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Assemble the Rocket instance serving the analysis API.
pub fn build(registry: TaskRegistry) -> Rocket<Build> {
    rocket::build()
        .manage(registry)
        .mount("/", handlers::analysis::generate_analysis_routes())
}
