use anyhow::anyhow;
use log::info;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{State, get, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{ApiError, ApiResult};
use crate::background::pipeline::AccentReport;
use crate::background::registry::{PollOutcome, TaskRegistry};

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub video_url: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub task_id: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusResponse {
    Processing { message: &'static str },
    Completed(AccentReport),
    Error { message: String },
}

/// Accept a video URL and queue the analysis. The task id in the response
/// is the handle for `GET /status/<task_id>`.
#[post("/analyze", format = "json", data = "<request>")]
pub async fn analyze(
    registry: &State<TaskRegistry>,
    request: Result<Json<AnalyzeRequest>, json::Error<'_>>,
) -> ApiResult<status::Accepted<Json<AnalyzeResponse>>> {
    let video_url = match request {
        Ok(body) => body.into_inner().video_url,
        Err(_) => return Err(ApiError::bad_request(anyhow!("No video URL provided."))),
    };
    if video_url.trim().is_empty() {
        return Err(ApiError::bad_request(anyhow!("No video URL provided.")));
    }
    info!("Video URL received: {}", video_url);

    let task_id = registry.submit(video_url);

    Ok(status::Accepted(Json(AnalyzeResponse {
        status: "processing",
        task_id: task_id.to_string(),
        message: "Analysis started.",
    })))
}

/// Report the state of a submitted task. A finished result is consumed by
/// the first poll that sees it; later polls get 404, same as ids that were
/// never issued.
#[get("/status/<task_id>")]
pub async fn task_status(
    registry: &State<TaskRegistry>,
    task_id: &str,
) -> ApiResult<Json<StatusResponse>> {
    let Ok(task_id) = Uuid::parse_str(task_id) else {
        return Err(ApiError::not_found(anyhow!("Task not found.")));
    };

    match registry.poll(task_id) {
        PollOutcome::Processing => Ok(Json(StatusResponse::Processing {
            message: "Still processing...",
        })),
        PollOutcome::Finished(Ok(report)) => Ok(Json(StatusResponse::Completed(report))),
        PollOutcome::Finished(Err(err)) => Ok(Json(StatusResponse::Error {
            message: err.to_string(),
        })),
        PollOutcome::Unknown => Err(ApiError::not_found(anyhow!("Task not found."))),
    }
}

pub fn generate_analysis_routes() -> Vec<rocket::Route> {
    routes![analyze, task_status]
}
