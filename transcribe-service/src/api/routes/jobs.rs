//! `/api/jobs` routes (`spec.md` §4.6).

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    DownloadQuery, JobView, ListJobsQuery, ListJobsResponse, SubmitJobForm, SubmitJobResponse,
};
use crate::api::server::AppState;
use crate::domain::{generate_job_id, Job};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/{id}", get(get_job).delete(delete_job))
        .route("/jobs/{id}/download", get(download_job))
}

/// `POST /jobs`: accepts either `application/x-www-form-urlencoded` (the
/// `url` case) or `multipart/form-data` (the `file` case); 400 if neither a
/// URL nor a file is present (`spec.md` §6, §8).
async fn submit_job(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (url, filename, input_path, webhook_url) = if content_type.starts_with("multipart/") {
        parse_multipart(&state, content_type, body).await?
    } else {
        parse_urlencoded(&body)?
    };

    if url.is_none() && input_path.is_none() {
        return Err(ApiError::bad_request("submit either 'url' or 'file'"));
    }

    let job_id = generate_job_id();
    let job = Job::new(
        job_id.clone(),
        url,
        filename,
        input_path,
        webhook_url,
        chrono::Utc::now(),
        state.settings.job_retention,
    );

    state
        .processor
        .submit(&job)
        .await
        .map_err(ApiError::from)?;

    let response = SubmitJobResponse {
        job_id,
        status: job.status,
        message: "job queued".to_string(),
    };
    Ok((axum::http::StatusCode::CREATED, Json(response)).into_response())
}

async fn parse_urlencoded(
    body: &[u8],
) -> ApiResult<(Option<String>, Option<String>, Option<String>, Option<String>)> {
    let form: SubmitJobForm = serde_urlencoded::from_bytes(body)
        .map_err(|e| ApiError::bad_request(format!("invalid form body: {e}")))?;
    Ok((form.url, None, None, form.webhook_url))
}

async fn parse_multipart(
    state: &AppState,
    content_type: &str,
    body: axum::body::Bytes,
) -> ApiResult<(Option<String>, Option<String>, Option<String>, Option<String>)> {
    // `Multipart` parses from a `Body`/stream; reconstruct one from the
    // already-buffered bytes so both submission encodings share one handler
    // signature.
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| ApiError::bad_request(format!("invalid multipart boundary: {e}")))?;
    let mut multipart = Multipart::new(futures::stream::once(async move { Ok::<_, std::io::Error>(body) }), boundary);

    let mut url = None;
    let mut webhook_url = None;
    let mut filename = None;
    let mut input_path = None;

    let job_id_hint = generate_job_id();
    let scratch_dir = state.settings.jobs_root().join("uploads");
    crate::utils::fs::ensure_dir_all(&scratch_dir)
        .await
        .map_err(ApiError::from)?;

    while let Ok(Some(field)) = multipart.next_field().await {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "url" => {
                url = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("reading 'url' field: {e}")))?,
                );
            }
            "webhook_url" => {
                webhook_url = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("reading 'webhook_url' field: {e}")))?,
                );
            }
            "file" => {
                let original_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("reading 'file' field: {e}")))?;
                let dest = scratch_dir.join(&job_id_hint);
                tokio::fs::write(&dest, &bytes)
                    .await
                    .map_err(|e| crate::Error::io_path("write uploaded file", &dest, e))
                    .map_err(ApiError::from)?;
                input_path = Some(dest.to_string_lossy().into_owned());
                filename = original_name;
            }
            _ => {}
        }
    }

    Ok((url, filename, input_path, webhook_url))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<JobView>> {
    let job = state.store.get(&id).await.map_err(ApiError::from)?;
    let job = job.ok_or_else(|| ApiError::not_found(format!("job '{id}' not found")))?;
    Ok(Json(JobView::from(&job)))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<ListJobsResponse>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let offset = query.offset.unwrap_or(0).max(0);

    let jobs = state
        .store
        .list(query.status, limit, offset)
        .await
        .map_err(ApiError::from)?;
    let total = state.store.count(query.status).await.map_err(ApiError::from)?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.iter().map(JobView::from).collect(),
        total,
        limit,
        offset,
    }))
}

async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<axum::http::StatusCode> {
    state.processor.delete(&id).await.map_err(ApiError::from)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn download_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let job = state
        .store
        .get(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("job '{id}' not found")))?;

    if job.status != crate::domain::JobStatus::Completed {
        return Err(ApiError::bad_request("job is not completed"));
    }

    let path = match query.format.as_str() {
        "json" => job.output_json.as_deref(),
        "txt" => job.output_txt.as_deref(),
        "srt" => job.output_srt.as_deref(),
        "md" => job.output_md.as_deref(),
        other => return Err(ApiError::bad_request(format!("unknown format '{other}'"))),
    };
    let path = path.ok_or_else(|| ApiError::not_found("artifact not available"))?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| ApiError::not_found("artifact missing on disk"))?;

    let content_type = match query.format.as_str() {
        "json" => "application/json",
        "srt" => "application/x-subrip",
        "md" => "text/markdown",
        _ => "text/plain",
    };

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        bytes,
    )
        .into_response())
}
