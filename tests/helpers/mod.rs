//! In-process mock of the Luna processing backend for integration tests

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use luna_job_tracker::config::ClientConfig;

pub const ARCHIVE_BYTES: &[u8] = b"PK\x03\x04luna-results";
pub const DEM_BYTES: &[u8] = b"II*\x00fake-geotiff";

/// One multipart part the backend received.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

pub struct MockState {
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub upload_response: Mutex<(u16, Value)>,
    pub status_script: Mutex<VecDeque<(u16, Value)>>,
    pub status_calls: AtomicUsize,
    pub last_auth: Mutex<Option<String>>,
    pub last_api_key: Mutex<Option<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            upload_response: Mutex::new((200, json!({ "job_id": "abc123", "status": "queued" }))),
            status_script: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            last_auth: Mutex::new(None),
            last_api_key: Mutex::new(None),
            deleted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

impl MockState {
    pub fn respond_to_upload(&self, code: u16, body: Value) {
        *self.upload_response.lock().unwrap() = (code, body);
    }

    pub fn push_status(&self, code: u16, body: Value) {
        self.status_script.lock().unwrap().push_back((code, body));
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn is_cancelled(&self, job_id: &str) -> bool {
        self.cancelled.lock().unwrap().iter().any(|id| id == job_id)
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/api/upload", post(upload))
            .route("/api/upload/formats", get(formats))
            .route("/api/upload/validate", post(validate))
            .route("/api/status/all", get(all_jobs))
            .route("/api/status/{job_id}", get(status))
            .route("/api/status/{job_id}/detailed", get(detailed_status))
            .route("/api/status/{job_id}/cancel", post(cancel))
            .route("/api/analysis/{job_id}/{report}", get(analysis))
            .route("/api/results/{job_id}/summary", get(summary))
            .route("/api/results/{job_id}/download", get(download))
            .route("/api/results/{job_id}/files", get(list_files))
            .route("/api/results/{job_id}/files/{filename}", get(file))
            .route("/api/results/{job_id}", delete(delete_result))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("No local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend error");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Client config pointed at this backend with a short poll interval.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::with_base_url(&self.base_url);
        config.poll_interval_ms = 100;
        config
    }
}

pub fn job_status(job_id: &str, status: &str, progress: f64) -> Value {
    let error_message = if status == "failed" {
        Value::from("SFS diverged")
    } else {
        Value::Null
    };

    json!({
        "job_id": job_id,
        "status": status,
        "progress": progress,
        "message": format!("Job is {}", status),
        "created_at": "2024-03-01T10:15:30.123456",
        "updated_at": "2024-03-01T10:16:00.000001",
        "error_message": error_message,
        "original_filename": "crater.png"
    })
}

fn reply(code: u16, body: Value) -> Response {
    let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(body)).into_response()
}

fn record_auth(state: &MockState, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *state.last_auth.lock().unwrap() = header("authorization");
    *state.last_api_key.lock().unwrap() = header("x-api-key");
}

async fn upload(State(state): State<Arc<MockState>>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();

        state.uploads.lock().unwrap().push(ReceivedUpload {
            field: name,
            file_name,
            content_type,
            size,
        });
    }

    let (code, body) = state.upload_response.lock().unwrap().clone();
    reply(code, body)
}

async fn status(
    State(state): State<Arc<MockState>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    record_auth(&state, &headers);

    let scripted = state.status_script.lock().unwrap().pop_front();
    match scripted {
        Some((code, body)) => reply(code, body),
        None if state.is_cancelled(&job_id) => {
            let mut body = job_status(&job_id, "cancelled", 50.0);
            body["message"] = json!("Job cancelled by user request");
            reply(200, body)
        }
        None => reply(200, job_status(&job_id, "processing", 50.0)),
    }
}

async fn cancel(State(state): State<Arc<MockState>>, Path(job_id): Path<String>) -> Response {
    if job_id == "done-job" || state.is_cancelled(&job_id) {
        let current = if job_id == "done-job" { "completed" } else { "cancelled" };
        return reply(
            400,
            json!({ "error": format!("Cannot cancel job in {} state", current) }),
        );
    }

    state.cancelled.lock().unwrap().push(job_id.clone());
    reply(
        200,
        json!({ "job_id": job_id, "status": "cancelled", "message": "Job cancelled successfully" }),
    )
}

async fn all_jobs() -> Response {
    reply(
        200,
        json!({
            "total_jobs": 3,
            "active_jobs": 1,
            "completed_jobs": 1,
            "failed_jobs": 1,
            "jobs": [
                job_status("j3", "processing", 40.0),
                job_status("j2", "failed", 55.0),
                job_status("j1", "completed", 100.0)
            ]
        }),
    )
}

async fn formats() -> Response {
    reply(
        200,
        json!({
            "supported_formats": ["png", "jpg", "jpeg", "tif", "tiff"],
            "max_file_size_mb": 50.0,
            "compatible_missions": ["Chandrayaan TMC/TMC-2/OHRC", "NASA LRO NAC/WAC"],
            "recommended_formats": [".png", ".tiff", ".jpg"],
            "processing_capabilities": ["Shape-from-Shading photoclinometry"]
        }),
    )
}

async fn validate(mut multipart: Multipart) -> Response {
    let mut received = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let size = field.bytes().await.map(|b| b.len()).unwrap_or_default();
        received = Some((file_name, size));
    }

    let Some((file_name, size)) = received else {
        return reply(400, json!({ "valid": false, "error": "No file provided" }));
    };

    let extension = file_name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    if !["png", "jpg", "jpeg", "tif", "tiff"].contains(&extension.as_str()) {
        return reply(
            400,
            json!({ "valid": false, "error": "Unsupported format. Allowed: png, jpg, jpeg, tif, tiff" }),
        );
    }

    let size_mb = size as f64 / (1024.0 * 1024.0);
    reply(
        200,
        json!({
            "valid": true,
            "filename": file_name,
            "file_size_mb": size_mb,
            "format": format!(".{}", extension),
            "message": "File validation successful"
        }),
    )
}

async fn analysis(Path((job_id, report)): Path<(String, String)>) -> Response {
    if job_id == "pending-job" {
        return reply(400, json!({ "error": "Job not completed yet" }));
    }

    match report.as_str() {
        "quality" => reply(
            200,
            json!({
                "job_id": job_id,
                "quality_analysis": { "quality_score": 85, "basic_stats": { "mean": 12.0 } },
                "processing_info": { "image_file": "crater.png", "iterations": 180, "converged": true }
            }),
        ),
        "metrics" => reply(
            200,
            json!({
                "job_id": job_id,
                "surface_metrics": {
                    "elevation_stats": { "min": -120.5, "max": 340.2 },
                    "slope_analysis": { "mean_slope_deg": 7.4 },
                    "roughness_metrics": {},
                    "mission_metrics": { "crater_candidates": 4 },
                    "quality_score": 85
                },
                "terrain_classification": {
                    "crater_features": 4,
                    "ridge_features": 2,
                    "flat_terrain_percent": 22.4,
                    "landing_sites": 3
                }
            }),
        ),
        "report" => reply(
            200,
            json!({ "job_id": job_id, "text_report": "LUNAR DEM ANALYSIS REPORT" }),
        ),
        "compare" => reply(
            200,
            json!({
                "job_id": job_id,
                "comparison_status": "not_implemented",
                "message": "Reference comparison feature coming soon",
                "available_comparisons": ["Mission-standard DEM comparison"]
            }),
        ),
        _ => reply(404, json!({ "error": "Not found" })),
    }
}

async fn detailed_status(Path(job_id): Path<String>) -> Response {
    let mut body = job_status(&job_id, "processing", 60.0);
    body["elapsed_time_seconds"] = json!(12.5);
    body["estimated_remaining_seconds"] = json!(8.3);
    body["processing_steps"] = json!([
        { "step": "Upload", "progress": 60.0 },
        { "step": "Validation", "progress": 50.0 },
        { "step": "Shape-from-Shading", "progress": 30.0 }
    ]);
    reply(200, body)
}

async fn summary(Path(job_id): Path<String>) -> Response {
    if job_id == "pending-job" {
        return reply(400, json!({ "error": "Job not completed yet" }));
    }

    reply(
        200,
        json!({
            "job_id": job_id,
            "status": "completed",
            "processing_info": {
                "image_file": "crater.png",
                "iterations": 180,
                "converged": true,
                "processed_at": "2024-03-01T10:20:00"
            },
            "analysis_results": {
                "quality_score": 85,
                "surface_statistics": { "mean_slope_deg": 7.4 }
            },
            "output_files": {
                "geotiff": "lunar_dem.tif",
                "obj_model": "lunar_surface.obj",
                "visualizations": ["ultra_clear_dem.png"],
                "analysis": ["analysis_report.txt"]
            },
            "download_zip": format!("luna_results_{}.zip", job_id),
            "completed_at": "2024-03-01T10:20:01"
        }),
    )
}

async fn download() -> Response {
    (StatusCode::OK, ARCHIVE_BYTES.to_vec()).into_response()
}

async fn list_files(Path(job_id): Path<String>) -> Response {
    reply(
        200,
        json!({
            "job_id": job_id,
            "total_files": 1,
            "files": [{
                "filename": "lunar_dem.tif",
                "path": "lunar_dem.tif",
                "size_bytes": DEM_BYTES.len(),
                "size_mb": 0.0,
                "type": "image",
                "mime_type": "image/tiff"
            }]
        }),
    )
}

async fn file(Path((_job_id, filename)): Path<(String, String)>) -> Response {
    if filename == "lunar_dem.tif" {
        (StatusCode::OK, DEM_BYTES.to_vec()).into_response()
    } else {
        reply(404, json!({ "error": "File not found" }))
    }
}

async fn delete_result(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record_auth(&state, &headers);
    if headers.get("authorization").is_none() {
        return reply(401, json!({ "error": "Missing Authorization Header" }));
    }
    state.deleted.lock().unwrap().push(id);
    reply(200, json!({ "success": true, "message": "Result deleted successfully" }))
}
