use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::jobs::{ReportJob, spawn_report_job};

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub file_urls: Vec<String>,
    pub template_html_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportResponse {
    pub message: String,
    pub request_id: Uuid,
    pub folder_path: String,
}

/// Schedules the report job and answers at once. The work directory is
/// created by the job, not here.
#[tracing::instrument(name = "generate_report", skip_all, fields(report.request_id))]
pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> AppResult<Json<GenerateReportResponse>> {
    let request_id = Uuid::new_v4();
    tracing::Span::current().record("report.request_id", request_id.to_string());

    tracing::info!(
        files = ?request.file_urls,
        template = %request.template_html_url,
        "Received a new report generation request with ID: {request_id}"
    );

    let work_dir = state.config.results_dir.join(request_id.to_string());
    let folder_path = std::path::absolute(&work_dir)?;

    spawn_report_job(
        state.jobs.clone(),
        ReportJob {
            request_id,
            file_urls: request.file_urls,
            template_html_url: request.template_html_url,
            work_dir,
        },
    );

    Ok(Json(GenerateReportResponse {
        message: "Report generation started".to_string(),
        request_id,
        folder_path: folder_path.display().to_string(),
    }))
}
