use std::path::{Path, PathBuf};

use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::download::Downloader;
use super::registry::{FailureStage, JobFailure, JobRegistry, JobStatus};
use crate::error::AppError;
use crate::llm::CompletionClient;
use crate::pipeline::{PromptBuilder, ReportGenerator};
use crate::telemetry::metrics::{JOBS_FAILED, JOBS_STARTED, JOBS_SUCCEEDED};

pub const TEMPLATE_FILE: &str = "template.html";
pub const OUTPUT_FILE: &str = "output_report.html";

/// Everything a background report job needs besides its own request.
#[derive(Clone)]
pub struct JobContext {
    pub downloader: Downloader,
    pub completion: CompletionClient,
    pub registry: JobRegistry,
    pub tracker: TaskTracker,
}

impl JobContext {
    pub fn new(downloader: Downloader, completion: CompletionClient) -> Self {
        Self {
            downloader,
            completion,
            registry: JobRegistry::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Stops accepting new jobs and waits for the running ones to reach a
    /// terminal status.
    pub async fn drain(&self) {
        self.tracker.close();
        tracing::info!(in_flight = self.tracker.len(), "Waiting for report jobs");
        self.tracker.wait().await;
    }
}

#[derive(Debug, Clone)]
pub struct ReportJob {
    pub request_id: Uuid,
    pub file_urls: Vec<String>,
    pub template_html_url: String,
    pub work_dir: PathBuf,
}

/// `File1.pdf`, `File2.pdf`, ... inside the work directory.
pub fn input_path(work_dir: &Path, index: usize) -> PathBuf {
    work_dir.join(format!("File{index}.pdf"))
}

/// Registers the job as pending and runs it on the context's tracker,
/// detached from the caller.
pub fn spawn_report_job(ctx: JobContext, job: ReportJob) -> tokio::task::JoinHandle<JobStatus> {
    ctx.registry
        .insert_pending(job.request_id, job.work_dir.clone());
    JOBS_STARTED.add(1, &[]);

    let span = tracing::info_span!(
        "report.job",
        report.request_id = %job.request_id,
        report.files = job.file_urls.len(),
    );
    let tracker = ctx.tracker.clone();
    tracker.spawn(run_report_job(ctx, job).instrument(span))
}

/// Downloads inputs and produces the report. Steps run strictly in order and
/// the first failure ends the job; nothing is retried or cleaned up.
pub async fn run_report_job(ctx: JobContext, job: ReportJob) -> JobStatus {
    ctx.registry.mark_running(job.request_id);

    let status = match execute(&ctx, &job).await {
        Ok(status) => {
            JOBS_SUCCEEDED.add(1, &[]);
            tracing::info!(request_id = %job.request_id, "Report job finished");
            status
        }
        Err(failure) => {
            JOBS_FAILED.add(1, &[]);
            tracing::error!(
                request_id = %failure.request_id,
                stage = ?failure.stage,
                error = %failure.error,
                "Report job failed"
            );
            JobStatus::Failed(failure)
        }
    };

    ctx.registry.finish(job.request_id, status.clone());
    status
}

async fn execute(ctx: &JobContext, job: &ReportJob) -> Result<JobStatus, JobFailure> {
    let fail = |stage: FailureStage| {
        let request_id = job.request_id;
        move |err: AppError| JobFailure::new(request_id, stage, err)
    };

    tokio::fs::create_dir_all(&job.work_dir)
        .await
        .map_err(|e| fail(FailureStage::WorkDirectory)(e.into()))?;

    let template_path = job.work_dir.join(TEMPLATE_FILE);
    ctx.downloader
        .fetch_to(&job.template_html_url, &template_path)
        .await
        .map_err(fail(FailureStage::TemplateDownload))?;

    let mut file_paths = Vec::with_capacity(job.file_urls.len());
    for (index, url) in job.file_urls.iter().enumerate() {
        let path = input_path(&job.work_dir, index + 1);
        ctx.downloader
            .fetch_to(url, &path)
            .await
            .map_err(fail(FailureStage::FileDownload))?;
        file_paths.push(path);
    }

    tracing::info!("Running ReportGenerator");
    let generator = ReportGenerator::new(
        ctx.completion.clone(),
        PromptBuilder::positional(&file_paths, template_path),
    );
    let output = job.work_dir.join(OUTPUT_FILE);
    // own task, so a panic in parsing or the provider fails only this job
    let saved = tokio::spawn(
        async move { generator.save_summary_to_file(&output).await }.in_current_span(),
    )
    .await
    .map_err(AppError::from)
    .and_then(|result| result)
    .map_err(fail(FailureStage::Generation))?;

    Ok(JobStatus::Succeeded {
        output_html: saved.html_path,
        output_docx: saved.docx_path,
    })
}
