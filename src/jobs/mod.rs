pub mod download;
pub mod registry;
pub mod report;

pub use download::Downloader;
pub use registry::{FailureStage, JobFailure, JobRecord, JobRegistry, JobStatus};
pub use report::{JobContext, ReportJob, run_report_job, spawn_report_job};
