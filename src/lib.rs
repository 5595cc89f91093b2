pub mod chat;
pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod pipeline;
pub mod routes;
pub mod telemetry;

pub use config::Config;

use jobs::JobContext;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jobs: JobContext,
}
