pub mod convert;
pub mod extract;
pub mod orchestrator;
pub mod prompt;

pub use convert::{SavedReport, convert_report, docx_path, write_report};
pub use extract::extract_text;
pub use orchestrator::ReportGenerator;
pub use prompt::{PromptBuilder, SourceDocument};
