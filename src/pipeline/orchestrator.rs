use std::path::Path;
use std::time::Instant;

use crate::error::AppResult;
use crate::llm::CompletionClient;
use crate::telemetry::metrics::{REPORT_GENERATION_DURATION, REPORT_PROMPT_SIZE};

use super::convert::{SavedReport, convert_report, write_report};
use super::prompt::PromptBuilder;

/// Composes prompt assembly, the completion call and the file conversion over
/// inputs that are already on local disk.
pub struct ReportGenerator {
    client: CompletionClient,
    prompt_builder: PromptBuilder,
}

impl ReportGenerator {
    pub fn new(client: CompletionClient, prompt_builder: PromptBuilder) -> Self {
        Self {
            client,
            prompt_builder,
        }
    }

    #[tracing::instrument(name = "pipeline report.generate", skip(self), fields(report.state = "idle"))]
    pub async fn generate_summary(&self) -> AppResult<String> {
        let builder = self.prompt_builder.clone();
        let prompt = tokio::task::spawn_blocking(move || builder.build_prompt()).await??;
        REPORT_PROMPT_SIZE.record(prompt.len() as f64, &[]);

        let summary = self.client.summarize(&prompt).await?;
        tracing::Span::current().record("report.state", "generated");
        Ok(summary)
    }

    /// Generates the report and writes `<output>` plus `<output>.docx`. The
    /// first failure aborts; files written before it are left in place.
    #[tracing::instrument(
        name = "pipeline report",
        skip(self),
        fields(report.output = %output.display(), report.state, report.duration_ms)
    )]
    pub async fn save_summary_to_file(&self, output: &Path) -> AppResult<SavedReport> {
        let start = Instant::now();
        tracing::info!("Generating summary and saving to '{}'", output.display());

        let summary = self.generate_summary().await?;
        let span = tracing::Span::current();
        span.record("report.state", "generated");

        let output_path = output.to_path_buf();
        tokio::task::spawn_blocking(move || write_report(&summary, &output_path)).await??;
        span.record("report.state", "written");

        let output_path = output.to_path_buf();
        let saved = tokio::task::spawn_blocking(move || convert_report(&output_path)).await??;
        span.record("report.state", "done");

        let duration = start.elapsed();
        REPORT_GENERATION_DURATION.record(duration.as_secs_f64(), &[]);
        span.record("report.duration_ms", duration.as_millis() as u64);

        tracing::info!(
            docx = %saved.docx_path.display(),
            "Summary has been generated and saved to '{}'",
            saved.html_path.display()
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::AppError;
    use crate::llm::testing::RecordingProvider;
    use crate::llm::{REPORT_INSTRUCTION, Role};
    use crate::pipeline::extract::testing::write_pdf;

    fn inputs(dir: &Path) -> PromptBuilder {
        let a = dir.join("File1.pdf");
        let b = dir.join("File2.pdf");
        let template = dir.join("template.html");
        write_pdf(&a, &["Alpha"]);
        write_pdf(&b, &["Beta"]);
        std::fs::write(&template, "<h1>{{title}}</h1>").unwrap();
        PromptBuilder::positional(&[a, b], template)
    }

    #[tokio::test]
    async fn test_generate_summary_sends_assembled_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let builder = inputs(dir.path());
        let expected_prompt = builder.build_prompt().unwrap();

        let provider = Arc::new(RecordingProvider::replying("<h1>Done</h1>"));
        let generator = ReportGenerator::new(CompletionClient::new(provider.clone(), "gpt-4o"), builder);

        assert_eq!(generator.generate_summary().await.unwrap(), "<h1>Done</h1>");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(calls[0][0].content, REPORT_INSTRUCTION);
        assert_eq!(calls[0][1].role, Role::User);
        assert_eq!(calls[0][1].content, expected_prompt);
    }

    #[tokio::test]
    async fn test_save_summary_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let builder = inputs(dir.path());
        let provider = Arc::new(RecordingProvider::replying("<h1>Done</h1><p>Body</p>"));
        let generator = ReportGenerator::new(CompletionClient::new(provider, "gpt-4o"), builder);

        let output = dir.path().join("output_report.html");
        let saved = generator.save_summary_to_file(&output).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&saved.html_path).unwrap(),
            "<h1>Done</h1><p>Body</p>"
        );
        assert!(std::fs::metadata(&saved.docx_path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_conversion_failure_keeps_written_html() {
        let dir = tempfile::tempdir().unwrap();
        let builder = inputs(dir.path());
        let provider = Arc::new(RecordingProvider::replying("<p>Kept</p>"));
        let generator = ReportGenerator::new(CompletionClient::new(provider, "gpt-4o"), builder);

        let output = dir.path().join("output_report.html");
        // a directory where the DOCX should go makes the conversion step fail
        std::fs::create_dir(dir.path().join("output_report.html.docx")).unwrap();

        let err = generator.save_summary_to_file(&output).await.unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "<p>Kept</p>");
    }

    #[tokio::test]
    async fn test_llm_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let builder = inputs(dir.path());
        let provider = Arc::new(RecordingProvider::failing("401 unauthorized"));
        let generator = ReportGenerator::new(CompletionClient::new(provider, "gpt-4o"), builder);

        let output = dir.path().join("output_report.html");
        let err = generator.save_summary_to_file(&output).await.unwrap_err();

        assert!(matches!(err, AppError::Llm(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_input_stops_before_llm_call() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.html");
        std::fs::write(&template, "<p/>").unwrap();
        let builder = PromptBuilder::positional(&[dir.path().join("File1.pdf")], template);

        let provider = Arc::new(RecordingProvider::replying("unused"));
        let generator = ReportGenerator::new(CompletionClient::new(provider.clone(), "gpt-4o"), builder);

        assert!(generator.generate_summary().await.is_err());
        assert!(provider.calls().is_empty());
    }
}
