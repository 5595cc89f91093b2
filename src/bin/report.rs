use std::sync::Arc;

use report_synthesizer::Config;
use report_synthesizer::llm::CompletionClient;
use report_synthesizer::llm::openai::OpenAIProvider;
use report_synthesizer::pipeline::{PromptBuilder, ReportGenerator};
use report_synthesizer::telemetry::init_cli_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_cli_logging();
    let config = Config::from_env()?;

    let provider = OpenAIProvider::new(
        config.openai_api_key.as_deref(),
        config.openai_base_url.as_deref(),
    )?;
    let client = CompletionClient::new(Arc::new(provider), config.llm_model.clone());

    let inputs = &config.batch;
    let generator = ReportGenerator::new(
        client,
        PromptBuilder::investor_pack(
            &inputs.investor_pdf,
            &inputs.kpi_pdf,
            &inputs.portfolio_pdf,
            &inputs.template_html,
        ),
    );

    let saved = generator.save_summary_to_file(&inputs.output_html).await?;
    println!(
        "Summary has been generated and saved to '{}'.",
        saved.html_path.display()
    );

    Ok(())
}
