use std::sync::Arc;

use tokio::io::BufReader;

use report_synthesizer::Config;
use report_synthesizer::chat::{DocumentChat, run_session};
use report_synthesizer::llm::CompletionClient;
use report_synthesizer::llm::openai::OpenAIProvider;
use report_synthesizer::pipeline::extract_text;
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

    let pdf = config.ask_pdf.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&pdf)).await??;

    let mut chat = DocumentChat::new(client, &text);
    run_session(
        &mut chat,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
