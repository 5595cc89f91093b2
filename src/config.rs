use std::env;
use std::path::PathBuf;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub results_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub llm_model: String,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
    pub batch: BatchInputs,
    pub ask_pdf: PathBuf,
}

/// Fixed local inputs for the `report` binary.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub investor_pdf: PathBuf,
    pub kpi_pdf: PathBuf,
    pub portfolio_pdf: PathBuf,
    pub template_html: PathBuf,
    pub output_html: PathBuf,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port = var_or("APP_PORT", "8080")
            .parse::<u16>()
            .context("APP_PORT must be a number")?;

        Ok(Self {
            port,
            environment: var_or("SCOUT_ENVIRONMENT", "development"),
            results_dir: var_or("RESULTS_DIR", "results").into(),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            llm_model: var_or("LLM_MODEL", "gpt-4o"),
            otel_service_name: var_or("OTEL_SERVICE_NAME", "report-synthesizer"),
            otel_exporter_endpoint: var_or(
                "OTEL_EXPORTER_OTLP_ENDPOINT",
                "http://localhost:4317",
            ),
            batch: BatchInputs {
                investor_pdf: var_or(
                    "REPORT_INVESTOR_PDF",
                    "docs/report_data/Investor presentation.pdf",
                )
                .into(),
                kpi_pdf: var_or("REPORT_KPI_PDF", "docs/report_data/KPI.pdf").into(),
                portfolio_pdf: var_or(
                    "REPORT_PORTFOLIO_PDF",
                    "docs/report_data/portfolio_investments.pdf",
                )
                .into(),
                template_html: var_or("REPORT_TEMPLATE_HTML", "template/report2.html").into(),
                output_html: var_or("REPORT_OUTPUT_HTML", "template/output_report.html").into(),
            },
            ask_pdf: var_or("ASK_PDF", "docs/KPI Update.pdf").into(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for tests; never reads the process environment.
    pub fn for_tests(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            environment: "test".to_string(),
            results_dir: results_dir.into(),
            openai_api_key: Some("sk-test".to_string()),
            openai_base_url: None,
            llm_model: "gpt-4o".to_string(),
            otel_service_name: "report-synthesizer".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
            batch: BatchInputs {
                investor_pdf: "investor.pdf".into(),
                kpi_pdf: "kpi.pdf".into(),
                portfolio_pdf: "portfolio.pdf".into(),
                template_html: "template.html".into(),
                output_html: "output_report.html".into(),
            },
            ask_pdf: "ask.pdf".into(),
        }
    }
}
