use std::path::PathBuf;

use crate::error::{AppError, AppResult};

use super::extract::extract_text;

const TEMPLATE_LABEL: &str = "Report Template";

/// A PDF input together with the label its text is wrapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub label: String,
    pub path: PathBuf,
}

impl SourceDocument {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }

    /// `File1`, `File2`, ... for inputs whose role is not known up front.
    pub fn positional(index: usize, path: impl Into<PathBuf>) -> Self {
        Self::new(format!("File{index}"), path)
    }
}

pub fn tag(label: &str, body: &str) -> String {
    format!("<{label} Start>{body}<{label} End>")
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    documents: Vec<SourceDocument>,
    template: PathBuf,
}

impl PromptBuilder {
    pub fn new(documents: Vec<SourceDocument>, template: impl Into<PathBuf>) -> Self {
        Self {
            documents,
            template: template.into(),
        }
    }

    /// Labels each path by its position, starting at `File1`.
    pub fn positional(paths: &[PathBuf], template: impl Into<PathBuf>) -> Self {
        let documents = paths
            .iter()
            .enumerate()
            .map(|(i, p)| SourceDocument::positional(i + 1, p))
            .collect();
        Self::new(documents, template)
    }

    /// Company overview, KPI and portfolio documents, in that order.
    pub fn investor_pack(
        investor_pdf: impl Into<PathBuf>,
        kpi_pdf: impl Into<PathBuf>,
        portfolio_pdf: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            vec![
                SourceDocument::new("Investor Presentation", investor_pdf),
                SourceDocument::new("KPI File", kpi_pdf),
                SourceDocument::new("Portfolio Investments", portfolio_pdf),
            ],
            template,
        )
    }

    fn read_template(&self) -> AppResult<String> {
        let bytes = std::fs::read(&self.template)?;
        String::from_utf8(bytes).map_err(|e| {
            AppError::Decode(format!(
                "template {} is not valid UTF-8: {e}",
                self.template.display()
            ))
        })
    }

    /// Tagged documents in input order, then the tagged template. Nothing is
    /// inserted between segments.
    #[tracing::instrument(
        name = "pipeline_stage prompt",
        skip(self),
        fields(prompt.documents = self.documents.len(), prompt.bytes)
    )]
    pub fn build_prompt(&self) -> AppResult<String> {
        let mut prompt = String::new();
        for document in &self.documents {
            let text = extract_text(&document.path)?;
            prompt.push_str(&tag(&document.label, &text));
        }

        let template = self.read_template()?;
        prompt.push_str(&tag(TEMPLATE_LABEL, &template));

        tracing::Span::current().record("prompt.bytes", prompt.len());
        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::testing::write_pdf;

    #[test]
    fn test_tag_format() {
        assert_eq!(tag("KPI File", "x"), "<KPI File Start>x<KPI File End>");
    }

    #[test]
    fn test_positional_labels_are_one_based() {
        let builder = PromptBuilder::positional(
            &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            "t.html",
        );
        let labels: Vec<&str> = builder.documents.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["File1", "File2"]);
    }

    #[test]
    fn test_prompt_is_ordered_concatenation() {
        let dir = tempfile::tempdir().unwrap();
        let investor = dir.path().join("investor.pdf");
        let kpi = dir.path().join("kpi.pdf");
        let portfolio = dir.path().join("portfolio.pdf");
        let template = dir.path().join("template.html");
        write_pdf(&investor, &["Overview"]);
        write_pdf(&kpi, &["Metrics"]);
        write_pdf(&portfolio, &["Holdings"]);
        std::fs::write(&template, "<html><style>h1{}</style></html>").unwrap();

        let builder = PromptBuilder::investor_pack(&investor, &kpi, &portfolio, &template);
        let prompt = builder.build_prompt().unwrap();

        let expected = [
            tag("Investor Presentation", &extract_text(&investor).unwrap()),
            tag("KPI File", &extract_text(&kpi).unwrap()),
            tag("Portfolio Investments", &extract_text(&portfolio).unwrap()),
            tag("Report Template", "<html><style>h1{}</style></html>"),
        ]
        .concat();
        assert_eq!(prompt, expected);

        let overview = prompt.find("Overview").unwrap();
        let metrics = prompt.find("Metrics").unwrap();
        let holdings = prompt.find("Holdings").unwrap();
        assert!(overview < metrics && metrics < holdings);
        assert!(prompt.ends_with("<Report Template End>"));
    }

    #[test]
    fn test_template_only_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.html");
        std::fs::write(&template, "<p>T</p>").unwrap();

        let prompt = PromptBuilder::new(vec![], &template).build_prompt().unwrap();
        assert_eq!(prompt, "<Report Template Start><p>T</p><Report Template End>");
    }

    #[test]
    fn test_non_utf8_template_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.html");
        std::fs::write(&template, [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let err = PromptBuilder::new(vec![], &template).build_prompt().unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_missing_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.html");
        std::fs::write(&template, "<p>T</p>").unwrap();

        let builder = PromptBuilder::positional(&[dir.path().join("File1.pdf")], &template);
        assert!(matches!(builder.build_prompt(), Err(AppError::Io(_))));
    }
}
