use std::path::Path;

use lopdf::Document;

use crate::error::{AppError, AppResult};

/// Returns the text of every page, in page order, concatenated as extracted.
#[tracing::instrument(name = "pipeline_stage extract", fields(pdf.pages))]
pub fn extract_text(path: &Path) -> AppResult<String> {
    if !path.is_file() {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a readable file", path.display()),
        )));
    }

    let doc = Document::load(path)
        .map_err(|e| AppError::Pdf(format!("failed to load {}: {e}", path.display())))?;

    let pages = doc.get_pages();
    tracing::Span::current().record("pdf.pages", pages.len());

    let mut text = String::new();
    for page_num in pages.keys() {
        let content = doc.extract_text(&[*page_num]).map_err(|e| {
            AppError::Pdf(format!(
                "failed to extract page {page_num} of {}: {e}",
                path.display()
            ))
        })?;
        text.push_str(&content);
    }

    Ok(text)
}
