use std::fs::File;
use std::path::{Path, PathBuf};

use docx_rs::{BreakType, Docx, Paragraph, Run, Table, TableCell, TableRow};
use scraper::{ElementRef, Html};
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SavedReport {
    pub html_path: PathBuf,
    pub docx_path: PathBuf,
}

/// `<output>.docx`, keeping the original extension in place.
pub fn docx_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".docx");
    PathBuf::from(name)
}

/// Writes the model output verbatim.
#[tracing::instrument(name = "pipeline_stage write", skip(html), fields(report.bytes = html.len()))]
pub fn write_report(html: &str, output: &Path) -> AppResult<()> {
    std::fs::write(output, html)?;
    Ok(())
}

/// Converts an already written report to `<output>.docx`.
#[tracing::instrument(name = "pipeline_stage convert")]
pub fn convert_report(output: &Path) -> AppResult<SavedReport> {
    let docx = docx_path(output);
    convert_html_file(output, &docx)?;

    Ok(SavedReport {
        html_path: output.to_path_buf(),
        docx_path: docx,
    })
}

pub fn convert_html_file(html_path: &Path, docx_path: &Path) -> AppResult<()> {
    let html = std::fs::read_to_string(html_path)?;
    let blocks = parse_blocks(&html);

    let file = File::create(docx_path)?;
    render_docx(&blocks)
        .build()
        .pack(file)
        .map_err(|e| AppError::Conversion(format!("{}: {e}", docx_path.display())))?;

    tracing::debug!(blocks = blocks.len(), path = %docx_path.display(), "DOCX written");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(Vec<Span>),
    ListItem(Vec<Span>),
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text {
        text: String,
        bold: bool,
        italic: bool,
    },
    Break,
}

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    bold: bool,
    italic: bool,
}

impl Style {
    fn apply(mut self, tag: &str) -> Self {
        match tag {
            "b" | "strong" | "th" => self.bold = true,
            "i" | "em" => self.italic = true,
            _ => {}
        }
        self
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
        .trim()
        .to_string()
}

fn has_text(spans: &[Span]) -> bool {
    spans.iter().any(|s| match s {
        Span::Text { text, .. } => !text.trim().is_empty(),
        Span::Break => false,
    })
}

/// Flattens an HTML document into the block sequence written to DOCX.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();
    walk_block(document.root_element(), &mut blocks);
    blocks
}

fn walk_block(el: ElementRef<'_>, blocks: &mut Vec<Block>) {
    let mut pending: Vec<Span> = Vec::new();

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            collect_text(text, Style::default(), &mut pending);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };

        match child_el.value().name() {
            "head" | "style" | "script" | "title" | "meta" | "link" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush(&mut pending, blocks);
                let level = child_el.value().name()[1..].parse().unwrap_or(1);
                let text = element_text(child_el);
                if !text.is_empty() {
                    blocks.push(Block::Heading { level, text });
                }
            }
            "p" | "pre" | "blockquote" | "dt" | "dd" | "caption" => {
                flush(&mut pending, blocks);
                let mut spans = Vec::new();
                walk_inline(child_el, Style::default(), &mut spans);
                if has_text(&spans) {
                    blocks.push(Block::Paragraph(spans));
                }
            }
            "li" => {
                flush(&mut pending, blocks);
                let mut spans = Vec::new();
                walk_inline(child_el, Style::default(), &mut spans);
                if has_text(&spans) {
                    blocks.push(Block::ListItem(spans));
                }
            }
            "table" => {
                flush(&mut pending, blocks);
                let rows = table_rows(child_el);
                if !rows.is_empty() {
                    blocks.push(Block::Table(rows));
                }
            }
            "br" => pending.push(Span::Break),
            name @ ("b" | "strong" | "i" | "em" | "span" | "a" | "u" | "small" | "sup" | "sub") => {
                walk_inline(child_el, Style::default().apply(name), &mut pending);
            }
            _ => {
                flush(&mut pending, blocks);
                walk_block(child_el, blocks);
            }
        }
    }

    flush(&mut pending, blocks);
}

fn flush(pending: &mut Vec<Span>, blocks: &mut Vec<Block>) {
    if has_text(pending) {
        blocks.push(Block::Paragraph(std::mem::take(pending)));
    } else {
        pending.clear();
    }
}

fn collect_text(text: &str, style: Style, spans: &mut Vec<Span>) {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return;
    }
    spans.push(Span::Text {
        text,
        bold: style.bold,
        italic: style.italic,
    });
}

fn walk_inline(el: ElementRef<'_>, style: Style, spans: &mut Vec<Span>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            collect_text(text, style, spans);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };

        match child_el.value().name() {
            "br" => spans.push(Span::Break),
            "style" | "script" => {}
            name => walk_inline(child_el, style.apply(name), spans),
        }
    }
}

fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(row_cells(child)),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|r| r.value().name() == "tr")
                    .map(row_cells),
            ),
            _ => {}
        }
    }
    rows.retain(|r| !r.is_empty());
    rows
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(element_text)
        .collect()
}

fn heading_size(level: u8) -> usize {
    // docx sizes are half-points
    match level {
        1 => 40,
        2 => 32,
        3 => 28,
        _ => 24,
    }
}

fn spans_paragraph(spans: &[Span], prefix: Option<&str>) -> Paragraph {
    let mut paragraph = Paragraph::new();
    if let Some(prefix) = prefix {
        paragraph = paragraph.add_run(Run::new().add_text(prefix));
    }
    for span in spans {
        let run = match span {
            Span::Text { text, bold, italic } => {
                let mut run = Run::new().add_text(text.as_str());
                if *bold {
                    run = run.bold();
                }
                if *italic {
                    run = run.italic();
                }
                run
            }
            Span::Break => Run::new().add_break(BreakType::TextWrapping),
        };
        paragraph = paragraph.add_run(run);
    }
    paragraph
}

fn render_docx(blocks: &[Block]) -> Docx {
    let mut docx = Docx::new();
    for block in blocks {
        docx = match block {
            Block::Heading { level, text } => docx.add_paragraph(
                Paragraph::new().add_run(
                    Run::new()
                        .add_text(text.as_str())
                        .bold()
                        .size(heading_size(*level)),
                ),
            ),
            Block::Paragraph(spans) => docx.add_paragraph(spans_paragraph(spans, None)),
            Block::ListItem(spans) => docx.add_paragraph(spans_paragraph(spans, Some("• "))),
            Block::Table(rows) => docx.add_table(Table::new(
                rows.iter()
                    .map(|cells| {
                        TableRow::new(
                            cells
                                .iter()
                                .map(|cell| {
                                    TableCell::new().add_paragraph(
                                        Paragraph::new().add_run(Run::new().add_text(cell.as_str())),
                                    )
                                })
                                .collect(),
                        )
                    })
                    .collect(),
            )),
        };
    }
    docx
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<!DOCTYPE html>
<html>
<head><title>Q3</title><style>h1 { color: navy; }</style></head>
<body>
  <h1>Quarterly   Report</h1>
  <p>Revenue was <b>up 12%</b> and <em>stable</em>.</p>
  <ul><li>First holding</li><li>Second holding</li></ul>
  <table>
    <thead><tr><th>Metric</th><th>Value</th></tr></thead>
    <tbody><tr><td>IRR</td><td>18%</td></tr></tbody>
  </table>
  <div>Loose <strong>bold</strong> text<br>next line</div>
</body>
</html>"#;

    #[test]
    fn test_docx_path_appends_extension() {
        assert_eq!(
            docx_path(Path::new("results/abc/output_report.html")),
            PathBuf::from("results/abc/output_report.html.docx")
        );
    }

    #[test]
    fn test_parse_blocks_structure() {
        let blocks = parse_blocks(REPORT);

        assert_eq!(
            blocks[0],
            Block::Heading {
                level: 1,
                text: "Quarterly Report".to_string()
            }
        );

        let Block::Paragraph(spans) = &blocks[1] else {
            panic!("expected paragraph, got {:?}", blocks[1]);
        };
        assert!(spans.contains(&Span::Text {
            text: "up 12%".to_string(),
            bold: true,
            italic: false,
        }));
        assert!(spans.contains(&Span::Text {
            text: "stable".to_string(),
            bold: false,
            italic: true,
        }));

        let items: Vec<&Block> = blocks
            .iter()
            .filter(|b| matches!(b, Block::ListItem(_)))
            .collect();
        assert_eq!(items.len(), 2);

        let table = blocks
            .iter()
            .find_map(|b| match b {
                Block::Table(rows) => Some(rows.clone()),
                _ => None,
            })
            .expect("table block");
        assert_eq!(
            table,
            vec![
                vec!["Metric".to_string(), "Value".to_string()],
                vec!["IRR".to_string(), "18%".to_string()],
            ]
        );

        let Some(Block::Paragraph(last)) = blocks.last() else {
            panic!("expected trailing paragraph");
        };
        assert!(last.contains(&Span::Break));
        assert!(last.contains(&Span::Text {
            text: "bold".to_string(),
            bold: true,
            italic: false,
        }));
    }

    #[test]
    fn test_head_and_style_are_skipped() {
        let blocks = parse_blocks(REPORT);
        let rendered = format!("{blocks:?}");
        assert!(!rendered.contains("navy"));
        assert!(!rendered.contains("Q3"));
    }

    #[test]
    fn test_write_then_convert_produces_verbatim_html_and_docx() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output_report.html");

        write_report(REPORT, &output).unwrap();
        let saved = convert_report(&output).unwrap();

        assert_eq!(std::fs::read(&saved.html_path).unwrap(), REPORT.as_bytes());
        assert_eq!(saved.docx_path, dir.path().join("output_report.html.docx"));

        let docx = std::fs::read(&saved.docx_path).unwrap();
        assert!(!docx.is_empty());
        assert_eq!(&docx[..2], b"PK");
    }

    #[test]
    fn test_plain_text_output_still_converts() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output_report.html");

        write_report("not really html", &output).unwrap();
        let saved = convert_report(&output).unwrap();
        assert_eq!(
            std::fs::read_to_string(&saved.html_path).unwrap(),
            "not really html"
        );
        assert!(std::fs::metadata(&saved.docx_path).unwrap().len() > 0);
    }

    #[test]
    fn test_unwritable_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("output_report.html");

        assert!(matches!(write_report("<p/>", &output), Err(AppError::Io(_))));
    }

    #[test]
    fn test_convert_without_written_report_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output_report.html");

        assert!(matches!(convert_report(&output), Err(AppError::Io(_))));
        assert!(!docx_path(&output).exists());
    }
}
