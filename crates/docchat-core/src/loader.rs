//! Document loading: walk a folder and extract plain text per supported file.
//!
//! Readers never abort the batch. A file that cannot be read is reported as
//! [`Extraction::Failed`] and contributes empty text downstream.

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::types::{Corpus, Extraction, LoadedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Docx,
    Spreadsheet,
}

impl FileKind {
    /// Classify by extension, case-insensitively. `None` means unsupported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self { Self }

    /// Recursively load every supported file under `root`, in traversal order.
    pub fn load_dir(&self, root: &Path) -> Corpus {
        let mut files = Vec::new();
        let entries = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());
        for entry in entries {
            let path = entry.path();
            let Some(kind) = FileKind::from_path(path) else {
                debug!(path = %path.display(), "skipping unsupported file");
                continue;
            };
            files.push(self.load_file(path, kind));
        }
        let corpus = Corpus { files };
        info!(
            files = corpus.len(),
            failed = corpus.failures().len(),
            root = %root.display(),
            "loaded documents"
        );
        corpus
    }

    pub fn load_file(&self, path: &Path, kind: FileKind) -> LoadedFile {
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let result = match kind {
            FileKind::Text => read_txt(path),
            FileKind::Pdf => read_pdf(path),
            FileKind::Docx => read_docx(path),
            FileKind::Spreadsheet => read_spreadsheet(path),
        };
        let extraction = match result {
            Ok(text) => Extraction::Text(text),
            Err(e) => {
                warn!(file = %file_name, error = %e, "text extraction failed");
                Extraction::Failed { reason: format!("{e:#}") }
            }
        };
        LoadedFile { file_name, extraction }
    }
}

fn read_txt(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    // Invalid byte sequences are dropped. A literal U+FFFD in the file is kept.
    Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect())
}

fn read_pdf(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed inputs.
    let outcome =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pdf_extract::extract_text(path)));
    match outcome {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(anyhow!("PDF extraction failed: {e}")),
        Err(_) => Err(anyhow!("PDF extraction panicked")),
    }
}

fn read_docx(path: &Path) -> Result<String> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("invalid DOCX archive")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("no word/document.xml in DOCX")?
        .read_to_string(&mut xml)
        .context("reading word/document.xml")?;
    Ok(docx_paragraphs(&xml).join("\n"))
}

/// Text of every `<w:p>` paragraph, in order. Empty paragraphs are kept so
/// that joining with newlines preserves blank lines.
pub fn docx_paragraphs(xml: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut chars = xml.chars();
    while let Some(c) = chars.next() {
        if c != '<' {
            if in_text { if let Some(p) = current.as_mut() { p.push(c); } }
            continue;
        }
        let tag: String = chars.by_ref().take_while(|&tc| tc != '>').collect();
        let self_closing = tag.ends_with('/');
        let name = tag.trim_end_matches('/').split_whitespace().next().unwrap_or("");
        match name {
            "w:p" if self_closing => paragraphs.push(String::new()),
            "w:p" => current = Some(String::new()),
            "/w:p" => {
                if let Some(p) = current.take() { paragraphs.push(p); }
                in_text = false;
            }
            "w:t" if !self_closing => in_text = true,
            "/w:t" => in_text = false,
            "w:tab" => { if let Some(p) = current.as_mut() { p.push('\t'); } }
            "w:br" | "w:cr" => { if let Some(p) = current.as_mut() { p.push('\n'); } }
            _ => {}
        }
    }
    paragraphs.into_iter().map(|p| unescape_xml(&p)).collect()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn read_spreadsheet(path: &Path) -> Result<String> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("opening workbook {}", path.display()))?;
    let mut text = String::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .with_context(|| format!("reading sheet {sheet}"))?;
        let mut rows = range.rows().map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());
        let Some(header) = rows.next() else { continue };
        // Blank rows are dropped but the survivors keep their position label.
        let data: Vec<(usize, Vec<String>)> = rows
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        if data.is_empty() {
            debug!(sheet = %sheet, "skipping sheet without data rows");
            continue;
        }
        text.push_str(&format!("\nSheet: {sheet}\n"));
        text.push_str(&render_table(&header, &data));
    }
    Ok(text.trim().to_string())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
    }
}

/// Render a header and labelled data rows as a right-aligned, space-separated
/// table. The leading, left-aligned column holds each row's label: its
/// zero-based position below the header in the sheet.
pub fn render_table(header: &[String], rows: &[(usize, Vec<String>)]) -> String {
    let width = rows.iter().map(|(_, row)| row.len()).chain([header.len()]).max().unwrap_or(0);
    let labelled = std::iter::once((String::new(), header))
        .chain(rows.iter().map(|(label, row)| (label.to_string(), row.as_slice())));
    let mut table: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
    for (label, row) in labelled {
        let mut line = Vec::with_capacity(width + 1);
        line.push(label);
        for col in 0..width { line.push(row.get(col).cloned().unwrap_or_default()); }
        table.push(line);
    }
    let widths: Vec<usize> = (0..=width)
        .map(|col| table.iter().map(|line| line[col].chars().count()).max().unwrap_or(0))
        .collect();
    table
        .iter()
        .map(|line| {
            line.iter()
                .zip(&widths)
                .enumerate()
                .map(|(col, (cell, &w))| match col {
                    0 => format!("{cell:<w$}"),
                    _ => format!("{cell:>w$}"),
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
