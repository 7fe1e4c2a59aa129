//! PDF Processor
//!
//! Text extraction strategies for application PDFs. All of them share one
//! contract: a path goes in, non-blank text comes out, or the call fails with
//! `NotFound` / `Unreadable`.

use lopdf::{Dictionary, Document, Object};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::debug;

use intake_utils::{ExtractorKind, IntakeError, IntakeResult};

/// Characters of text shown per extractor by [`compare_extractors`].
pub const SAMPLE_CHARS: usize = 800;

/// A PDF-to-text strategy.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> IntakeResult<String>;
}

/// Whole-document extraction with `pdf-extract`.
///
/// `pdf-extract` panics on some malformed font dictionaries; such a panic is
/// reported as an unreadable document.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractExtractor;

impl TextExtractor for PdfExtractExtractor {
    fn extract_text(&self, path: &Path) -> IntakeResult<String> {
        ensure_exists(path)?;
        let text = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)))
            .map_err(|_| unreadable(path, "text extraction panicked on a malformed PDF"))?
            .map_err(|e| unreadable(path, format!("cannot extract text: {}", e)))?;
        require_text(path, text)
    }
}

/// Page-by-page extraction with `lopdf`. Pages are joined with a newline and
/// pages without text stay in the output as empty lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> IntakeResult<String> {
        let doc = load_document(path)?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            let text = doc
                .extract_text(&[*page_number])
                .map_err(|e| unreadable(path, format!("page {}: {}", page_number, e)))?;
            pages.push(text);
        }
        debug!(path = %path.display(), pages = pages.len(), "extracted pages");

        require_text(path, pages.join("\n"))
    }
}

/// AcroForm field values, one `name: value` line per field.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormFieldsExtractor;

impl TextExtractor for FormFieldsExtractor {
    fn extract_text(&self, path: &Path) -> IntakeResult<String> {
        let doc = load_document(path)?;
        let text = form_fields(&doc)
            .into_iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n");
        require_text(path, text)
    }
}

/// Strategy for a configured extractor kind.
pub fn build_extractor(kind: ExtractorKind) -> Box<dyn TextExtractor> {
    match kind {
        ExtractorKind::PdfExtract => Box::new(PdfExtractExtractor),
        ExtractorKind::Lopdf => Box::new(LopdfExtractor),
        ExtractorKind::FormFields => Box::new(FormFieldsExtractor),
    }
}

/// Field name/value pairs from the document's AcroForm, in field order.
///
/// Checkbox states are folded to `Yes` / `No`. Documents without a form
/// yield an empty list.
pub fn form_fields(doc: &Document) -> Vec<(String, String)> {
    let mut fields = Vec::new();

    let Some(catalog) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| resolve_dict(doc, root))
    else {
        return fields;
    };
    let Some(form) = catalog
        .get(b"AcroForm")
        .ok()
        .and_then(|form| resolve_dict(doc, form))
    else {
        return fields;
    };

    if let Some(Object::Array(roots)) = form.get(b"Fields").ok().and_then(|f| resolve(doc, f)) {
        for field in roots {
            collect_field(doc, field, None, &mut fields, 0);
        }
    }
    fields
}

/// Checkbox-style values mapped to `Yes` / `No`; anything else unchanged.
pub fn normalize_field_value(value: &str) -> String {
    match value {
        "/Yes" | "Yes" | "YES" | "On" | "/On" => "Yes".to_string(),
        "/Off" | "Off" | "OFF" | "No" | "NO" => "No".to_string(),
        other => other.to_string(),
    }
}

const MAX_FIELD_DEPTH: usize = 32;

fn collect_field(
    doc: &Document,
    field: &Object,
    parent: Option<&str>,
    out: &mut Vec<(String, String)>,
    depth: usize,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    let Some(dict) = resolve_dict(doc, field) else {
        return;
    };

    let partial = dict.get(b"T").ok().map(|t| render_value(doc, t));
    let name = match (parent, partial.as_deref()) {
        (Some(parent), Some(partial)) => format!("{}.{}", parent, partial),
        (None, Some(partial)) => partial.to_string(),
        (Some(parent), None) => parent.to_string(),
        (None, None) => return,
    };

    let named_kids: Vec<&Object> = match dict.get(b"Kids").ok().and_then(|k| resolve(doc, k)) {
        Some(Object::Array(kids)) => kids
            .iter()
            .filter(|kid| resolve_dict(doc, kid).map_or(false, |d| d.has(b"T")))
            .collect(),
        _ => Vec::new(),
    };

    if named_kids.is_empty() {
        let value = dict
            .get(b"V")
            .ok()
            .map(|v| render_value(doc, v))
            .unwrap_or_default();
        out.push((name, normalize_field_value(&value)));
        return;
    }

    for kid in named_kids {
        collect_field(doc, kid, Some(&name), out, depth + 1);
    }
}

fn render_value(doc: &Document, value: &Object) -> String {
    match resolve(doc, value) {
        Some(Object::String(bytes, _)) => decode_pdf_string(bytes),
        Some(Object::Name(name)) => format!("/{}", String::from_utf8_lossy(name)),
        Some(Object::Integer(i)) => i.to_string(),
        Some(Object::Real(r)) => r.to_string(),
        Some(Object::Boolean(b)) => b.to_string(),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| render_value(doc, item))
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// PDF text strings are PDFDocEncoding or UTF-16BE with a byte order mark.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object).and_then(|o| o.as_dict().ok())
}

fn ensure_exists(path: &Path) -> IntakeResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IntakeError::not_found(format!(
            "PDF file not found: {}",
            path.display()
        )))
    }
}

fn load_document(path: &Path) -> IntakeResult<Document> {
    ensure_exists(path)?;
    Document::load(path).map_err(|e| unreadable(path, format!("cannot open PDF: {}", e)))
}

fn require_text(path: &Path, text: String) -> IntakeResult<String> {
    if text.trim().is_empty() {
        return Err(unreadable(path, "PDF contains no readable text"));
    }
    Ok(text)
}

fn unreadable(path: &Path, message: impl Into<String>) -> IntakeError {
    IntakeError::unreadable(path.display().to_string(), message)
}

/// Summary of one strategy's output on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSample {
    pub chars: usize,
    pub lines: usize,
    pub sample: String,
}

impl ExtractorSample {
    pub fn from_text(text: &str) -> Self {
        Self {
            chars: text.chars().count(),
            lines: text.matches('\n').count(),
            sample: text.chars().take(SAMPLE_CHARS).collect(),
        }
    }
}

/// Run every strategy against `path`. A failing strategy is reported in
/// place and does not stop the others.
pub fn compare_extractors(path: &Path) -> Vec<(ExtractorKind, IntakeResult<ExtractorSample>)> {
    ExtractorKind::ALL
        .iter()
        .map(|kind| {
            let outcome = build_extractor(*kind)
                .extract_text(path)
                .map(|text| ExtractorSample::from_text(&text));
            (*kind, outcome)
        })
        .collect()
}

/// Human-readable report of a [`compare_extractors`] run.
pub fn comparison_report(results: &[(ExtractorKind, IntakeResult<ExtractorSample>)]) -> String {
    let mut out = String::from("=== Comparing PDF extractors ===\n\n--- Text lengths ---\n");
    for (kind, outcome) in results {
        match outcome {
            Ok(sample) => out.push_str(&format!(
                "{}: {} chars, {} lines\n",
                kind, sample.chars, sample.lines
            )),
            Err(e) => out.push_str(&format!("{}: failed ({})\n", kind, e)),
        }
    }

    out.push_str(&format!("\n--- Samples (first {} chars) ---\n", SAMPLE_CHARS));
    for (kind, outcome) in results {
        if let Ok(sample) = outcome {
            out.push_str(&format!(
                "\n{}:\n{}\n{}\n",
                kind.as_str().to_uppercase(),
                "=".repeat(40),
                sample.sample
            ));
        }
    }
    out
}
