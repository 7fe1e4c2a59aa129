//! Document Extraction Pipeline
//!
//! Drives each PDF through text extraction, prompting, the model call,
//! parsing, normalization and the table merge. Documents are handled one at a
//! time; a failure that belongs to one document is logged and the batch moves
//! on.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};

use intake_utils::{AppConfig, IntakeError, IntakeResult, RecordNormalizer, TableStore};

use crate::llm_client::CompletionClient;
use crate::pdf_processor::{build_extractor, TextExtractor};
use crate::prompt::PromptBuilder;
use crate::response::{parse_response, ParsedResponse};

/// Debugging files written next to the tables for one input PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub prompt: PathBuf,
    pub response_text: PathBuf,
    pub response_json: PathBuf,
    pub bad_response: PathBuf,
}

impl ArtifactPaths {
    pub fn new(output_dir: &Path, pdf: &Path) -> Self {
        let base = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let file = |suffix: &str| output_dir.join(format!("{}{}", base, suffix));

        Self {
            prompt: file("_prompt.txt"),
            response_text: file("_response.txt"),
            response_json: file("_response.json"),
            bad_response: file("_BAD_RESPONSE.txt"),
        }
    }
}

/// What happened to one document that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    Processed {
        applications: usize,
        medications: usize,
        unassociated: usize,
        duplicates_dropped: usize,
    },
    /// The reply was kept in `_BAD_RESPONSE.txt`; nothing was merged.
    Malformed,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub processed: usize,
    pub failed: usize,
    pub malformed: usize,
    pub application_rows: usize,
    pub medication_rows: usize,
    pub duplicates_dropped: usize,
    pub unassociated: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Processed {
                applications,
                medications,
                unassociated,
                duplicates_dropped,
            } => {
                self.processed += 1;
                self.application_rows += applications;
                self.medication_rows += medications;
                self.unassociated += unassociated;
                self.duplicates_dropped += duplicates_dropped;
            }
            DocumentOutcome::Malformed => self.malformed += 1,
        }
    }

    fn log(&self) {
        info!(
            discovered = self.discovered,
            processed = self.processed,
            failed = self.failed,
            malformed = self.malformed,
            application_rows = self.application_rows,
            medication_rows = self.medication_rows,
            duplicates_dropped = self.duplicates_dropped,
            unassociated = self.unassociated,
            "run complete"
        );
    }
}

/// PDF files directly inside `input_dir`, sorted by path. The extension
/// match is case-insensitive.
pub fn discover_pdfs(input_dir: &Path) -> IntakeResult<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(IntakeError::not_found(format!(
            "input directory {}",
            input_dir.display()
        )));
    }

    let mut pdfs: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_pdf(path))
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        return Err(IntakeError::configuration(format!(
            "no PDF files found in {}",
            input_dir.display()
        )));
    }
    Ok(pdfs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
}

/// The end-to-end processor for a run.
pub struct Pipeline {
    extractor: Box<dyn TextExtractor>,
    prompts: PromptBuilder,
    client: Box<dyn CompletionClient>,
    normalizer: RecordNormalizer,
    output_dir: PathBuf,
    store: TableStore,
}

impl Pipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        prompts: PromptBuilder,
        client: Box<dyn CompletionClient>,
        normalizer: RecordNormalizer,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            extractor,
            prompts,
            client,
            normalizer,
            store: TableStore::new(output_dir.clone()),
            output_dir,
        }
    }

    /// Pipeline wired from configuration around the given model client.
    pub fn from_config(config: &AppConfig, client: Box<dyn CompletionClient>) -> IntakeResult<Self> {
        let prompts = PromptBuilder::from_config(config.extraction.prompt_template_path.as_deref())?;
        let normalizer =
            RecordNormalizer::new().with_dosage_policy(config.extraction.dosage_policy);

        Ok(Self::new(
            build_extractor(config.extraction.extractor),
            prompts,
            client,
            normalizer,
            &config.paths.output_dir,
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process one PDF and merge its rows.
    ///
    /// A malformed reply is not an error: the raw text is preserved and
    /// `DocumentOutcome::Malformed` is returned.
    pub async fn process_document(&self, path: &Path) -> IntakeResult<DocumentOutcome> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.process_inner(path)
            .instrument(info_span!("document", file = %name))
            .await
    }

    async fn process_inner(&self, path: &Path) -> IntakeResult<DocumentOutcome> {
        info!("processing");
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            IntakeError::storage(format!("creating {}: {}", self.output_dir.display(), e))
        })?;
        let artifacts = ArtifactPaths::new(&self.output_dir, path);

        let text = self.extractor.extract_text(path)?;
        info!(bytes = text.len(), "text extracted");

        let prompt = self.prompts.build(&text)?;
        fs::write(&artifacts.prompt, &prompt)?;

        let raw = self.client.complete(&prompt).await?;
        fs::write(&artifacts.response_text, &raw)?;

        let document = match parse_response(&raw) {
            ParsedResponse::Parsed { value, document } => {
                fs::write(&artifacts.response_json, serde_json::to_string_pretty(&value)?)?;
                document
            }
            ParsedResponse::Malformed { raw, error } => {
                fs::write(&artifacts.bad_response, raw)?;
                warn!(
                    %error,
                    saved = %artifacts.bad_response.display(),
                    "model reply is not a usable JSON object, skipping"
                );
                return Ok(DocumentOutcome::Malformed);
            }
        };

        let normalized = self.normalizer.normalize(&document);
        let report = self
            .store
            .merge(&normalized.applications, &normalized.medications)?;
        let duplicates_dropped =
            report.applications.duplicates_dropped + report.medications.duplicates_dropped;
        info!(
            applications = normalized.applications.len(),
            medications = normalized.medications.len(),
            duplicates_dropped,
            "document merged"
        );

        Ok(DocumentOutcome::Processed {
            applications: normalized.applications.len(),
            medications: normalized.medications.len(),
            unassociated: normalized.unassociated.len(),
            duplicates_dropped,
        })
    }

    /// Process `paths` in order. Per-document failures are counted and
    /// skipped; storage and internal failures abort the run.
    pub async fn run_batch(&self, paths: &[PathBuf]) -> IntakeResult<RunSummary> {
        let mut summary = RunSummary {
            discovered: paths.len(),
            ..RunSummary::default()
        };
        info!(files = paths.len(), "starting batch");

        for path in paths {
            match self.process_document(path).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) if e.is_per_document() => {
                    summary.failed += 1;
                    error!(file = %path.display(), code = e.error_code(), "failed: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        summary.log();
        Ok(summary)
    }

    /// Process one explicitly named PDF. Every failure is fatal.
    pub async fn run_single(&self, path: &Path) -> IntakeResult<RunSummary> {
        let mut summary = RunSummary {
            discovered: 1,
            ..RunSummary::default()
        };
        let outcome = self.process_document(path).await?;
        summary.record(outcome);
        summary.log();
        Ok(summary)
    }
}
