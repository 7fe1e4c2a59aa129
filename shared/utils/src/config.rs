use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{IntakeError, IntakeResult};
use crate::records::DosagePolicy;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You extract structured data from messy medical PDFs.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub extractor: ExtractorKind,
    pub dosage_policy: DosagePolicy,
    #[serde(default)]
    pub prompt_template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

/// PDF text extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    /// Whole-document text via `pdf-extract`.
    PdfExtract,
    /// Page-by-page text via `lopdf`.
    Lopdf,
    /// AcroForm field values via `lopdf`.
    FormFields,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 3] = [Self::PdfExtract, Self::Lopdf, Self::FormFields];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfExtract => "pdf-extract",
            Self::Lopdf => "lopdf",
            Self::FormFields => "form-fields",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf-extract" | "pdf_extract" => Ok(Self::PdfExtract),
            "lopdf" => Ok(Self::Lopdf),
            "form-fields" | "form_fields" => Ok(Self::FormFields),
            other => Err(IntakeError::configuration(format!(
                "unknown extractor '{}', expected one of pdf-extract, lopdf, form-fields",
                other
            ))),
        }
    }
}

impl AppConfig {
    /// Load with the standard search path and no explicit config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Layered load: built-in defaults, `config/default`, `config/local`, an
    /// optional explicit file, `INTAKE__*` variables, then the flat variables
    /// the tool has always honoured (`OPENAI_API_KEY`, `MODEL`, ...).
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("INTAKE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("llm.api_key", env::var("OPENAI_API_KEY").ok())?
            .set_override_option("llm.model", env::var("MODEL").ok())?
            .set_override_option("llm.temperature", env::var("TEMPERATURE").ok())?
            .set_override_option("paths.input_dir", env::var("INPUT_DIR").ok())?
            .set_override_option("paths.output_dir", env::var("OUTPUT_DIR").ok())?;

        builder.build()?.try_deserialize()
    }

    /// The API credential, or a configuration error when it is absent.
    pub fn require_api_key(&self) -> IntakeResult<&str> {
        match self.llm.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(IntakeError::configuration(
                "OPENAI_API_KEY is not set (or llm.api_key in config)",
            )),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4.1-mini".to_string(),
                temperature: 0.2,
                timeout_seconds: 120,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            },
            paths: PathsConfig {
                input_dir: PathBuf::from("input_files"),
                output_dir: PathBuf::from("output_files"),
            },
            extraction: ExtractionConfig {
                extractor: ExtractorKind::PdfExtract,
                dosage_policy: DosagePolicy::Verbatim,
                prompt_template_path: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
                file_path: Some(PathBuf::from("logs/app.log")),
            },
        }
    }
}
