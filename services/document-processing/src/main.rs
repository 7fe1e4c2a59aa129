//! Intake
//!
//! Extracts insurance application data from PDF forms with a language model
//! and accumulates it in `applications.csv` and `medications.csv`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use intake_document_processing::{
    compare_extractors, comparison_report, discover_pdfs, OpenAiClient, Pipeline,
};
use intake_utils::{init_logging, AppConfig, ExtractorKind, IntakeError};

#[derive(Debug, Parser)]
#[command(name = "intake", version, about = "Extract application data from PDF forms")]
struct Cli {
    /// Process only this PDF instead of the whole input directory
    pdf: Option<PathBuf>,

    /// Directory scanned for PDFs
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory for tables and per-document artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Text extraction strategy (pdf-extract, lopdf, form-fields)
    #[arg(long)]
    extractor: Option<ExtractorKind>,

    /// Extra configuration file layered over config/default and config/local
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compare all extraction strategies on PDF and exit
    #[arg(long, requires = "pdf")]
    compare: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.input_dir {
            config.paths.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(kind) = self.extractor {
            config.extraction.extractor = kind;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            let code = e
                .downcast_ref::<IntakeError>()
                .map_or(1, IntakeError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_from(cli.config.as_deref())
        .map_err(IntakeError::from)
        .context("loading configuration")?;
    cli.apply(&mut config);

    let _logging = init_logging(&config.logging)?;
    info!(
        extractor = %config.extraction.extractor,
        output_dir = %config.paths.output_dir.display(),
        "Starting intake"
    );

    if cli.compare {
        let pdf = cli
            .pdf
            .as_deref()
            .context("--compare needs a PDF path")?;
        require_file(pdf)?;
        println!("{}", comparison_report(&compare_extractors(pdf)));
        return Ok(());
    }

    let api_key = config.require_api_key()?;
    let client = OpenAiClient::new(&config.llm, api_key)?;
    info!(model = client.model(), "LLM client ready");
    let pipeline = Pipeline::from_config(&config, Box::new(client))?;

    match &cli.pdf {
        Some(pdf) => {
            require_file(pdf)?;
            pipeline.run_single(pdf).await?;
        }
        None => {
            let pdfs = discover_pdfs(&config.paths.input_dir)?;
            pipeline.run_batch(&pdfs).await?;
        }
    }

    info!(output_dir = %pipeline.output_dir().display(), "Intake finished");
    Ok(())
}

fn require_file(path: &std::path::Path) -> Result<(), IntakeError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IntakeError::not_found(format!(
            "PDF file not found: {}",
            path.display()
        )))
    }
}
