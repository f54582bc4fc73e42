use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use medscribe::{
    AudioUpload, ClinicMetadata, ConsultationService, ConsultationView,
    CreateConsultationInput, MemoryAuditLog, PipelineConfig, SoapNote,
};

#[derive(Parser)]
#[command(name = "medscribe")]
#[command(author, version, about = "Consultation processing pipeline: audio to reviewed SOAP notes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over one audio recording
    Process {
        /// Input audio file (mp3, wav, or webm)
        #[arg(short, long)]
        input: PathBuf,

        /// Language code: 'ta' (Tamil) or 'te' (Telugu)
        #[arg(short, long)]
        language: String,

        /// Patient name to record on the consultation
        #[arg(long)]
        patient_name: Option<String>,

        /// Recording length in seconds (used for cost estimation)
        #[arg(long, default_value = "60.0")]
        duration_secs: f64,

        /// Output file for the structured note (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Approve the note immediately and render the document here
        #[arg(long)]
        document: Option<PathBuf>,

        /// Approver recorded when --document is used
        #[arg(long, default_value = "cli")]
        approver: String,

        /// Clinic name embedded in the rendered document
        #[arg(long)]
        clinic_name: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Render a stored note (JSON) into a document
    Render {
        /// Input note file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output document file
        #[arg(short, long)]
        output: PathBuf,

        /// Clinic name embedded in the rendered document
        #[arg(long)]
        clinic_name: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            language,
            patient_name,
            duration_secs,
            output,
            document,
            approver,
            clinic_name,
            verbose,
        } => {
            setup_logging(verbose);
            process_consultation(
                input,
                language,
                patient_name,
                duration_secs,
                output,
                document,
                approver,
                clinic_name,
            )
            .await
        }
        Commands::Render {
            input,
            output,
            clinic_name,
            verbose,
        } => {
            setup_logging(verbose);
            render_note(input, output, clinic_name)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn process_consultation(
    input: PathBuf,
    language: String,
    patient_name: Option<String>,
    duration_secs: f64,
    output: Option<PathBuf>,
    document: Option<PathBuf>,
    approver: String,
    clinic_name: Option<String>,
) -> Result<()> {
    info!("Loading audio from {:?}", input);
    let data = std::fs::read(&input).context("Failed to read audio file")?;
    let format = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_ascii_lowercase();

    let audit_log = Arc::new(MemoryAuditLog::new());
    let service = ConsultationService::with_live_providers(
        PipelineConfig::default(),
        audit_log.clone(),
    )
    .context("Failed to configure providers")?;

    let receipt = service.create(CreateConsultationInput {
        user_id: "cli".to_string(),
        patient_name,
        language,
        audio: AudioUpload {
            data,
            format,
            duration_secs,
        },
    })?;
    info!("Consultation {} created, processing...", receipt.id);

    service.await_pipeline(receipt.id).await;

    match service.get(receipt.id)? {
        ConsultationView::Review {
            transcript,
            entities,
            note,
            codes,
            cost,
            ..
        } => {
            info!(
                "Ready for review: {} transcript chars ({:?}), {} entities, {} codes, cost {:.2}",
                transcript.text.len(),
                transcript.method,
                entities.len(),
                codes.len(),
                cost
            );

            if let Some(path) = &output {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create file: {path:?}"))?;
                serde_json::to_writer_pretty(file, &note).context("Failed to write note JSON")?;
                info!("Note written to {:?}", path);
            }

            if let Some(path) = &document {
                service.approve(receipt.id, &approver, None)?;
                let clinic = clinic_name.map(|name| ClinicMetadata {
                    clinic_name: name,
                    practitioner: None,
                    address: None,
                    registration: None,
                });
                let rendered = service.document(receipt.id, &approver, clinic.as_ref())?;
                std::fs::write(path, &rendered.bytes)
                    .with_context(|| format!("Failed to write document: {path:?}"))?;
                info!("Document written to {:?} ({})", path, rendered.filename);
            }

            info!("Audit entries recorded: {}", audit_log.len());
            Ok(())
        }
        ConsultationView::Failed {
            message,
            support_ref,
            ..
        } => {
            bail!("{message} (reference: {support_ref})")
        }
        other => bail!("unexpected consultation state: {other:?}"),
    }
}

fn render_note(input: PathBuf, output: PathBuf, clinic_name: Option<String>) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read note file: {input:?}"))?;
    let note: SoapNote = serde_json::from_str(&content).context("Failed to parse note JSON")?;

    let clinic = clinic_name.map(|name| ClinicMetadata {
        clinic_name: name,
        practitioner: None,
        address: None,
        registration: None,
    });
    let bytes = medscribe::render_document(&note, clinic.as_ref())?;
    std::fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write document: {output:?}"))?;

    info!("Document written to {:?} ({} bytes)", output, bytes.len());
    Ok(())
}
