pub mod audit;
pub mod budget;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod notegen;
pub mod pipeline;
pub mod render;
pub mod review;
pub mod service;
pub mod store;
pub mod transcription;

pub use audit::{AuditLogWriter, AuditSink, MemoryAuditLog};
pub use budget::CostLedger;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use models::{
    Consultation, ConsultationStatus, Entity, EntityCategory, Language, PlanItem,
    ProviderMethod, ReviewStatus, SoapNote, Transcript,
};
pub use normalize::normalize;
pub use pipeline::{AudioUpload, CreateConsultationInput, CreateReceipt, Orchestrator};
pub use render::{render_document, ClinicMetadata};
pub use review::ReviewStateMachine;
pub use service::{ConsultationService, ConsultationView, RenderedDocument};
pub use store::ConsultationStore;
