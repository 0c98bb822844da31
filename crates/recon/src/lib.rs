//! `consulta-recon` classifies portal queries and reconciles them into
//! per-subject records.
//!
//! Pure engine crate: drivers and stores are capabilities handed in by the
//! caller. No CLI or database dependencies.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod subject;

pub use classify::{classify, Evidence, TimeoutPolicy};
pub use config::{CollectionSpec, PortalSpec, ScrapeConfig};
pub use engine::{merge_record, reconcile};
pub use error::ReconError;
pub use mapper::{EntitiesMapper, FieldMapper, TablesMapper};
pub use model::{EmptyReason, Estado, MergeReport, QueryOutcome, QueryReport};
pub use pipeline::Pipeline;
pub use store::{Document, DocumentStore, MemoryStore, StoreError, UpsertOutcome};
pub use subject::{PersonaType, SubjectId};
