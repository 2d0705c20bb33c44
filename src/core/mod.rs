//! Service-level building blocks: shared state, education catalog, passwords,
//! client metadata.

pub mod client_context;
pub mod education;
pub mod password;
pub mod service_context;

pub use client_context::ClientContext;
pub use education::{
    CatalogEntry, CatalogError, DISCLAIMER, DiseaseCatalog, DiseaseInfo, Enrichment, Urgency,
    normalize_label,
};
pub use service_context::{AppState, ServiceContext, ServiceSettings};
