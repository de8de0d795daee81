pub mod config;
pub mod danfe;
pub mod error;
pub mod external;
pub mod extract;
pub mod format;
pub mod nfe;
pub mod pdf_utils;
pub mod service;
pub mod store;
pub mod xml;

pub use config::DanfeConfig;
pub use danfe::{render, render_with, CompliantRenderer, DocumentRenderer, LegacyRenderer, RenderOptions};
pub use error::{DanfeError, ExternalError, ExtractionError, RenderError, StoreError};
pub use external::{ExternalPayload, ExternalRenderer, MeuDanfeClient};
pub use extract::{extract, extract_lenient, validate_xml, ValidationReport};
pub use nfe::{AccessKey, FiscalDocument};
pub use service::{DanfeRequest, DanfeResponse, DanfeService, GeneratedDanfe, Method};
pub use store::{DocumentStore, DocumentSummary, MemoryStore, StoredDocument, XmlDirectory, XmlSource};
