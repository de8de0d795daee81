// ── DANFE Service ──────────────────────────────────────────────
//
// Fallback chain: stored lookup (and XML by access key) → compliant
// layout → legacy layout → reconstruction from the stored summary →
// external API. Each stage runs at most once and the first success wins.
use base64::Engine;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DanfeConfig;
use crate::danfe::{CompliantRenderer, DocumentRenderer, LegacyRenderer};
use crate::error::{DanfeError, ExternalError};
use crate::external::{ExternalPayload, ExternalRenderer, MeuDanfeClient};
use crate::extract::{extract, extract_lenient, xml_from_stored};
use crate::nfe::AccessKey;
use crate::pdf_utils::merge_pdfs;
use crate::store::{reconstruct, DocumentStore, StoredDocument, XmlDirectory, XmlSource};

#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    LocalCompliant,
    LocalLegacy,
    DbReconstructed,
    External,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::LocalCompliant => "local-compliant",
            Method::LocalLegacy => "local-legacy",
            Method::DbReconstructed => "db-reconstructed",
            Method::External => "external",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DanfeRequest {
    Xml(String),
    AccessKey(String),
    DocumentId(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedDanfe {
    pub pdf: Vec<u8>,
    pub method: Method,
}

/// Wire shape returned to HTTP callers.
#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DanfeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub method_used: Option<Method>,
}

impl DanfeResponse {
    pub fn from_result(result: Result<GeneratedDanfe, DanfeError>) -> Self {
        match result {
            Ok(generated) => Self {
                success: true,
                document_base64: Some(base64::engine::general_purpose::STANDARD.encode(&generated.pdf)),
                error: None,
                method_used: Some(generated.method),
            },
            Err(e) => Self {
                success: false,
                document_base64: None,
                error: Some(e.to_string()),
                method_used: e.last_method(),
            },
        }
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    pub local_renderer: bool,
    pub external_api: bool,
    pub document_store: bool,
    pub xml_source: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub pdf: Vec<u8>,
    pub methods: Vec<Method>,
    /// (position in the request list, error message)
    pub failures: Vec<(usize, String)>,
}

/// What the chain knows after the request has been resolved.
#[derive(Default)]
struct Inputs {
    xml: Option<String>,
    access_key: Option<String>,
    stored: Option<StoredDocument>,
}

pub struct DanfeService {
    compliant: Arc<dyn DocumentRenderer>,
    legacy: Arc<dyn DocumentRenderer>,
    store: Option<Arc<dyn DocumentStore>>,
    xml_source: Option<Arc<dyn XmlSource>>,
    external: Option<Arc<dyn ExternalRenderer>>,
}

impl Default for DanfeService {
    fn default() -> Self {
        Self::new()
    }
}

impl DanfeService {
    pub fn new() -> Self {
        Self {
            compliant: Arc::new(CompliantRenderer::new()),
            legacy: Arc::new(LegacyRenderer::new()),
            store: None,
            xml_source: None,
            external: None,
        }
    }

    /// Local renderers, the XML folder when one is configured and the
    /// external client when an API key is configured.
    pub fn from_config(config: &DanfeConfig) -> Result<Self, ExternalError> {
        let mut service = Self::new();
        if let Some(dir) = &config.xml_dir {
            service.xml_source = Some(Arc::new(XmlDirectory::new(dir.clone())));
        }
        if let Some(client) = MeuDanfeClient::from_config(config)? {
            service.external = Some(Arc::new(client));
        }
        Ok(service)
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_xml_source(mut self, source: Arc<dyn XmlSource>) -> Self {
        self.xml_source = Some(source);
        self
    }

    pub fn with_compliant_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.compliant = renderer;
        self
    }

    pub fn with_legacy_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.legacy = renderer;
        self
    }

    pub fn with_external(mut self, external: Arc<dyn ExternalRenderer>) -> Self {
        self.external = Some(external);
        self
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            local_renderer: true,
            external_api: self.external.is_some(),
            document_store: self.store.is_some(),
            xml_source: self.xml_source.is_some(),
        }
    }

    async fn resolve(&self, request: DanfeRequest) -> Result<(Inputs, Option<String>), DanfeError> {
        let mut inputs = Inputs::default();
        let mut lookup_error = None;
        match request {
            DanfeRequest::Xml(xml) => {
                if xml.trim().is_empty() {
                    return Err(DanfeError::InvalidRequest("XML vazio".into()));
                }
                inputs.xml = Some(xml);
            }
            DanfeRequest::AccessKey(raw) => {
                let key = AccessKey::parse(&raw).map_err(|e| DanfeError::InvalidRequest(e.to_string()))?;
                inputs.access_key = Some(key.as_str().to_string());
            }
            DanfeRequest::DocumentId(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(DanfeError::InvalidRequest("ID da nota fiscal vazio".into()));
                }
                match &self.store {
                    None => lookup_error = Some("nenhum repositório de notas configurado".to_string()),
                    Some(store) => match store.get_document_by_id(id).await {
                        Ok(Some(record)) => {
                            debug!(id, has_xml = record.xml_content.is_some(), "Nota fiscal encontrada");
                            if let Some(content) = record.xml_content.as_deref() {
                                match xml_from_stored(content) {
                                    Ok(xml) => inputs.xml = Some(xml.into_owned()),
                                    Err(e) => warn!(id, error = %e, "XML armazenado ilegível"),
                                }
                            }
                            inputs.access_key = record.access_key.clone();
                            inputs.stored = Some(record);
                        }
                        Ok(None) => lookup_error = Some(format!("Nota fiscal não encontrada: {}", id)),
                        Err(e) => {
                            warn!(id, error = %e, "Falha na consulta da nota fiscal");
                            lookup_error = Some(e.to_string());
                        }
                    },
                }
            }
        }
        if inputs.xml.is_none() {
            if let Some(key) = inputs.access_key.as_deref() {
                inputs.xml = self.fetch_by_key(key).await;
            }
        }
        Ok((inputs, lookup_error))
    }

    /// XML for an access key from the configured source. Misses and
    /// failures only mean the local stages are skipped.
    async fn fetch_by_key(&self, raw_key: &str) -> Option<String> {
        let source = self.xml_source.as_ref()?;
        let key = AccessKey::parse(raw_key)
            .map_err(|e| warn!(error = %e, "Chave armazenada inválida"))
            .ok()?;
        match source.fetch_xml(&key).await {
            Ok(Some(content)) => match xml_from_stored(&content) {
                Ok(xml) => {
                    info!(chave = key.as_str(), "XML recuperado pela chave de acesso");
                    Some(xml.into_owned())
                }
                Err(e) => {
                    warn!(chave = key.as_str(), error = %e, "XML recuperado ilegível");
                    None
                }
            },
            Ok(None) => {
                debug!(chave = key.as_str(), "Nenhum XML para a chave de acesso");
                None
            }
            Err(e) => {
                warn!(chave = key.as_str(), error = %e, "Falha ao buscar XML pela chave de acesso");
                None
            }
        }
    }

    pub async fn produce_document(&self, request: DanfeRequest) -> Result<GeneratedDanfe, DanfeError> {
        let (inputs, lookup_error) = self.resolve(request).await?;
        let mut last_method: Option<Method> = None;
        let mut last_error =
            lookup_error.unwrap_or_else(|| "nenhuma fonte de dados disponível para o DANFE".to_string());

        if let Some(xml) = inputs.xml.as_deref() {
            let legacy_doc = match extract(xml) {
                Ok(doc) => {
                    match self.compliant.render(&doc) {
                        Ok(pdf) => return Ok(done(pdf, Method::LocalCompliant)),
                        Err(e) => warn!(error = %e, "Layout completo falhou, tentando layout simplificado"),
                    }
                    Some(doc)
                }
                Err(e) => {
                    warn!(error = %e, "Extração do XML falhou, tentando leitura tolerante");
                    last_method = Some(Method::LocalCompliant);
                    last_error = e.to_string();
                    extract_lenient(xml)
                        .map_err(|e| debug!(error = %e, "Leitura tolerante também falhou"))
                        .ok()
                }
            };
            if let Some(doc) = legacy_doc {
                match self.legacy.render(&doc) {
                    Ok(pdf) => return Ok(done(pdf, Method::LocalLegacy)),
                    Err(e) => {
                        warn!(error = %e, "Layout simplificado falhou");
                        last_method = Some(Method::LocalLegacy);
                        last_error = e.to_string();
                    }
                }
            }
        }

        if let Some(record) = &inputs.stored {
            let doc = reconstruct(record);
            match self.compliant.render(&doc) {
                Ok(pdf) => return Ok(done(pdf, Method::DbReconstructed)),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Reconstrução a partir do banco falhou");
                    last_method = Some(Method::DbReconstructed);
                    last_error = e.to_string();
                }
            }
        }

        if let Some(external) = &self.external {
            let payload = inputs
                .xml
                .map(ExternalPayload::Xml)
                .or_else(|| inputs.access_key.map(ExternalPayload::AccessKey));
            let result = match payload {
                Some(payload) => external.render(payload).await,
                None => Err(ExternalError::NothingToSend),
            };
            match result {
                Ok(pdf) => return Ok(done(pdf, Method::External)),
                Err(e) => {
                    warn!(error = %e, "API externa de DANFE falhou");
                    last_method = Some(Method::External);
                    last_error = e.to_string();
                }
            }
        }

        Err(DanfeError::AllFallbacksExhausted {
            last_method,
            message: last_error,
        })
    }

    /// Renders each request and merges the successes into one PDF.
    pub async fn produce_batch(&self, requests: Vec<DanfeRequest>) -> Result<BatchOutcome, DanfeError> {
        let mut pdfs = Vec::new();
        let mut methods = Vec::new();
        let mut failures = Vec::new();
        for (i, request) in requests.into_iter().enumerate() {
            match self.produce_document(request).await {
                Ok(generated) => {
                    methods.push(generated.method);
                    pdfs.push(generated.pdf);
                }
                Err(e) => {
                    warn!(index = i, error = %e, "Documento do lote não gerado");
                    failures.push((i, e.to_string()));
                }
            }
        }
        if pdfs.is_empty() {
            return Err(DanfeError::EmptyBatch);
        }
        let pdf = merge_pdfs(pdfs)?;
        info!(documents = methods.len(), failures = failures.len(), "Lote de DANFEs gerado");
        Ok(BatchOutcome {
            pdf,
            methods,
            failures,
        })
    }
}

fn done(pdf: Vec<u8>, method: Method) -> GeneratedDanfe {
    info!(method = %method, bytes = pdf.len(), "DANFE gerado");
    GeneratedDanfe { pdf, method }
}
