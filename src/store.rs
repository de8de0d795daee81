// ── Document Store ─────────────────────────────────────────────
//
// Persistence lives outside this crate; the orchestrator only needs a
// lookup by id and, for key-only requests, a way to find the XML.
// `MemoryStore` backs the tests and `XmlDirectory` the CLI.
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::error::StoreError;
use crate::nfe::{
    AccessKey, Address, FiscalDocument, LineItem, OperationDirection, Party, TaxTotals,
};

/// Denormalised fields kept on the tracking record even when the XML is gone.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DocumentSummary {
    pub number: Option<String>,
    pub series: Option<String>,
    pub issue_date: Option<String>,
    pub sender_name: Option<String>,
    pub recipient_name: Option<String>,
    /// "CIDADE - UF"
    pub origin_city: Option<String>,
    pub destination_city: Option<String>,
    pub volume_count: Option<Decimal>,
    pub total_value: Option<Decimal>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    /// Raw XML or a base64 docZip payload.
    pub xml_content: Option<String>,
    pub access_key: Option<String>,
    pub summary: DocumentSummary,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document_by_id(&self, id: &str) -> Result<Option<StoredDocument>, StoreError>;
}

/// Finds the NF-e XML for an access key. The content may be raw XML or a
/// base64 docZip payload.
#[async_trait]
pub trait XmlSource: Send + Sync {
    async fn fetch_xml(&self, key: &AccessKey) -> Result<Option<String>, StoreError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    documents: HashMap<String, StoredDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document: StoredDocument) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn with_document(mut self, document: StoredDocument) -> Self {
        self.insert(document);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document_by_id(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.get(id).cloned())
    }
}

#[async_trait]
impl XmlSource for MemoryStore {
    async fn fetch_xml(&self, key: &AccessKey) -> Result<Option<String>, StoreError> {
        Ok(self
            .documents
            .values()
            .find(|d| d.access_key.as_deref() == Some(key.as_str()) && d.xml_content.is_some())
            .and_then(|d| d.xml_content.clone()))
    }
}

/// Folder of downloaded XMLs, matched by the access key in the file name
/// (`<chave>.xml`, `NFe<chave>-procNFe.xml`, `danfe_<chave>_123.xml`).
#[derive(Clone, Debug)]
pub struct XmlDirectory {
    root: PathBuf,
}

impl XmlDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl XmlSource for XmlDirectory {
    async fn fetch_xml(&self, key: &AccessKey) -> Result<Option<String>, StoreError> {
        let backend = |e: std::io::Error| {
            StoreError::Backend(format!("Falha ao ler '{}': {}", self.root.display(), e))
        };
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(backend)?;
        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(backend)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(key.as_str()) && name.to_ascii_lowercase().ends_with(".xml") {
                matches.push(entry.path());
            }
        }
        matches.sort();
        let Some(path) = matches.into_iter().next() else {
            return Ok(None);
        };
        debug!(path = %path.display(), "XML encontrado pela chave de acesso");
        let content = tokio::fs::read_to_string(&path).await.map_err(backend)?;
        Ok(Some(content))
    }
}

// ── Reconstruction ──────────────────────────────────────────────

const PLACEHOLDER_TAX_ID: &str = "00000000000000";
const PLACEHOLDER_POSTAL_CODE: &str = "00000000";
const PLACEHOLDER_REGISTRATION: &str = "000000000000";

/// Splits "CIDADE - UF" into its parts.
fn split_city(raw: Option<&str>, default_state: &str) -> (String, String) {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => match value.split_once(" - ") {
            Some((city, state)) => (city.trim().to_string(), state.trim().to_string()),
            None => (value.to_string(), default_state.to_string()),
        },
        None => ("CIDADE".to_string(), default_state.to_string()),
    }
}

fn placeholder_party(name: Option<&str>, default_name: &str, street: &str, city: Option<&str>, default_state: &str) -> Party {
    let (city, state) = split_city(city, default_state);
    Party {
        name: name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(default_name)
            .to_string(),
        trade_name: None,
        tax_id: PLACEHOLDER_TAX_ID.to_string(),
        state_registration: Some(PLACEHOLDER_REGISTRATION.to_string()),
        municipal_registration: None,
        address: Address {
            street: street.to_string(),
            number: String::new(),
            complement: String::new(),
            district: "CENTRO".to_string(),
            city,
            state,
            postal_code: PLACEHOLDER_POSTAL_CODE.to_string(),
        },
        phone: None,
    }
}

/// Minimal document built from the summary when no XML is available.
/// Party names, volume count and total come from the record; addresses,
/// tax ids and the single line item are placeholders.
pub fn reconstruct(stored: &StoredDocument) -> FiscalDocument {
    let s = &stored.summary;
    let total = s.total_value.unwrap_or(Decimal::ZERO);
    let volumes = s.volume_count.filter(|v| *v > Decimal::ZERO).unwrap_or(Decimal::ONE);
    let issue_date = s
        .issue_date
        .as_deref()
        .map(crate::format::format_date)
        .unwrap_or_else(|| chrono::Local::now().format("%d/%m/%Y").to_string());

    FiscalDocument {
        number: s.number.clone().unwrap_or_else(|| "S/N".to_string()),
        series: s.series.clone().unwrap_or_else(|| "001".to_string()),
        issue_date,
        access_key: stored
            .access_key
            .as_deref()
            .and_then(|k| AccessKey::parse(k).ok()),
        operation_nature: "VENDA".to_string(),
        direction: OperationDirection::Outbound,
        emitter: placeholder_party(
            s.sender_name.as_deref(),
            "EMPRESA EMITENTE LTDA",
            "RUA EXEMPLO, 123",
            s.origin_city.as_deref(),
            "SP",
        ),
        recipient: placeholder_party(
            s.recipient_name.as_deref(),
            "DESTINATÁRIO PADRÃO",
            "RUA DESTINO, 456",
            s.destination_city.as_deref(),
            "RJ",
        ),
        items: vec![LineItem {
            item_number: 1,
            code: "001".to_string(),
            description: "SERVIÇO DE TRANSPORTE - DIVERSOS".to_string(),
            ncm: Some("84122110".to_string()),
            cst: Some("102".to_string()),
            cfop: Some("5102".to_string()),
            unit: "PC".to_string(),
            quantity: volumes,
            unit_price: total,
            total,
            ..Default::default()
        }],
        totals: TaxTotals {
            products_total: total,
            grand_total: total,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stored() -> StoredDocument {
        StoredDocument {
            id: "nf-1".into(),
            xml_content: None,
            access_key: Some("42250485179240000239550020004175331780623268".into()),
            summary: DocumentSummary {
                number: Some("417533".into()),
                sender_name: Some("CORFIO INDUSTRIA".into()),
                recipient_name: Some("ARMAZEM CENTRAL".into()),
                origin_city: Some("JOINVILLE - SC".into()),
                volume_count: Some(Decimal::new(3, 0)),
                total_value: Some(Decimal::new(165152, 2)),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn memory_store_finds_by_id() {
        let store = MemoryStore::new().with_document(stored());
        assert_eq!(store.len(), 1);
        assert!(store.get_document_by_id("nf-1").await.unwrap().is_some());
        assert!(store.get_document_by_id("outro").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_serves_xml_by_access_key() {
        let key = AccessKey::parse("42250485179240000239550020004175331780623268").unwrap();
        let without_xml = MemoryStore::new().with_document(stored());
        assert_eq!(without_xml.fetch_xml(&key).await.unwrap(), None);

        let mut with_xml = stored();
        with_xml.xml_content = Some("<NFe/>".into());
        let store = MemoryStore::new().with_document(with_xml);
        assert_eq!(store.fetch_xml(&key).await.unwrap().as_deref(), Some("<NFe/>"));
    }

    #[tokio::test]
    async fn xml_directory_matches_key_in_file_name() {
        let dir = std::env::temp_dir().join(format!("crosswms-danfe-xmls-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let key = AccessKey::parse("42250485179240000239550020004175331780623268").unwrap();
        std::fs::write(dir.join(format!("NFe{}-procNFe.XML", key.as_str())), "<nfeProc/>").unwrap();
        std::fs::write(dir.join("outra.xml"), "<NFe/>").unwrap();

        let source = XmlDirectory::new(&dir);
        assert_eq!(source.fetch_xml(&key).await.unwrap().as_deref(), Some("<nfeProc/>"));
        let other = AccessKey::parse("35240612345678000195550010000012341000012345").unwrap();
        assert_eq!(source.fetch_xml(&other).await.unwrap(), None);
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(
            XmlDirectory::new(&dir).fetch_xml(&key).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn reconstruction_keeps_summary_fields() {
        let doc = reconstruct(&stored());
        assert_eq!(doc.emitter.name, "CORFIO INDUSTRIA");
        assert_eq!(doc.recipient.name, "ARMAZEM CENTRAL");
        assert_eq!(doc.emitter.address.city, "JOINVILLE");
        assert_eq!(doc.emitter.address.state, "SC");
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].quantity, Decimal::new(3, 0));
        assert_eq!(doc.totals.grand_total, Decimal::new(165152, 2));
        assert_eq!(doc.access_key_str(), "42250485179240000239550020004175331780623268");
    }

    #[test]
    fn empty_summary_gets_placeholders() {
        let doc = reconstruct(&StoredDocument::default());
        assert_eq!(doc.number, "S/N");
        assert_eq!(doc.series, "001");
        assert_eq!(doc.recipient.name, "DESTINATÁRIO PADRÃO");
        assert_eq!(doc.recipient.address.state, "RJ");
        assert_eq!(doc.emitter.tax_id, PLACEHOLDER_TAX_ID);
        assert!(doc.access_key.is_none());
        assert_eq!(doc.items[0].quantity, Decimal::ONE);
    }
}
