use crate::service::Method;
use crate::xml::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("XML da NF-e malformado: {0}")]
    MalformedXml(String),

    #[error("Estrutura XML inválida - não encontrada NFe/infNFe")]
    MissingRoot,

    #[error("NF-e sem itens (nenhum elemento det)")]
    NoItems,

    #[error("Falha ao decodificar docZip: {0}")]
    DocZip(String),
}

impl From<XmlError> for ExtractionError {
    fn from(e: XmlError) -> Self {
        ExtractionError::MalformedXml(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Falha ao montar o PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Falha ao gravar o PDF: {0}")]
    Io(#[from] std::io::Error),

    #[error("Falha no layout do DANFE: {0}")]
    Layout(String),

    #[error("Falha ao gerar código de barras: {0}")]
    Barcode(String),

    #[error("Falha ao unir PDFs: {0}")]
    Merge(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Nota fiscal não encontrada: {0}")]
    NotFound(String),

    #[error("Erro ao consultar nota fiscal: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("Falha na comunicação com a API de DANFE: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API de DANFE retornou status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Resposta da API de DANFE não é base64 válido: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("API de DANFE retornou resposta vazia")]
    EmptyBody,

    #[error("Nem XML nem chave de acesso disponíveis para a API externa")]
    NothingToSend,
}

#[derive(Error, Debug)]
pub enum DanfeError {
    #[error("Requisição inválida: {0}")]
    InvalidRequest(String),

    #[error("Todos os métodos falharam (último: {}): {message}", method_name(.last_method))]
    AllFallbacksExhausted {
        last_method: Option<Method>,
        message: String,
    },

    #[error("Nenhum documento do lote pôde ser gerado")]
    EmptyBatch,

    #[error("Falha ao montar o lote: {0}")]
    Batch(#[from] RenderError),
}

fn method_name(method: &Option<Method>) -> &'static str {
    (*method).map(Method::as_str).unwrap_or("nenhum")
}

impl DanfeError {
    pub fn last_method(&self) -> Option<Method> {
        match self {
            DanfeError::AllFallbacksExhausted { last_method, .. } => *last_method,
            _ => None,
        }
    }
}
