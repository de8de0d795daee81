// ── External DANFE API ─────────────────────────────────────────
//
// Last-resort rendering through the meudanfe web service. The service takes
// the XML (or a bare access key) as text/plain and answers with base64,
// sometimes wrapped in quotes.
use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::config::DanfeConfig;
use crate::error::ExternalError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalPayload {
    Xml(String),
    AccessKey(String),
}

impl ExternalPayload {
    fn into_body(self) -> String {
        match self {
            ExternalPayload::Xml(xml) => xml,
            ExternalPayload::AccessKey(key) => key,
        }
    }
}

#[async_trait]
pub trait ExternalRenderer: Send + Sync {
    async fn render(&self, payload: ExternalPayload) -> Result<Vec<u8>, ExternalError>;
}

/// Strips surrounding quotes and whitespace, then decodes.
pub fn decode_response(body: &str) -> Result<Vec<u8>, ExternalError> {
    let cleaned: String = body.chars().filter(|c| *c != '"' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(ExternalError::EmptyBody);
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(cleaned)?;
    if bytes.is_empty() {
        return Err(ExternalError::EmptyBody);
    }
    Ok(bytes)
}

pub struct MeuDanfeClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl MeuDanfeClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: std::time::Duration) -> Result<Self, ExternalError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &DanfeConfig) -> Result<Option<Self>, ExternalError> {
        match &config.api_key {
            Some(key) => Self::new(config.api_url.clone(), key.clone(), config.http_timeout).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ExternalRenderer for MeuDanfeClient {
    async fn render(&self, payload: ExternalPayload) -> Result<Vec<u8>, ExternalError> {
        let body = payload.into_body();
        if body.trim().is_empty() {
            return Err(ExternalError::NothingToSend);
        }
        debug!(url = %self.url, bytes = body.len(), "Enviando documento para API de DANFE");

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .header("Api-Key", &self.api_key)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let preview = text.chars().take(500).collect();
            return Err(ExternalError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }
        decode_response(&text)
    }
}
