// ── Configuration ──────────────────────────────────────────────
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://ws.meudanfe.com.br/api/v1/get/nfe/xmltodanfepdf/API";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DanfeConfig {
    /// Presence of the key enables the external rendering stage.
    pub api_key: Option<String>,
    pub api_url: String,
    pub http_timeout: Duration,
    /// Folder searched for `<chave>.xml` when a request only carries the key.
    pub xml_dir: Option<PathBuf>,
}

impl Default for DanfeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            xml_dir: None,
        }
    }
}

impl DanfeConfig {
    /// Reads the process environment, loading `.env` first when present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = non_blank("DANFE_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_key: non_blank("MEUDANFE_API_KEY"),
            api_url: non_blank("MEUDANFE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            http_timeout: Duration::from_secs(timeout),
            xml_dir: non_blank("DANFE_XML_DIR").map(PathBuf::from),
        }
    }

    pub fn external_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> DanfeConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DanfeConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg, DanfeConfig::default());
        assert!(!cfg.external_enabled());
    }

    #[test]
    fn blank_key_does_not_enable_external_stage() {
        assert!(!config(&[("MEUDANFE_API_KEY", "   ")]).external_enabled());
        assert!(config(&[("MEUDANFE_API_KEY", "abc")]).external_enabled());
    }

    #[test]
    fn timeout_and_url_overrides() {
        let cfg = config(&[
            ("MEUDANFE_API_URL", "http://localhost:9000/danfe"),
            ("DANFE_HTTP_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(cfg.api_url, "http://localhost:9000/danfe");
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(config(&[("DANFE_HTTP_TIMEOUT_SECS", "zero")]).http_timeout, Duration::from_secs(30));
        assert_eq!(config(&[("DANFE_HTTP_TIMEOUT_SECS", "0")]).http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn xml_dir_from_environment() {
        assert_eq!(config(&[]).xml_dir, None);
        assert_eq!(config(&[("DANFE_XML_DIR", " ")]).xml_dir, None);
        assert_eq!(
            config(&[("DANFE_XML_DIR", "/srv/nfe")]).xml_dir,
            Some(PathBuf::from("/srv/nfe"))
        );
    }
}
