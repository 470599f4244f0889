use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Must match an adapter name known to `sources::build_adapter`.
    pub name: String,
    /// Manufacturer search keys crawled for this source.
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub user_agent: String,
    /// When set, the binary re-runs ingestion on this interval instead of
    /// exiting after one pass.
    #[serde(default)]
    pub check_interval_seconds: Option<u64>,
    pub sources: Vec<SourceConfig>,
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_list() {
        let raw = r#"{
            "db_path": "data.db",
            "user_agent": "agent",
            "sources": [
                { "name": "Benu", "targets": ["uriage", "la roche-posay"] }
            ]
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.check_interval_seconds, None);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].targets[1], "la roche-posay");
    }
}
