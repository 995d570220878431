use serde::Deserialize;
use std::{fs, net::SocketAddr, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

/// Paths are resolved relative to the working directory, matching the layout
/// the service has always been deployed with.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub port: u16,
    pub dataset_path: PathBuf,
    pub graphs_dir: PathBuf,
    pub model_path: PathBuf,
    pub font_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            dataset_path: PathBuf::from("dataset/WHO-COVID-19-global-daily-data.csv"),
            graphs_dir: PathBuf::from("graphs"),
            model_path: PathBuf::from("rf_model.json"),
            font_path: Some(PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf")),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let data = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Optional `CONFIG_PATH` JSON file, then per-key environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("CONFIG_PATH") {
            Ok(p) => Self::load(p)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("PORT") {
            self.port = v.parse().map_err(|_| ConfigError::Env {
                key: "PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("DATASET_PATH") {
            self.dataset_path = v.into();
        }
        if let Some(v) = lookup("GRAPHS_DIR") {
            self.graphs_dir = v.into();
        }
        if let Some(v) = lookup("MODEL_PATH") {
            self.model_path = v.into();
        }
        if let Some(v) = lookup("FONT_PATH") {
            self.font_path = if v.is_empty() { None } else { Some(v.into()) };
        }
        Ok(self)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::Env {
                key: "BIND_ADDR",
                value: self.bind_addr.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_deployed_layout() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(
            cfg.dataset_path,
            PathBuf::from("dataset/WHO-COVID-19-global-daily-data.csv")
        );
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [("PORT", "9100"), ("GRAPHS_DIR", "/srv/graphs"), ("FONT_PATH", "")]
            .into_iter()
            .collect();
        let cfg = ServiceConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.graphs_dir, PathBuf::from("/srv/graphs"));
        assert_eq!(cfg.font_path, None);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = ServiceConfig::default()
            .with_overrides(|k| (k == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        fs::write(&path, r#"{"port": 8123, "model_path": "models/rf.json"}"#).unwrap();
        let cfg = ServiceConfig::load(&path).unwrap();
        assert_eq!(cfg.port, 8123);
        assert_eq!(cfg.model_path, PathBuf::from("models/rf.json"));
        assert_eq!(cfg.graphs_dir, PathBuf::from("graphs"));
    }
}
