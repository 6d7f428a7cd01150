use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration, fixed at startup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model artifact directory (feature_names.json, model.json, policy.json)
    pub model_dir: PathBuf,

    /// Prediction log lives at `data_dir/csv_file`
    pub data_dir: PathBuf,
    pub csv_file: String,

    /// Static HTML pages
    pub pages_dir: PathBuf,

    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("model"),
            data_dir: PathBuf::from("data"),
            csv_file: "user_predictions.csv".to_string(),
            pages_dir: PathBuf::from("pages"),
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl Config {
    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join(&self.csv_file)
    }

    /// JSON file; keys left out keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("paru.json");
        std::fs::write(&p, r#"{"data_dir": "/var/lib/paru"}"#).unwrap();

        let cfg = Config::from_file(&p).unwrap();
        assert_eq!(cfg.csv_path(), PathBuf::from("/var/lib/paru/user_predictions.csv"));
        assert_eq!(cfg.model_dir, PathBuf::from("model"));
        assert_eq!(cfg.bind, "127.0.0.1:5000");
    }
}
