use clap::Parser;
use paru_core::config::Config;
use paru_core::store::{PredictionLog, ResetOutcome};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Deletes the prediction log and recreates it with the header row only.
///
/// Resolves the log path the same way the server does, so both touch the same file.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
struct Args {
    /// JSON config file, same format as the server's
    #[arg(long, env = "PARU_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "PARU_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log file to reset; wins over config and data dir
    #[arg(long, env = "PARU_CSV_PATH")]
    csv_path: Option<PathBuf>,
}

impl Args {
    /// csv_path > data_dir overlay > config file > defaults
    fn log_path(self) -> anyhow::Result<PathBuf> {
        if let Some(p) = self.csv_path {
            return Ok(p);
        }
        let mut cfg = match &self.config {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        if let Some(v) = self.data_dir {
            cfg.data_dir = v;
        }
        Ok(cfg.csv_path())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = Args::parse().log_path()?;
    let log = PredictionLog::new(&path);

    match log.reset()? {
        ResetOutcome::Replaced => tracing::info!(path = %path.display(), "old log removed"),
        ResetOutcome::Created => tracing::info!(path = %path.display(), "no log found, creating"),
    }
    tracing::info!(path = %path.display(), "log recreated with header only");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("paru.json");
        std::fs::write(&cfg, r#"{"data_dir": "/srv/paru", "csv_file": "log.csv"}"#).unwrap();

        assert_eq!(
            Args::default().log_path().unwrap(),
            PathBuf::from("data/user_predictions.csv")
        );

        let from_file = Args {
            config: Some(cfg.clone()),
            ..Args::default()
        };
        assert_eq!(from_file.log_path().unwrap(), PathBuf::from("/srv/paru/log.csv"));

        let overlaid = Args {
            config: Some(cfg.clone()),
            data_dir: Some(PathBuf::from("/tmp/other")),
            ..Args::default()
        };
        assert_eq!(overlaid.log_path().unwrap(), PathBuf::from("/tmp/other/log.csv"));

        let explicit = Args {
            config: Some(cfg),
            data_dir: Some(PathBuf::from("/tmp/other")),
            csv_path: Some(PathBuf::from("/x/y.csv")),
        };
        assert_eq!(explicit.log_path().unwrap(), PathBuf::from("/x/y.csv"));
    }
}
