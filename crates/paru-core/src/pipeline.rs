use crate::{
    config::Config,
    features,
    model::ModelRuntime,
    query,
    schema::{Breakdown, PredictResponse, Summary},
    store::{LogRow, LogTable, PredictionLog},
    util::{local_timestamp, now_us},
};

use anyhow::Context;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Application context built once at startup and shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppCore {
    pub cfg: Config,
    pub model: Arc<ModelRuntime>,
    pub log: Arc<PredictionLog>,
}

impl AppCore {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let model = ModelRuntime::load_from_dir(&cfg.model_dir)
            .with_context(|| format!("load model from {}", cfg.model_dir.display()))?;
        tracing::info!(
            model_dir = %cfg.model_dir.display(),
            backend = model.backend_name(),
            features = model.feature_names.len(),
            threshold = model.policy.threshold,
            "model loaded"
        );
        Ok(Self::with_model(cfg, Arc::new(model)))
    }

    pub fn with_model(cfg: Config, model: Arc<ModelRuntime>) -> Self {
        let log = Arc::new(PredictionLog::new(cfg.csv_path()));
        Self { cfg, model, log }
    }

    /// encode -> score -> threshold -> append; any failing step fails the whole request.
    pub fn predict(&self, obj: &Map<String, Value>) -> anyhow::Result<PredictResponse> {
        let t0 = Instant::now();

        let t_feat = Instant::now();
        let feats = features::encode(obj)?;
        let row = self.model.build_row(&feats);
        metrics::histogram!("stage_feature_us").record(now_us(t_feat) as f64);

        let t_model = Instant::now();
        let probability = self.model.predict_proba(&row)?;
        let prediction = self.model.decide(probability);
        metrics::histogram!("stage_model_us").record(now_us(t_model) as f64);

        let t_append = Instant::now();
        self.log
            .append(&LogRow {
                features: feats,
                prediction,
                probability,
                timestamp: local_timestamp(),
            })
            .context("append prediction log")?;
        metrics::histogram!("stage_append_us").record(now_us(t_append) as f64);

        metrics::counter!("predict_total").increment(1);
        if prediction == 1 {
            metrics::counter!("predict_positive_total").increment(1);
        }
        metrics::histogram!("e2e_us").record(now_us(t0) as f64);

        Ok(PredictResponse {
            prediction,
            probability,
        })
    }

    pub fn summary(&self) -> anyhow::Result<Summary> {
        let table = self.read_log()?;
        Ok(query::summary(&table)?)
    }

    pub fn history(&self) -> anyhow::Result<Vec<Map<String, Value>>> {
        let table = self.read_log()?;
        Ok(query::history(&table))
    }

    pub fn breakdown(&self, column: &str) -> anyhow::Result<Breakdown> {
        let table = self.read_log()?;
        Ok(query::breakdown(&table, column)?)
    }

    // full re-read on every call, no cache
    fn read_log(&self) -> anyhow::Result<LogTable> {
        let t0 = Instant::now();
        let table = self.log.read_all()?;
        metrics::histogram!("stage_read_log_us").record(now_us(t0) as f64);
        Ok(table)
    }
}
