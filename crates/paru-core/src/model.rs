use crate::features::{self, EncodedFeatures};
use crate::util::{clamp01, sigmoid};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_THRESHOLD: f64 = 0.40;

/// Opaque pre-trained classifier: probability of the positive class for one dense row.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, row: &[f64]) -> Result<f64>;

    fn backend_name(&self) -> &str;
}

/// Logistic regression exported from training: `sigmoid(bias + w·x)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub bias: f64,
    pub weights: Vec<f64>,
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.weights.len() {
            bail!(
                "row len mismatch: got={} expect={}",
                row.len(),
                self.weights.len()
            );
        }
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        Ok(clamp01(sigmoid(z)))
    }

    fn backend_name(&self) -> &str {
        "logistic"
    }
}

/// `model.json` layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelFile {
    Logistic(LogisticModel),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Policy {
    pub threshold: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Policy {
    /// 1 = berisiko; the threshold itself counts as positive.
    #[inline]
    pub fn decide(&self, probability: f64) -> u8 {
        u8::from(probability >= self.threshold)
    }
}

fn load_feature_names(dir: &Path) -> Result<Vec<String>> {
    let json_path = dir.join("feature_names.json");
    if json_path.exists() {
        let s = fs::read_to_string(&json_path)
            .with_context(|| format!("read feature_names.json: {}", json_path.display()))?;
        let names: Vec<String> = serde_json::from_str(&s)
            .with_context(|| format!("parse feature_names.json: {}", json_path.display()))?;
        return Ok(names);
    }

    let txt_path = dir.join("features.txt");
    if txt_path.exists() {
        let s = fs::read_to_string(&txt_path)
            .with_context(|| format!("read features.txt: {}", txt_path.display()))?;
        return Ok(s
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect());
    }

    Err(anyhow!(
        "missing feature schema in model_dir={}, expected feature_names.json or features.txt",
        dir.display()
    ))
}

fn load_model_file(dir: &Path) -> Result<ModelFile> {
    let p = dir.join("model.json");
    let s = fs::read_to_string(&p).with_context(|| format!("read model.json: {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse model.json: {}", p.display()))
}

fn load_policy(dir: &Path) -> Result<Policy> {
    let p = dir.join("policy.json");
    if !p.exists() {
        return Ok(Policy::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read policy.json: {}", p.display()))?;
    let v: Policy =
        serde_json::from_str(&s).with_context(|| format!("parse policy.json: {}", p.display()))?;
    anyhow::ensure!(
        (0.0..=1.0).contains(&v.threshold),
        "policy.json threshold out of [0,1]: {}",
        v.threshold
    );
    Ok(v)
}

/// Loaded model artifact: feature schema + classifier + decision policy.
///
/// The row handed to the classifier follows the artifact's own `feature_names`,
/// each looked up by name in the encoded features.
pub struct ModelRuntime {
    pub model_dir: PathBuf,
    pub feature_names: Vec<String>,
    pub policy: Policy,
    index: Vec<usize>,
    classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for ModelRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRuntime")
            .field("model_dir", &self.model_dir)
            .field("feature_names", &self.feature_names)
            .field("policy", &self.policy)
            .field("backend", &self.classifier.backend_name())
            .finish()
    }
}

impl ModelRuntime {
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let feature_names = load_feature_names(dir)?;
        let policy = load_policy(dir)?;
        let classifier: Arc<dyn Classifier> = match load_model_file(dir)? {
            ModelFile::Logistic(m) => {
                anyhow::ensure!(
                    m.weights.len() == feature_names.len(),
                    "model.json has {} weights but {} feature names",
                    m.weights.len(),
                    feature_names.len()
                );
                Arc::new(m)
            }
        };
        let mut rt = Self::new(feature_names, classifier, policy)?;
        rt.model_dir = dir.to_path_buf();
        Ok(rt)
    }

    /// Wires an in-memory classifier; fails when a feature name is not one of the 18 indicators.
    pub fn new(
        feature_names: Vec<String>,
        classifier: Arc<dyn Classifier>,
        policy: Policy,
    ) -> Result<Self> {
        let index = feature_names
            .iter()
            .map(|n| {
                features::position(n).ok_or_else(|| anyhow!("model expects unknown feature '{n}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            model_dir: PathBuf::new(),
            feature_names,
            policy,
            index,
            classifier,
        })
    }

    /// Classifier over the canonical 18-column layout.
    pub fn with_canonical_schema(classifier: Arc<dyn Classifier>, policy: Policy) -> Result<Self> {
        let names = features::FEATURE_ORDER.iter().map(|s| s.to_string()).collect();
        Self::new(names, classifier, policy)
    }

    pub fn backend_name(&self) -> &str {
        self.classifier.backend_name()
    }

    pub fn build_row(&self, feats: &EncodedFeatures) -> Vec<f64> {
        let values = feats.values();
        self.index.iter().map(|&i| f64::from(values[i])).collect()
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        let p = self.classifier.predict_proba(row)?;
        if !(0.0..=1.0).contains(&p) {
            bail!("{} returned probability out of [0,1]: {p}", self.backend_name());
        }
        Ok(p)
    }

    #[inline]
    pub fn decide(&self, probability: f64) -> u8 {
        self.policy.decide(probability)
    }
}
