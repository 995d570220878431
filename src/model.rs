use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Number of features the shipped death regressor was fitted on.
pub const DEFAULT_N_FEATURES: usize = 8;

const LEAF: i64 = -1;

#[derive(Deserialize)]
struct ArtifactJson {
    #[serde(default = "default_n_features")]
    n_features: usize,
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(flatten)]
    estimator: Estimator,
}

fn default_n_features() -> usize {
    DEFAULT_N_FEATURES
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Estimator {
    Linear { coefficients: Vec<f64>, intercept: f64 },
    DecisionTree { tree: Tree },
    RandomForest { trees: Vec<Tree> },
}

/// A fitted CART regressor in parallel-array layout: node `i` is a leaf when
/// `children_left[i] == -1`, otherwise it splits on `feature[i] <= threshold[i]`.
#[derive(Deserialize, Debug, Clone)]
pub struct Tree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<f64>,
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<()> {
        let n = self.value.len();
        if n == 0 {
            bail!("tree has no nodes");
        }
        for (name, len) in [
            ("children_left", self.children_left.len()),
            ("children_right", self.children_right.len()),
            ("feature", self.feature.len()),
            ("threshold", self.threshold.len()),
        ] {
            if len != n {
                bail!("tree array {} has {} entries, expected {}", name, len, n);
            }
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == LEAF && right == LEAF {
                continue;
            }
            // Children must come after their parent, which also rules out cycles.
            for child in [left, right] {
                if child <= i as i64 || child >= n as i64 {
                    bail!("node {} has out-of-order child index {}", i, child);
                }
            }
            let feat = self.feature[i];
            if feat < 0 || feat as usize >= n_features {
                bail!("node {} splits on feature {} (n_features = {})", i, feat, n_features);
            }
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            if left == LEAF {
                return self.value[node];
            }
            let feat = self.feature[node] as usize;
            node = if row[feat] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
    }
}

/// Row-major matrix handed to the estimator; requests always produce one row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    n_cols: usize,
}

impl FeatureMatrix {
    /// Reshape a flat vector into a single row.
    pub fn single_row(x: &[f64]) -> Self {
        Self {
            data: x.to_vec(),
            n_cols: x.len(),
        }
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.data.len() / self.n_cols
        }
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.n_cols.max(1))
    }
}

#[derive(Debug)]
pub struct RegressionModel {
    estimator: Estimator,
    pub n_features: usize,
    pub feature_names: Vec<String>,
}

impl RegressionModel {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let txt = fs::read_to_string(model_path)
            .with_context(|| format!("failed to read model artifact at {}", model_path.display()))?;
        Self::from_json(&txt)
            .with_context(|| format!("invalid model artifact {}", model_path.display()))
    }

    pub fn from_json(txt: &str) -> Result<Self> {
        let artifact: ArtifactJson =
            serde_json::from_str(txt).context("failed to parse model artifact json")?;

        let n_features = artifact.n_features;
        if n_features == 0 {
            bail!("n_features must be positive");
        }
        if !artifact.feature_names.is_empty() && artifact.feature_names.len() != n_features {
            bail!(
                "feature_names has {} entries but n_features is {}",
                artifact.feature_names.len(),
                n_features
            );
        }

        match &artifact.estimator {
            Estimator::Linear { coefficients, .. } => {
                if coefficients.len() != n_features {
                    bail!(
                        "linear model has {} coefficients, expected {}",
                        coefficients.len(),
                        n_features
                    );
                }
            }
            Estimator::DecisionTree { tree } => tree.validate(n_features)?,
            Estimator::RandomForest { trees } => {
                if trees.is_empty() {
                    bail!("random forest has no trees");
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(n_features)
                        .with_context(|| format!("random forest tree {}", i))?;
                }
            }
        }

        Ok(Self {
            estimator: artifact.estimator,
            n_features,
            feature_names: artifact.feature_names,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self.estimator {
            Estimator::Linear { .. } => "linear",
            Estimator::DecisionTree { .. } => "decision_tree",
            Estimator::RandomForest { .. } => "random_forest",
        }
    }

    /// Predicts for one row per matrix row.
    pub fn predict_matrix(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.n_features {
            bail!(
                "feature length mismatch: got {}, expected {}",
                x.n_cols(),
                self.n_features
            );
        }
        Ok(x.rows().map(|row| self.estimator.predict_row(row)).collect())
    }

    /// Single-sample prediction: reshape to 1×n, predict, take the only output.
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        let matrix = FeatureMatrix::single_row(x);
        let out = self.predict_matrix(&matrix)?;
        match out.first() {
            Some(y) => Ok(*y),
            None => bail!("model returned no prediction"),
        }
    }
}

impl Estimator {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            Estimator::Linear {
                coefficients,
                intercept,
            } => intercept + coefficients.iter().zip(row).map(|(w, x)| w * x).sum::<f64>(),
            Estimator::DecisionTree { tree } => tree.predict_row(row),
            Estimator::RandomForest { trees } => {
                trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / trees.len() as f64
            }
        }
    }
}
