use super::base::apply_gradient;
use crate::{
    model::{OptStat, QModel, QuantileModel},
    opt::{Optimizer, OptimizerConfig},
    util::{quantile_fractions, quantile_huber, quantile_huber_grad, CriticLoss},
};
use anyhow::{bail, Result};
use apex_core::{ApexError, NamedParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Configuration of [`LinearQuantile`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LinearQuantileConfig {
    pub(super) in_dim: usize,
    pub(super) n_actions: usize,
    pub(super) n_quantiles: usize,
    pub(super) init_scale: f32,
    pub(super) opt_config: OptimizerConfig,
}

impl Default for LinearQuantileConfig {
    fn default() -> Self {
        Self {
            in_dim: 4,
            n_actions: 2,
            n_quantiles: 32,
            init_scale: 0.01,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl LinearQuantileConfig {
    /// Creates configuration of a linear model from `in_dim` features to `n_actions` actions.
    pub fn new(in_dim: usize, n_actions: usize) -> Self {
        Self {
            in_dim,
            n_actions,
            ..Self::default()
        }
    }

    /// Sets the number of quantiles per action.
    pub fn n_quantiles(mut self, n_quantiles: usize) -> Self {
        self.n_quantiles = n_quantiles;
        self
    }

    /// Sets the half-width of the uniform distribution weights are drawn from.
    pub fn init_scale(mut self, init_scale: f32) -> Self {
        self.init_scale = init_scale;
        self
    }

    /// Sets the optimizer.
    pub fn opt_config(mut self, opt_config: OptimizerConfig) -> Self {
        self.opt_config = opt_config;
        self
    }

    /// Overrides the learning rate of the optimizer.
    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.opt_config = self.opt_config.learning_rate(lr);
        self
    }
}

/// `θ_j(s, a) = w[a, j] . s + b[a, j]`, one linear head per action and quantile.
///
/// Row `a * n_quantiles + j` of `w` and `b` holds quantile `j` of action `a`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinearQuantile {
    config: LinearQuantileConfig,
    w: Array2<f32>,
    b: Array1<f32>,
    opt: Optimizer,
}

impl LinearQuantile {
    fn row(&self, a: usize, j: usize) -> usize {
        a * self.config.n_quantiles + j
    }

    fn theta(&self, obs: &[f32], row: usize) -> f32 {
        self.b[row]
            + self
                .w
                .row(row)
                .iter()
                .zip(obs.iter())
                .map(|(w, x)| w * x)
                .sum::<f32>()
    }

    fn check_batch(
        &self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[Vec<f32>],
        weights: &[f32],
    ) -> Result<()> {
        let n = obs.len();
        if n == 0 || acts.len() != n || targets.len() != n || weights.len() != n {
            bail!(
                "inconsistent batch: {} obs, {} acts, {} targets, {} weights",
                n,
                acts.len(),
                targets.len(),
                weights.len()
            );
        }
        if targets.iter().any(|t| t.is_empty()) {
            bail!("empty target distribution");
        }
        if let Some(x) = obs.iter().find(|x| x.len() != self.config.in_dim) {
            bail!("expected {} features, got {}", self.config.in_dim, x.len());
        }
        if let Some(a) = acts.iter().find(|a| **a >= self.config.n_actions) {
            bail!("action {} out of range", a);
        }
        Ok(())
    }
}

impl QModel for LinearQuantile {
    type Config = LinearQuantileConfig;

    fn build(config: Self::Config, seed: u64) -> Result<Self> {
        if config.in_dim == 0 || config.n_actions == 0 || config.n_quantiles == 0 {
            return Err(ApexError::InvalidConfig(format!(
                "quantile model needs positive dimensions, got {}x{}x{}",
                config.in_dim, config.n_actions, config.n_quantiles
            ))
            .into());
        }
        let rng = fastrand::Rng::with_seed(seed);
        let scale = config.init_scale;
        let n_rows = config.n_actions * config.n_quantiles;
        let w = Array2::from_shape_simple_fn((n_rows, config.in_dim), || {
            (rng.f32() * 2.0 - 1.0) * scale
        });
        let b = Array1::zeros(n_rows);
        let opt = config.opt_config.build();
        Ok(Self { config, w, b, opt })
    }

    fn n_actions(&self) -> usize {
        self.config.n_actions
    }

    fn forward(&self, obs: &[f32]) -> Vec<f32> {
        self.quantiles(obs)
            .iter()
            .map(|z| z.iter().sum::<f32>() / z.len() as f32)
            .collect()
    }

    /// Regresses the quantiles of each action onto its scalar target.
    ///
    /// Uses the quantile Huber loss whatever `loss` is.
    fn backward_step(
        &mut self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[f32],
        weights: &[f32],
        _loss: CriticLoss,
        clip_grad_norm: Option<f32>,
    ) -> Result<OptStat> {
        let targets: Vec<Vec<f32>> = targets.iter().map(|t| vec![*t]).collect();
        self.quantile_backward_step(obs, acts, &targets, weights, clip_grad_norm)
    }

    fn parameters(&self) -> NamedParams {
        let mut params = NamedParams::new();
        params.insert("w".to_string(), self.w.iter().cloned().collect());
        params.insert("b".to_string(), self.b.to_vec());
        params
    }

    fn load_parameters(&mut self, params: &NamedParams) -> Result<()> {
        let (w, b) = match (params.get("w"), params.get("b")) {
            (Some(w), Some(b)) => (w, b),
            _ => {
                return Err(
                    ApexError::SnapshotMismatch("missing parameter w or b".to_string()).into(),
                )
            }
        };
        if w.len() != self.w.len() || b.len() != self.b.len() {
            return Err(ApexError::SnapshotMismatch(format!(
                "expected {} + {} parameters, got {} + {}",
                self.w.len(),
                self.b.len(),
                w.len(),
                b.len()
            ))
            .into());
        }
        self.w = Array2::from_shape_vec(self.w.raw_dim(), w.clone())?;
        self.b = Array1::from(b.clone());
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        bincode::serialize_into(file, self)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = BufReader::new(File::open(path)?);
        let loaded: Self = bincode::deserialize_from(file)?;
        if loaded.w.raw_dim() != self.w.raw_dim() {
            return Err(ApexError::SnapshotMismatch(format!(
                "expected weights of shape {:?}, found {:?} in {:?}",
                self.w.shape(),
                loaded.w.shape(),
                path
            ))
            .into());
        }
        *self = loaded;
        Ok(())
    }
}

impl QuantileModel for LinearQuantile {
    fn n_quantiles(&self) -> usize {
        self.config.n_quantiles
    }

    fn quantiles(&self, obs: &[f32]) -> Vec<Vec<f32>> {
        (0..self.config.n_actions)
            .map(|a| {
                (0..self.config.n_quantiles)
                    .map(|j| self.theta(obs, self.row(a, j)))
                    .collect()
            })
            .collect()
    }

    fn quantile_backward_step(
        &mut self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[Vec<f32>],
        weights: &[f32],
        clip_grad_norm: Option<f32>,
    ) -> Result<OptStat> {
        self.check_batch(obs, acts, targets, weights)?;
        let n = obs.len() as f32;
        let taus = quantile_fractions(self.config.n_quantiles);

        let mut loss_value = 0f32;
        let mut grad_w = Array2::<f32>::zeros(self.w.raw_dim());
        let mut grad_b = Array1::<f32>::zeros(self.b.raw_dim());
        for (((x, a), tgt), w) in obs.iter().zip(acts).zip(targets).zip(weights) {
            let k = tgt.len() as f32;
            for (j, tau) in taus.iter().enumerate() {
                let row = self.row(*a, j);
                let theta = self.theta(x, row);
                let (l, g) = tgt.iter().fold((0f32, 0f32), |(l, g), t| {
                    let u = t - theta;
                    (l + quantile_huber(u, *tau), g + quantile_huber_grad(u, *tau))
                });
                loss_value += w * l / k / n;
                let g = w * g / k / n;
                grad_b[row] += g;
                for (gw, xi) in grad_w.row_mut(row).iter_mut().zip(x.iter()) {
                    *gw += g * xi;
                }
            }
        }
        if !loss_value.is_finite() {
            return Err(ApexError::NonFiniteLoss(loss_value).into());
        }

        let grad_norm = apply_gradient(
            &mut self.opt,
            &mut self.w,
            &mut self.b,
            grad_w,
            grad_b,
            loss_value,
            clip_grad_norm,
        )?;
        Ok(OptStat {
            loss: loss_value,
            grad_norm,
        })
    }
}
