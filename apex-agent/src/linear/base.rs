use super::LinearQConfig;
use crate::{
    model::{OptStat, QModel},
    opt::Optimizer,
    util::CriticLoss,
};
use anyhow::{bail, Result};
use apex_core::{ApexError, NamedParams};
use log::trace;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// `Q(s, a) = w[a] . s + b[a]`, trained with the configured optimizer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinearQ {
    config: LinearQConfig,
    w: Array2<f32>,
    b: Array1<f32>,
    opt: Optimizer,
}

impl LinearQ {
    fn check_batch(&self, obs: &[&[f32]], acts: &[usize], targets: &[f32], weights: &[f32]) -> Result<()> {
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
        if let Some(x) = obs.iter().find(|x| x.len() != self.config.in_dim) {
            bail!("expected {} features, got {}", self.config.in_dim, x.len());
        }
        if let Some(a) = acts.iter().find(|a| **a >= self.config.out_dim) {
            bail!("action {} out of range", a);
        }
        Ok(())
    }

    fn q(&self, obs: &[f32], a: usize) -> f32 {
        self.b[a]
            + self
                .w
                .row(a)
                .iter()
                .zip(obs.iter())
                .map(|(w, x)| w * x)
                .sum::<f32>()
    }
}

/// Clips the gradient of `(w, b)` to `clip_grad_norm` and applies it.
///
/// Returns the norm before clipping. A non-finite norm fails with
/// [`ApexError::NonFiniteLoss`] and leaves the parameters untouched.
pub(super) fn apply_gradient(
    opt: &mut Optimizer,
    w: &mut Array2<f32>,
    b: &mut Array1<f32>,
    mut grad_w: Array2<f32>,
    mut grad_b: Array1<f32>,
    loss_value: f32,
    clip_grad_norm: Option<f32>,
) -> Result<f32> {
    let grad_norm = (grad_w.iter().map(|g| g * g).sum::<f32>()
        + grad_b.iter().map(|g| g * g).sum::<f32>())
    .sqrt();
    if !grad_norm.is_finite() {
        return Err(ApexError::NonFiniteLoss(loss_value).into());
    }
    if let Some(max_norm) = clip_grad_norm {
        if grad_norm > max_norm {
            let scale = max_norm / grad_norm;
            grad_w.mapv_inplace(|g| g * scale);
            grad_b.mapv_inplace(|g| g * scale);
        }
    }
    trace!("loss = {}, grad_norm = {}", loss_value, grad_norm);

    opt.step(0, w.view_mut().into_dyn(), grad_w.view().into_dyn());
    opt.step(1, b.view_mut().into_dyn(), grad_b.view().into_dyn());
    Ok(grad_norm)
}

impl QModel for LinearQ {
    type Config = LinearQConfig;

    fn build(config: Self::Config, seed: u64) -> Result<Self> {
        if config.in_dim == 0 || config.out_dim == 0 {
            return Err(ApexError::InvalidConfig(format!(
                "linear model needs positive dimensions, got {}x{}",
                config.in_dim, config.out_dim
            ))
            .into());
        }
        let rng = fastrand::Rng::with_seed(seed);
        let scale = config.init_scale;
        let w = Array2::from_shape_simple_fn((config.out_dim, config.in_dim), || {
            (rng.f32() * 2.0 - 1.0) * scale
        });
        let b = Array1::zeros(config.out_dim);
        let opt = config.opt_config.build();
        Ok(Self { config, w, b, opt })
    }

    fn n_actions(&self) -> usize {
        self.config.out_dim
    }

    fn forward(&self, obs: &[f32]) -> Vec<f32> {
        (0..self.config.out_dim).map(|a| self.q(obs, a)).collect()
    }

    fn backward_step(
        &mut self,
        obs: &[&[f32]],
        acts: &[usize],
        targets: &[f32],
        weights: &[f32],
        loss: CriticLoss,
        clip_grad_norm: Option<f32>,
    ) -> Result<OptStat> {
        self.check_batch(obs, acts, targets, weights)?;
        let n = obs.len() as f32;

        let errs: Vec<f32> = obs
            .iter()
            .zip(acts.iter())
            .zip(targets.iter())
            .map(|((x, a), t)| self.q(x, *a) - t)
            .collect();
        let loss_value = errs
            .iter()
            .zip(weights.iter())
            .map(|(e, w)| w * loss.value(*e))
            .sum::<f32>()
            / n;
        if !loss_value.is_finite() {
            return Err(ApexError::NonFiniteLoss(loss_value).into());
        }

        let mut grad_w = Array2::<f32>::zeros(self.w.raw_dim());
        let mut grad_b = Array1::<f32>::zeros(self.b.raw_dim());
        for (((x, a), e), w) in obs.iter().zip(acts).zip(errs.iter()).zip(weights) {
            let g = w * loss.grad(*e) / n;
            grad_b[*a] += g;
            for (gw, xi) in grad_w.row_mut(*a).iter_mut().zip(x.iter()) {
                *gw += g * xi;
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opt::OptimizerConfig;
    use tempdir::TempDir;

    fn model() -> LinearQ {
        let config = LinearQConfig::new(2, 2).opt_config(OptimizerConfig::Sgd { lr: 0.1 });
        LinearQ::build(config, 0).unwrap()
    }

    #[test]
    fn gradient_steps_reduce_loss() -> Result<()> {
        let mut q = model();
        let x: &[f32] = &[1.0, 0.5];
        let mut last = f32::INFINITY;
        for _ in 0..50 {
            let stat = q.backward_step(&[x], &[1], &[2.0], &[1.0], CriticLoss::Mse, None)?;
            assert!(stat.loss <= last);
            last = stat.loss;
        }
        assert!((q.forward(x)[1] - 2.0).abs() < 1e-2);
        Ok(())
    }

    #[test]
    fn clipping_bounds_the_update() -> Result<()> {
        let mut q = model();
        let x: &[f32] = &[1.0, 0.0];
        let before = q.parameters();
        let stat = q.backward_step(&[x], &[0], &[100.0], &[1.0], CriticLoss::Mse, Some(1.0))?;
        assert!(stat.grad_norm > 1.0);

        let after = q.parameters();
        let moved: f32 = ["w", "b"]
            .iter()
            .flat_map(|k| before[*k].iter().zip(after[*k].iter()).map(|(a, b)| (a - b) * (a - b)))
            .sum::<f32>()
            .sqrt();
        // lr * max_norm
        assert!((moved - 0.1).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn non_finite_loss_leaves_parameters() {
        let mut q = model();
        let before = q.parameters();
        let x: &[f32] = &[1.0, 1.0];
        let err = q
            .backward_step(&[x], &[0], &[f32::NAN], &[1.0], CriticLoss::Mse, None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApexError>(),
            Some(ApexError::NonFiniteLoss(_))
        ));
        assert_eq!(q.parameters(), before);
    }

    #[test]
    fn parameters_round_trip_and_mismatch() -> Result<()> {
        let mut a = model();
        let b = LinearQ::build(LinearQConfig::new(2, 2), 7)?;
        a.load_parameters(&b.parameters())?;
        assert_eq!(a.forward(&[0.3, -0.2]), b.forward(&[0.3, -0.2]));

        let mut c = LinearQ::build(LinearQConfig::new(3, 2), 0)?;
        let err = c.load_parameters(&a.parameters()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApexError>(),
            Some(ApexError::SnapshotMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn save_and_load() -> Result<()> {
        let dir = TempDir::new("linear_q")?;
        let path = dir.path().join("qnet.bin");
        let mut a = model();
        let x: &[f32] = &[1.0, 2.0];
        a.backward_step(&[x], &[0], &[1.0], &[1.0], CriticLoss::Mse, None)?;
        a.save(&path)?;

        let mut b = LinearQ::build(LinearQConfig::new(2, 2), 3)?;
        b.load(&path)?;
        assert_eq!(a.parameters(), b.parameters());
        Ok(())
    }
}
