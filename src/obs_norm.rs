/// Running mean/variance estimator shared (single instance) across the
/// population and all RL agents (§3 `AgentState.obs_preprocessor`, §9
/// "Running statistics"). Updated only from the pre-fill and RL-side
/// rollout trajectories, frozen for EC rollouts.
///
/// Uses Welford's online algorithm so updates never require re-scanning the
/// full history.
/// Numerical floor added to variance before taking the square root in
/// [`RunningMeanStd::normalize`], shared by every call site so collection
/// and training normalize identically.
pub const NORMALIZE_EPS: f32 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct RunningMeanStd {
    count: f64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningMeanStd {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0.0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Fold one observation into the running statistics.
    pub fn update(&mut self, obs: &[f32]) {
        assert_eq!(obs.len(), self.mean.len());
        self.count += 1.0;
        for i in 0..obs.len() {
            let x = obs[i] as f64;
            let delta = x - self.mean[i];
            self.mean[i] += delta / self.count;
            let delta2 = x - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    /// Fold a batch of observations.
    pub fn update_batch(&mut self, batch: &[Vec<f32>]) {
        for obs in batch {
            self.update(obs);
        }
    }

    pub fn mean(&self) -> Vec<f32> {
        self.mean.iter().map(|&x| x as f32).collect()
    }

    pub fn variance(&self) -> Vec<f32> {
        if self.count < 2.0 {
            return vec![1.0; self.mean.len()];
        }
        self.m2
            .iter()
            .map(|&x| (x / self.count) as f32)
            .collect()
    }

    /// Normalize an observation: `(obs - mean) / sqrt(var + eps)`.
    pub fn normalize(&self, obs: &[f32], eps: f32) -> Vec<f32> {
        let mean = self.mean();
        let var = self.variance();
        obs.iter()
            .zip(&mean)
            .zip(&var)
            .map(|((&x, &m), &v)| (x - m) / (v + eps).sqrt())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_converges_to_sample_mean() {
        let mut rms = RunningMeanStd::new(1);
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            rms.update(&[x]);
        }
        assert!((rms.mean()[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn variance_matches_population_variance() {
        let mut rms = RunningMeanStd::new(1);
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            rms.update(&[x]);
        }
        // population variance of this set is 4.0
        assert!((rms.variance()[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn unseen_dims_default_to_unit_variance() {
        let rms = RunningMeanStd::new(3);
        assert_eq!(rms.variance(), vec![1.0, 1.0, 1.0]);
    }
}
