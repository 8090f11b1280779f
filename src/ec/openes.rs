use rand_distr::{Distribution, Normal};

use super::schedule::ExponentialSchedule;
use super::{check_pop_size, tell_info, EcOptimizer, TellInfo};
use crate::error::Result;
use crate::net::PolicyParams;
use crate::rng::Key;

/// Natural-gradient ES (§4.5 "OpenES"): `ask` draws (optionally antithetic)
/// Gaussian noise around `mean`; `tell` converts ranks to centered
/// utilities and takes a natural-gradient step.
#[derive(Debug, Clone)]
pub struct OpenEs {
    mean: PolicyParams,
    sigma: ExponentialSchedule,
    alpha: ExponentialSchedule,
    pop_size: usize,
    mirror_sampling: bool,
    last_noise: Vec<PolicyParams>,
    last_pop: Vec<PolicyParams>,
}

impl OpenEs {
    pub fn init(prototype: PolicyParams, pop_size: usize, sigma: ExponentialSchedule, alpha: ExponentialSchedule, mirror_sampling: bool) -> Self {
        if mirror_sampling {
            assert!(pop_size % 2 == 0, "mirror_sampling requires an even pop_size");
        }
        let last_pop = vec![prototype.clone(); pop_size];
        let last_noise = vec![prototype.map(|_| 0.0); pop_size];
        Self {
            mean: prototype,
            sigma,
            alpha,
            pop_size,
            mirror_sampling,
            last_noise,
            last_pop,
        }
    }

    /// The current distribution mean, evaluated deterministically by C8 for
    /// ES-style variants (§4.7 "Evaluation").
    pub fn mean(&self) -> &PolicyParams {
        &self.mean
    }

    fn sample_noise(&self, key: Key) -> PolicyParams {
        let mut rng = key.into_rng();
        self.mean.map(|_| Normal::new(0.0, 1.0).unwrap().sample(&mut rng))
    }
}

impl EcOptimizer for OpenEs {
    fn pop_size(&self) -> usize {
        self.pop_size
    }

    fn ask(&mut self, key: Key) -> Vec<PolicyParams> {
        let sigma = self.sigma.current();
        let half = if self.mirror_sampling { self.pop_size / 2 } else { self.pop_size };
        let keys = key.split_n(half);
        let mut noise = Vec::with_capacity(self.pop_size);
        for k in keys {
            let eps = self.sample_noise(k);
            if self.mirror_sampling {
                let neg = eps.map(|v| -v);
                noise.push(eps);
                noise.push(neg);
            } else {
                noise.push(eps);
            }
        }
        self.last_noise = noise;
        self.last_pop = self
            .last_noise
            .iter()
            .map(|eps| self.mean.zip_map(eps, |m, e| m + sigma * e).expect("shapes match"))
            .collect();
        self.last_pop.clone()
    }

    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        check_pop_size(self.pop_size, fitnesses.len(), "OpenEs::tell")?;
        let utilities = rank_avg_centered_utilities(fitnesses);
        let sigma = self.sigma.current();
        let alpha = self.alpha.current();
        let coef = alpha / (self.pop_size as f32 * sigma);

        let mut weighted_sum = self.mean.map(|_| 0.0);
        for (u, eps) in utilities.iter().zip(&self.last_noise) {
            let w = u * coef;
            weighted_sum = weighted_sum.zip_map(eps, |acc, e| acc + w * e)?;
        }
        self.mean = self.mean.zip_map(&weighted_sum, |m, d| m + d)?;
        self.sigma.advance();
        self.alpha.advance();
        Ok(tell_info(fitnesses))
    }

    fn last_population(&self) -> &[PolicyParams] {
        &self.last_pop
    }

    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        check_pop_size(indices.len(), replacements.len(), "OpenEs::overwrite_population")?;
        for (&ix, repl) in indices.iter().zip(replacements) {
            self.last_pop[ix] = repl.clone();
        }
        Ok(())
    }
}

/// Rank each fitness ascending (worst = 0), averaging ranks within tied
/// groups, then center into `[-0.5, 0.5]`. Tied groups receive identical
/// (average) rank, so a fully-tied fitness vector yields all-zero
/// utilities — the exact invariant §8 item 5 requires.
fn rank_avg_centered_utilities(fitnesses: &[f32]) -> Vec<f32> {
    let n = fitnesses.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fitnesses[a].partial_cmp(&fitnesses[b]).unwrap());

    let mut avg_rank = vec![0.0f32; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && fitnesses[order[j + 1]] == fitnesses[order[i]] {
            j += 1;
        }
        let avg = ((i + j) as f32) / 2.0;
        for k in i..=j {
            avg_rank[order[k]] = avg;
        }
        i = j + 1;
    }

    avg_rank.into_iter().map(|r| r / (n as f32 - 1.0) - 0.5).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::params::LayerParams;

    fn prototype() -> PolicyParams {
        PolicyParams {
            hidden: vec![LayerParams::zeros(2, 3)],
            head: LayerParams::zeros(3, 1),
        }
    }

    fn sched(v: f32) -> ExponentialSchedule {
        ExponentialSchedule::new(v, 0.999, v * 0.1)
    }

    #[test]
    fn tied_fitnesses_yield_zero_utilities_and_mean_unmoved() {
        let utilities = rank_avg_centered_utilities(&[1.0, 1.0, 1.0, 1.0]);
        assert!(utilities.iter().all(|&u| u == 0.0));

        let mut es = OpenEs::init(prototype(), 8, sched(0.1), sched(0.05), true);
        es.ask(Key::from_seed(0));
        let before = es.mean.clone();
        es.tell(&[1.0; 8]).unwrap();
        assert_eq!(es.mean, before);
    }

    #[test]
    fn ask_is_deterministic_given_key() {
        let mut a = OpenEs::init(prototype(), 8, sched(0.1), sched(0.05), true);
        let mut b = OpenEs::init(prototype(), 8, sched(0.1), sched(0.05), true);
        let pa = a.ask(Key::from_seed(3));
        let pb = b.ask(Key::from_seed(3));
        assert_eq!(pa, pb);
    }

    #[test]
    fn mirror_sampling_pairs_are_negations() {
        let mut es = OpenEs::init(prototype(), 4, sched(0.1), sched(0.05), true);
        let noise = {
            es.ask(Key::from_seed(1));
            es.last_noise.clone()
        };
        for i in 0..2 {
            let a = &noise[i];
            let b = &noise[i + 2];
            assert_eq!(a.head.weight, b.head.weight.iter().map(|&x| -x).collect::<Vec<_>>());
        }
    }
}
