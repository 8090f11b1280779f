use rand_distr::{Distribution, Normal};

use super::{check_pop_size, tell_info, EcOptimizer, TellInfo};
use crate::error::Result;
use crate::net::PolicyParams;
use crate::rng::Key;

/// Diagonal-covariance CEM (§4.5 "CEM (diagonal)"): `ask` samples
/// `mean + diag(√variance) ⊙ 𝒩(0,I)`; `tell` re-estimates `mean`/`variance`
/// from the top `num_elites`.
#[derive(Debug, Clone)]
pub struct Cem {
    mean: PolicyParams,
    variance: PolicyParams,
    num_elites: usize,
    pop_size: usize,
    variance_eps: f32,
    last_pop: Vec<PolicyParams>,
}

impl Cem {
    pub fn init(prototype: PolicyParams, pop_size: usize, num_elites: usize, init_variance: f32, variance_eps: f32) -> Self {
        let variance = prototype.map(|_| init_variance);
        let last_pop = vec![prototype.clone(); pop_size];
        Self {
            mean: prototype,
            variance,
            num_elites,
            pop_size,
            variance_eps,
            last_pop,
        }
    }

    fn sample_one(&self, key: Key) -> PolicyParams {
        let mut rng = key.into_rng();
        self.mean
            .zip_map(&self.variance, |m, v| {
                let noise: f32 = Normal::new(0.0, v.max(0.0).sqrt()).unwrap().sample(&mut rng);
                m + noise
            })
            .expect("mean/variance shapes always match")
    }
}

impl EcOptimizer for Cem {
    fn pop_size(&self) -> usize {
        self.pop_size
    }

    fn ask(&mut self, key: Key) -> Vec<PolicyParams> {
        let keys = key.split_n(self.pop_size);
        self.last_pop = keys.into_iter().map(|k| self.sample_one(k)).collect();
        self.last_pop.clone()
    }

    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        check_pop_size(self.last_pop.len(), fitnesses.len(), "Cem::tell")?;
        let mut ranked: Vec<usize> = (0..fitnesses.len()).collect();
        ranked.sort_by(|&a, &b| fitnesses[b].partial_cmp(&fitnesses[a]).unwrap());
        let elite_ix = &ranked[..self.num_elites];

        let n = self.num_elites as f32;
        let mut new_mean = self.last_pop[elite_ix[0]].map(|_| 0.0);
        for &ix in elite_ix {
            new_mean = new_mean.zip_map(&self.last_pop[ix], |acc, v| acc + v / n)?;
        }

        let eps = self.variance_eps;
        let mut new_var = new_mean.map(|_| 0.0);
        for &ix in elite_ix {
            let diff = self.last_pop[ix].zip_map(&new_mean, |v, m| (v - m) * (v - m))?;
            new_var = new_var.zip_map(&diff, |acc, d| acc + d / n)?;
        }
        new_var = new_var.map(|v| v + eps);

        self.mean = new_mean;
        self.variance = new_var;
        Ok(tell_info(fitnesses))
    }

    fn last_population(&self) -> &[PolicyParams] {
        &self.last_pop
    }

    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        check_pop_size(indices.len(), replacements.len(), "Cem::overwrite_population")?;
        for (&ix, repl) in indices.iter().zip(replacements) {
            self.last_pop[ix] = repl.clone();
        }
        Ok(())
    }
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

    #[test]
    fn ask_is_deterministic_given_key() {
        let mut a = Cem::init(prototype(), 8, 3, 1.0, 1e-3);
        let mut b = Cem::init(prototype(), 8, 3, 1.0, 1e-3);
        let pa = a.ask(Key::from_seed(7));
        let pb = b.ask(Key::from_seed(7));
        assert_eq!(pa, pb);
    }

    #[test]
    fn mean_moves_toward_elite_fitness_direction() {
        let mut cem = Cem::init(prototype(), 20, 5, 1.0, 1e-3);
        let pop = cem.ask(Key::from_seed(1));
        // fitness favors larger head weight values, so elites should have
        // above-average weight and the new mean should increase accordingly.
        let fitnesses: Vec<f32> = pop.iter().map(|p| p.head.weight.iter().sum()).collect();
        let old_mean_sum: f32 = cem.mean.head.weight.iter().sum();
        cem.tell(&fitnesses).unwrap();
        let new_mean_sum: f32 = cem.mean.head.weight.iter().sum();
        assert!(new_mean_sum >= old_mean_sum);
    }
}
