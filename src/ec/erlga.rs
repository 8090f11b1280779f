use rand::Rng;
use serde::{Deserialize, Serialize};

use super::crossover::crossover;
use super::mutation::{mutate, MutationConfig};
use super::{check_pop_size, tell_info, EcOptimizer, TellInfo};
use crate::error::{EngineError, Result};
use crate::net::PolicyParams;
use crate::rng::Key;

/// ERLGA-specific knobs layered on top of [`MutationConfig`] (§4.5 "ERLGA").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErlGaConfig {
    pub num_crossover_frac: f32,
    pub enable_crossover: bool,
}

/// GA plus an explicit crossover phase and an external (RL-supplied) slot.
#[derive(Debug, Clone)]
pub struct ErlGa {
    pop: Vec<PolicyParams>,
    num_elites: usize,
    mutation_cfg: MutationConfig,
    crossover_cfg: ErlGaConfig,
}

impl ErlGa {
    pub fn init(
        prototype: PolicyParams,
        pop_size: usize,
        num_elites: usize,
        mutation_cfg: MutationConfig,
        crossover_cfg: ErlGaConfig,
        key: Key,
    ) -> Self {
        let keys = key.split_n(pop_size);
        let pop = keys.into_iter().map(|k| mutate(&prototype, &mutation_cfg, k)).collect();
        Self {
            pop,
            num_elites,
            mutation_cfg,
            crossover_cfg,
        }
    }

    fn ranked_indices(fitnesses: &[f32]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..fitnesses.len()).collect();
        idx.sort_by(|&a, &b| fitnesses[b].partial_cmp(&fitnesses[a]).unwrap());
        idx
    }

    /// Breed `pop_size` offspring from a ranked `pool`, keeping the top
    /// `num_elites` verbatim and filling the rest via crossover (a fraction
    /// `num_crossover_frac`, if enabled) or mutation, both drawing parents
    /// from `pool` by tournament selection.
    fn breed(&self, pool: &[PolicyParams], pool_fitness: &[f32], pop_size: usize, seed: u64) -> Vec<PolicyParams> {
        let num_elites = self.num_elites.min(pool.len());
        let mut next_gen: Vec<PolicyParams> = pool[..num_elites].to_vec();
        let mut rng = Key::from_seed(seed).into_rng();

        let num_crossover = if self.crossover_cfg.enable_crossover {
            ((pop_size - num_elites) as f32 * self.crossover_cfg.num_crossover_frac).round() as usize
        } else {
            0
        };

        let tournament = |rng: &mut rand_chacha::ChaCha8Rng| -> usize {
            let a = rng.gen_range(0..pool.len());
            let b = rng.gen_range(0..pool.len());
            if pool_fitness[a] >= pool_fitness[b] {
                a
            } else {
                b
            }
        };

        while next_gen.len() < pop_size {
            let use_crossover = next_gen.len() < num_elites + num_crossover;
            let child_key = Key::from_seed(rng.gen::<u64>());
            if use_crossover {
                let a = tournament(&mut rng);
                let b = tournament(&mut rng);
                next_gen.push(crossover(&pool[a], &pool[b], child_key));
            } else {
                let a = tournament(&mut rng);
                next_gen.push(mutate(&pool[a], &self.mutation_cfg, child_key));
            }
        }
        next_gen
    }

    /// `tell_external`: rank `pop ∪ external_pop` together and breed the next
    /// generation only from the top-ranked members of that combined set, so
    /// RL actors with superior fitness can displace EC individuals (§4.5).
    pub fn tell_external(&mut self, external_pop: &[PolicyParams], fitnesses: &[f32]) -> Result<TellInfo> {
        let combined_size = self.pop.len() + external_pop.len();
        if fitnesses.len() != combined_size {
            return Err(EngineError::ShapeMismatch {
                expected: combined_size,
                actual: fitnesses.len(),
                context: "ErlGa::tell_external".into(),
            });
        }

        let combined: Vec<PolicyParams> = self.pop.iter().cloned().chain(external_pop.iter().cloned()).collect();
        let ranked = Self::ranked_indices(fitnesses);
        let pool: Vec<PolicyParams> = ranked.iter().map(|&i| combined[i].clone()).collect();
        let pool_fitness: Vec<f32> = ranked.iter().map(|&i| fitnesses[i]).collect();

        let info = tell_info(fitnesses);
        let seed = info.best_fitness.to_bits() as u64;
        self.pop = self.breed(&pool, &pool_fitness, self.pop.len(), seed);
        Ok(info)
    }
}

impl EcOptimizer for ErlGa {
    fn pop_size(&self) -> usize {
        self.pop.len()
    }

    fn ask(&mut self, _key: Key) -> Vec<PolicyParams> {
        self.pop.clone()
    }

    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        check_pop_size(self.pop.len(), fitnesses.len(), "ErlGa::tell")?;
        let ranked = Self::ranked_indices(fitnesses);
        let pool: Vec<PolicyParams> = ranked.iter().map(|&i| self.pop[i].clone()).collect();
        let pool_fitness: Vec<f32> = ranked.iter().map(|&i| fitnesses[i]).collect();

        let info = tell_info(fitnesses);
        let seed = info.best_fitness.to_bits() as u64;
        self.pop = self.breed(&pool, &pool_fitness, self.pop.len(), seed);
        Ok(info)
    }

    fn last_population(&self) -> &[PolicyParams] {
        &self.pop
    }

    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        check_pop_size(indices.len(), replacements.len(), "ErlGa::overwrite_population")?;
        for (&ix, repl) in indices.iter().zip(replacements) {
            self.pop[ix] = repl.clone();
        }
        Ok(())
    }
}
