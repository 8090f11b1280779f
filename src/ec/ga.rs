use rand::Rng;

use super::mutation::{mutate, MutationConfig};
use super::{check_pop_size, tell_info, EcOptimizer, TellInfo};
use crate::error::Result;
use crate::net::PolicyParams;
use crate::rng::Key;

/// Generational GA with elitism (§4.5 "GA"). The population is stored
/// explicitly; `ask` returns it unchanged, `tell` sorts by fitness, keeps
/// the top `num_elites` untouched, and fills the rest by tournament
/// selection + mutation.
#[derive(Debug, Clone)]
pub struct Ga {
    pop: Vec<PolicyParams>,
    num_elites: usize,
    mutation_cfg: MutationConfig,
}

impl Ga {
    pub fn init(prototype: PolicyParams, pop_size: usize, num_elites: usize, mutation_cfg: MutationConfig, key: Key) -> Self {
        let keys = key.split_n(pop_size);
        let pop = keys.into_iter().map(|k| mutate(&prototype, &mutation_cfg, k)).collect();
        Self {
            pop,
            num_elites,
            mutation_cfg,
        }
    }

    /// Sort indices by descending fitness.
    fn ranked_indices(fitnesses: &[f32]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..fitnesses.len()).collect();
        idx.sort_by(|&a, &b| fitnesses[b].partial_cmp(&fitnesses[a]).unwrap());
        idx
    }

    fn tournament_select(elite_params: &[PolicyParams], rng: &mut impl rand::RngCore, elite_fitness: &[f32]) -> usize {
        let a = rng.gen_range(0..elite_params.len());
        let b = rng.gen_range(0..elite_params.len());
        if elite_fitness[a] >= elite_fitness[b] {
            a
        } else {
            b
        }
    }
}

impl EcOptimizer for Ga {
    fn pop_size(&self) -> usize {
        self.pop.len()
    }

    fn ask(&mut self, _key: Key) -> Vec<PolicyParams> {
        self.pop.clone()
    }

    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        check_pop_size(self.pop.len(), fitnesses.len(), "Ga::tell")?;
        let ranked = Self::ranked_indices(fitnesses);

        let elites: Vec<PolicyParams> = ranked[..self.num_elites].iter().map(|&i| self.pop[i].clone()).collect();
        let elite_fitness: Vec<f32> = ranked[..self.num_elites].iter().map(|&i| fitnesses[i]).collect();

        let info = tell_info(fitnesses);

        let mut next_gen = elites.clone();
        // Deterministic: the offspring-fill loop draws from a key derived
        // from the best fitness observed, keeping `tell` a pure function of
        // `(state, fitnesses)` — no hidden global RNG (§5).
        let mut rng = Key::from_seed(info.best_fitness.to_bits() as u64).into_rng();
        while next_gen.len() < self.pop.len() {
            let parent_ix = Self::tournament_select(&elites, &mut rng, &elite_fitness);
            let child_key = Key::from_seed(rng.gen::<u64>());
            next_gen.push(mutate(&elites[parent_ix], &self.mutation_cfg, child_key));
        }

        self.pop = next_gen;
        Ok(info)
    }

    fn last_population(&self) -> &[PolicyParams] {
        &self.pop
    }

    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        check_pop_size(indices.len(), replacements.len(), "Ga::overwrite_population")?;
        for (&ix, repl) in indices.iter().zip(replacements) {
            self.pop[ix] = repl.clone();
        }
        Ok(())
    }
}
