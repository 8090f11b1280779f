use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::schedule::ExponentialSchedule;
use super::{check_pop_size, tell_info, EcOptimizer, TellInfo};
use crate::error::{EngineError, Result};
use crate::net::PolicyParams;
use crate::rng::Key;

/// How external (RL-supplied) elites are blended into the next generation
/// (§4.5 "VanillaESMod", §6 `mix_strategy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixStrategy {
    /// Overwrite the lowest-ranked internal elite with a better-ranked
    /// external candidate.
    Replace,
    /// Simply enlarge the elite pool for the mean update.
    Append,
}

/// Vanilla (non-natural) ES with an external slot. Unlike [`super::OpenEs`],
/// the mean update is a direct elite recombination (mean of the top
/// `num_elites` candidate values), not a natural-gradient step.
#[derive(Debug, Clone)]
pub struct VanillaEsMod {
    mean: PolicyParams,
    sigma: ExponentialSchedule,
    pop_size: usize,
    num_elites: usize,
    mix_strategy: MixStrategy,
    last_noise: Vec<PolicyParams>,
    last_pop: Vec<PolicyParams>,
}

impl VanillaEsMod {
    pub fn init(prototype: PolicyParams, pop_size: usize, num_elites: usize, sigma: ExponentialSchedule, mix_strategy: MixStrategy) -> Self {
        let last_pop = vec![prototype.clone(); pop_size];
        let last_noise = vec![prototype.map(|_| 0.0); pop_size];
        Self {
            mean: prototype,
            sigma,
            pop_size,
            num_elites,
            mix_strategy,
            last_noise,
            last_pop,
        }
    }

    /// The current mean candidate, evaluated deterministically by C8 for
    /// ES-style variants (§4.7 "Evaluation").
    pub fn mean(&self) -> &PolicyParams {
        &self.mean
    }

    /// `tell_external`: fold the external (RL actor) candidates into the
    /// elite recombination per `mix_strategy`. Called with an empty
    /// `external_params` this degenerates into an ordinary `tell`.
    pub fn tell_external(&mut self, external_params: &[PolicyParams], fitnesses: &[f32]) -> Result<TellInfo> {
        let combined_size = self.pop_size + external_params.len();
        if fitnesses.len() != combined_size {
            return Err(EngineError::ShapeMismatch {
                expected: combined_size,
                actual: fitnesses.len(),
                context: "VanillaEsMod::tell_external".into(),
            });
        }

        let mut combined_candidates: Vec<PolicyParams> = self.last_pop.clone();
        combined_candidates.extend(external_params.iter().cloned());
        let internal_n = self.last_pop.len();

        let mut ranked: Vec<usize> = (0..fitnesses.len()).collect();
        ranked.sort_by(|&a, &b| fitnesses[b].partial_cmp(&fitnesses[a]).unwrap());

        let elite_indices: Vec<usize> = match self.mix_strategy {
            MixStrategy::Append => ranked.iter().take(self.num_elites).cloned().collect(),
            MixStrategy::Replace => {
                let mut internal_elites: Vec<usize> = ranked
                    .iter()
                    .filter(|&&i| i < internal_n)
                    .take(self.num_elites)
                    .cloned()
                    .collect();
                for &i in ranked.iter() {
                    if i >= internal_n && fitnesses[i] > worst_fitness(&internal_elites, fitnesses) {
                        if let Some(worst_pos) = worst_position(&internal_elites, fitnesses) {
                            internal_elites[worst_pos] = i;
                        }
                    }
                }
                internal_elites
            }
        };

        let n = elite_indices.len() as f32;
        let mut new_mean = combined_candidates[elite_indices[0]].map(|_| 0.0);
        for &ix in &elite_indices {
            new_mean = new_mean.zip_map(&combined_candidates[ix], |acc, v| acc + v / n)?;
        }

        self.mean = new_mean;
        self.sigma.advance();
        Ok(tell_info(fitnesses))
    }
}

fn worst_fitness(indices: &[usize], fitnesses: &[f32]) -> f32 {
    indices.iter().map(|&i| fitnesses[i]).fold(f32::INFINITY, f32::min)
}

fn worst_position(indices: &[usize], fitnesses: &[f32]) -> Option<usize> {
    indices
        .iter()
        .enumerate()
        .min_by(|(_, &a), (_, &b)| fitnesses[a].partial_cmp(&fitnesses[b]).unwrap())
        .map(|(pos, _)| pos)
}

impl EcOptimizer for VanillaEsMod {
    fn pop_size(&self) -> usize {
        self.pop_size
    }

    fn ask(&mut self, key: Key) -> Vec<PolicyParams> {
        let sigma = self.sigma.current();
        let keys = key.split_n(self.pop_size);
        self.last_noise = keys
            .into_iter()
            .map(|k| {
                let mut rng = k.into_rng();
                self.mean.map(|_| Normal::new(0.0, 1.0).unwrap().sample(&mut rng))
            })
            .collect();
        self.last_pop = self
            .last_noise
            .iter()
            .map(|eps| self.mean.zip_map(eps, |m, e| m + sigma * e).expect("shapes match"))
            .collect();
        self.last_pop.clone()
    }

    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        check_pop_size(self.pop_size, fitnesses.len(), "VanillaEsMod::tell")?;
        self.tell_external(&[], fitnesses)
    }

    fn last_population(&self) -> &[PolicyParams] {
        &self.last_pop
    }

    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        check_pop_size(indices.len(), replacements.len(), "VanillaEsMod::overwrite_population")?;
        for (&ix, repl) in indices.iter().zip(replacements) {
            self.last_pop[ix] = repl.clone();
        }
        Ok(())
    }
}
