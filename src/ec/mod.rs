/// MLP mutation operator (§4.5).
pub mod mutation;
/// MLP crossover operator (§4.5).
pub mod crossover;
/// Stateful exponential schedules for OpenES/VanillaESMod.
pub mod schedule;

pub mod cem;
pub mod erlga;
pub mod ga;
pub mod openes;
pub mod vanilla_es_mod;

pub use cem::Cem;
pub use erlga::ErlGa;
pub use ga::Ga;
pub use mutation::MutationConfig;
pub use openes::OpenEs;
pub use schedule::ExponentialSchedule;
pub use vanilla_es_mod::VanillaEsMod;

use crate::error::{EngineError, Result};
use crate::net::PolicyParams;
use crate::rng::Key;

/// Summary returned by every `tell`/`tell_external` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TellInfo {
    pub best_fitness: f32,
    pub mean_fitness: f32,
}

pub(crate) fn tell_info(fitnesses: &[f32]) -> TellInfo {
    let best_fitness = fitnesses.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mean_fitness = fitnesses.iter().sum::<f32>() / fitnesses.len() as f32;
    TellInfo {
        best_fitness,
        mean_fitness,
    }
}

/// Uniform ask/tell contract every EC optimizer variant implements (§4.5,
/// §9 "Polymorphism across optimizer variants": a single dispatch surface
/// rather than a base-class hierarchy).
pub trait EcOptimizer {
    fn pop_size(&self) -> usize;

    /// Emit exactly `pop_size` candidates; mutates internal state to record
    /// what was sampled.
    fn ask(&mut self, key: Key) -> Vec<PolicyParams>;

    /// Consume `fitnesses[pop_size]` and update the distribution/population.
    fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo>;

    /// The candidates returned by the most recent `ask` (or the initial
    /// population, before the first `ask`). Used by ERL-Origin's direct
    /// population-overwrite injection policy.
    fn last_population(&self) -> &[PolicyParams];

    /// Overwrite specific slots of the last-asked population in place, ahead
    /// of the next `tell`. `indices` and `replacements` must have equal
    /// length.
    fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()>;
}

pub(crate) fn check_pop_size(expected: usize, actual: usize, context: &str) -> Result<()> {
    if expected != actual {
        log::error!("{context}: expected leading dim {expected}, got {actual}");
        return Err(EngineError::ShapeMismatch {
            expected,
            actual,
            context: context.to_string(),
        });
    }
    Ok(())
}
