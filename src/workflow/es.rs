use crate::ec::TellInfo;
use crate::error::{EngineError, Result};
use crate::net::PolicyParams;

use super::{EcState, InjectionPolicy};

/// ERL-ES injection (§4.7 step 7): every iteration (not just on a cadence),
/// append `(rl_actor − mean)` to the noise buffer and extend the fitness
/// vector, then `tell_external` updates the mean over the enlarged set.
pub struct Es;

impl InjectionPolicy for Es {
    fn inject(
        ec_state: &mut EcState,
        rl_actor_params: &[PolicyParams],
        ec_fitnesses: &[f32],
        rl_fitnesses: &[f32],
        _iteration: u64,
        _rl_injection_interval: u64,
        _rng_seed: u64,
    ) -> Result<(TellInfo, bool)> {
        let combined: Vec<f32> = ec_fitnesses.iter().copied().chain(rl_fitnesses.iter().copied()).collect();
        let info = match ec_state {
            EcState::VanillaEsMod(es) => es.tell_external(rl_actor_params, &combined)?,
            _ => {
                return Err(EngineError::ConfigurationError(
                    "ERL-ES injection requires a VanillaEsMod optimizer".into(),
                ))
            }
        };
        Ok((info, !rl_actor_params.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::schedule::ExponentialSchedule;
    use crate::ec::vanilla_es_mod::MixStrategy;
    use crate::ec::VanillaEsMod;
    use crate::net::params::LayerParams;
    use crate::rng::Key;

    fn prototype() -> PolicyParams {
        PolicyParams {
            hidden: vec![LayerParams::zeros(2, 3)],
            head: LayerParams::zeros(3, 1),
        }
    }

    #[test]
    fn every_iteration_extends_the_fitness_vector_with_rl_actors() {
        let sched = ExponentialSchedule::new(0.1, 0.99, 0.01);
        let mut state = EcState::VanillaEsMod(VanillaEsMod::init(prototype(), 6, 2, sched, MixStrategy::Append));
        state.ask(Key::from_seed(0));
        let rl_params = vec![prototype().map(|_| 1.0)];
        let (_, changed) = Es::inject(&mut state, &rl_params, &vec![0.0; 6], &[5.0], 1, 0, 0).unwrap();
        assert!(changed);
    }
}
