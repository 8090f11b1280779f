use crate::ec::TellInfo;
use crate::error::{EngineError, Result};
use crate::net::PolicyParams;

use super::{EcState, InjectionPolicy};

/// ERL-GA injection (§4.7 step 7): on injection iterations, `tell_external`
/// ranks `pop ∪ rl_actors` together so RL actors can displace EC members;
/// otherwise an ordinary `tell`.
pub struct Ga;

impl InjectionPolicy for Ga {
    fn inject(
        ec_state: &mut EcState,
        rl_actor_params: &[PolicyParams],
        ec_fitnesses: &[f32],
        rl_fitnesses: &[f32],
        iteration: u64,
        rl_injection_interval: u64,
        _rng_seed: u64,
    ) -> Result<(TellInfo, bool)> {
        let should_inject = rl_injection_interval > 0 && iteration % rl_injection_interval == 0;
        if !should_inject {
            return Ok((ec_state.tell(ec_fitnesses)?, false));
        }
        let EcState::ErlGa(erlga) = ec_state else {
            return Err(EngineError::ConfigurationError("ERL-GA injection requires an ErlGa optimizer".into()));
        };
        let combined: Vec<f32> = ec_fitnesses.iter().copied().chain(rl_fitnesses.iter().copied()).collect();
        let info = erlga.tell_external(rl_actor_params, &combined)?;
        Ok((info, true))
    }
}
