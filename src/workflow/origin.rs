use crate::ec::TellInfo;
use crate::error::Result;
use crate::net::PolicyParams;

use super::{EcState, InjectionPolicy};

/// ERL-Origin injection (§4.7 step 7): every `rl_injection_interval`
/// iterations, directly overwrite the `num_rl_agents` lowest-fitness
/// population members with the current RL actors, then `tell` as usual.
pub struct Origin;

impl InjectionPolicy for Origin {
    fn inject(
        ec_state: &mut EcState,
        rl_actor_params: &[PolicyParams],
        ec_fitnesses: &[f32],
        _rl_fitnesses: &[f32],
        iteration: u64,
        rl_injection_interval: u64,
        _rng_seed: u64,
    ) -> Result<(TellInfo, bool)> {
        let should_inject = rl_injection_interval > 0 && iteration % rl_injection_interval == 0;
        if should_inject {
            let mut ranked: Vec<usize> = (0..ec_fitnesses.len()).collect();
            ranked.sort_by(|&a, &b| ec_fitnesses[a].partial_cmp(&ec_fitnesses[b]).unwrap());
            let worst = &ranked[..rl_actor_params.len().min(ranked.len())];
            ec_state.overwrite_population(worst, rl_actor_params)?;
        }
        let info = ec_state.tell(ec_fitnesses)?;
        Ok((info, should_inject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::mutation::MutationConfig;
    use crate::ec::Ga;
    use crate::net::params::LayerParams;
    use crate::rng::Key;

    fn prototype() -> PolicyParams {
        PolicyParams {
            hidden: vec![LayerParams::zeros(2, 3)],
            head: LayerParams::zeros(3, 1),
        }
    }

    fn mcfg() -> MutationConfig {
        MutationConfig {
            reset_prob: 0.0,
            num_mutation_frac: 0.5,
            super_mut_prob: 0.1,
            super_mut_strength: 1.0,
            mut_strength: 0.1,
            vec_relative_prob: 0.0,
            weight_max_magnitude: 5.0,
        }
    }

    #[test]
    fn injection_only_fires_on_interval_multiples() {
        let mut state = EcState::Ga(Ga::init(prototype(), 6, 2, mcfg(), Key::from_seed(0)));
        let rl_params = vec![prototype().map(|v| v + 1.0)];
        let fitnesses = vec![0.0f32; 6];

        let (_, changed_at_1) = Origin::inject(&mut state, &rl_params, &fitnesses, &[], 1, 3, 0).unwrap();
        assert!(!changed_at_1);
        let (_, changed_at_3) = Origin::inject(&mut state, &rl_params, &fitnesses, &[], 3, 3, 0).unwrap();
        assert!(changed_at_3);
    }

    #[test]
    fn injection_overwrites_lowest_fitness_slot_before_tell() {
        let mut state = EcState::Ga(Ga::init(prototype(), 4, 1, mcfg(), Key::from_seed(1)));
        let rl_params = vec![prototype().map(|_| 9.0)];
        // member 2 has the lowest fitness, so it is the slot the injected
        // actor occupies going into this generation's `tell`.
        let fitnesses = vec![5.0, 4.0, -1.0, 3.0];
        let (info, changed) = Origin::inject(&mut state, &rl_params, &fitnesses, &[], 1, 1, 0).unwrap();
        assert!(changed);
        assert_eq!(info.best_fitness, 5.0);
        assert_eq!(state.pop_size(), 4);
    }
}
