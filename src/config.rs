use serde::{Deserialize, Serialize};

use crate::ec::MutationConfig;
use crate::ec::erlga::ErlGaConfig;
use crate::ec::vanilla_es_mod::MixStrategy;
use crate::error::{EngineError, Result};

fn config_error(message: impl Into<String>) -> Result<()> {
    let message = message.into();
    log::error!("configuration error: {message}");
    Err(EngineError::ConfigurationError(message))
}

/// `(init, decay, min)` for an [`crate::ec::ExponentialSchedule`] (§6 `ec_lr`,
/// `ec_noise_std`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub init: f32,
    pub decay: f32,
    pub min: f32,
}

impl ScheduleConfig {
    pub fn into_schedule(self) -> crate::ec::ExponentialSchedule {
        crate::ec::ExponentialSchedule::new(self.init, self.decay, self.min)
    }
}

/// Which EC optimizer variant a [`PopulationConfig`] selects (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcVariant {
    Ga,
    ErlGa,
    Cem,
    OpenEs,
    VanillaEsMod,
}

/// EC population knobs (§6 `pop_size`, `num_elites`, mutation/crossover/schedule
/// knobs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub variant: EcVariant,
    pub pop_size: usize,
    pub num_elites: usize,
    pub mutation: MutationConfig,
    pub crossover: ErlGaConfig,
    pub cem_init_variance: f32,
    pub cem_variance_eps: f32,
    pub openes_sigma: ScheduleConfig,
    pub openes_alpha: ScheduleConfig,
    pub mirror_sampling: bool,
    pub vanilla_es_sigma: ScheduleConfig,
    pub mix_strategy: MixStrategy,
}

/// RL-side knobs (§6 `num_rl_agents`, TD3 params, injection cadence).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Td3Hyperparams {
    pub num_rl_agents: usize,
    pub tau: f32,
    pub discount: f32,
    pub actor_update_interval: usize,
    pub policy_noise: f32,
    pub clip_policy_noise: f32,
    pub actor_lr: f32,
    pub critic_lr: f32,
}

/// Rollout/buffer knobs (§6 `num_envs`, `episodes_for_fitness`, buffer sizing).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RolloutConfig {
    pub num_envs: usize,
    pub episodes_for_fitness: usize,
    pub rollout_episodes: usize,
    pub max_episode_steps: u32,
    pub exploration_epsilon: f32,
    pub replay_buffer_capacity: usize,
    pub batch_size: usize,
    pub min_sample_timesteps: usize,
}

/// Training-schedule/budget knobs (§6 warm-up, injection, budget, eval cadence).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScheduleKnobs {
    pub warmup_iters: usize,
    pub random_timesteps: usize,
    pub rl_injection_interval: usize,
    pub updates_per_iter: Option<usize>,
    pub rl_updates_frac_per_iter: Option<f32>,
    pub num_iters: usize,
    pub eval_interval: usize,
    pub eval_episodes: usize,
    pub save_replay_buffer: bool,
}

/// Top-level configuration surface (§6). Groups the flat options table into
/// sub-structs mirroring its natural groupings, the way `DQNAgentConfig`
/// groups the teacher's options, but split across several nested structs
/// since this crate's surface spans population/rollout/RL/schedule concerns
/// the teacher's single-algorithm config never had to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub population: PopulationConfig,
    pub td3: Td3Hyperparams,
    pub rollout: RolloutConfig,
    pub schedule: ScheduleKnobs,
}

impl WorkflowConfig {
    /// Validate every invariant named in §7 plus those implied by §3/§4.
    pub fn validate(&self) -> Result<()> {
        let pop = &self.population;
        if pop.num_elites > pop.pop_size {
            return config_error(format!(
                "num_elites ({}) must not exceed pop_size ({})",
                pop.num_elites, pop.pop_size
            ));
        }
        if matches!(pop.variant, EcVariant::ErlGa) && pop.num_elites < self.td3.num_rl_agents {
            return config_error(format!(
                "ERLGA requires num_elites ({}) >= num_rl_agents ({})",
                pop.num_elites, self.td3.num_rl_agents
            ));
        }
        if pop.mirror_sampling && pop.pop_size % 2 != 0 {
            return config_error(format!("mirror_sampling requires an even pop_size, got {}", pop.pop_size));
        }
        if self.rollout.num_envs == 0 {
            return config_error("num_envs must be > 0");
        }
        if self.rollout.batch_size == 0 {
            return config_error("batch_size must be > 0");
        }
        if self.rollout.replay_buffer_capacity < self.rollout.batch_size {
            return config_error("replay_buffer_capacity must be >= batch_size");
        }
        if self.td3.num_rl_agents == 0 {
            return config_error("num_rl_agents must be > 0");
        }
        if self.schedule.num_iters == 0 {
            return config_error("num_iters must be > 0");
        }
        if let Some(frac) = self.schedule.rl_updates_frac_per_iter {
            if !(0.0..=1.0).contains(&frac) {
                return config_error(format!("rl_updates_frac_per_iter must be in [0,1], got {frac}"));
            }
        }
        log::info!(
            "workflow config validated: pop_size={} num_rl_agents={} num_envs={}",
            pop.pop_size,
            self.td3.num_rl_agents,
            self.rollout.num_envs
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::erlga::ErlGaConfig;

    fn base() -> WorkflowConfig {
        WorkflowConfig {
            population: PopulationConfig {
                variant: EcVariant::Ga,
                pop_size: 16,
                num_elites: 4,
                mutation: MutationConfig {
                    reset_prob: 0.01,
                    num_mutation_frac: 0.1,
                    super_mut_prob: 0.05,
                    super_mut_strength: 1.0,
                    mut_strength: 0.1,
                    vec_relative_prob: 0.5,
                    weight_max_magnitude: 5.0,
                },
                crossover: ErlGaConfig {
                    num_crossover_frac: 0.5,
                    enable_crossover: true,
                },
                cem_init_variance: 1.0,
                cem_variance_eps: 1e-3,
                openes_sigma: ScheduleConfig { init: 0.1, decay: 0.999, min: 0.01 },
                openes_alpha: ScheduleConfig { init: 0.05, decay: 0.999, min: 0.005 },
                mirror_sampling: true,
                vanilla_es_sigma: ScheduleConfig { init: 0.1, decay: 0.999, min: 0.01 },
                mix_strategy: MixStrategy::Append,
            },
            td3: Td3Hyperparams {
                num_rl_agents: 2,
                tau: 0.005,
                discount: 0.99,
                actor_update_interval: 2,
                policy_noise: 0.2,
                clip_policy_noise: 0.5,
                actor_lr: 1e-3,
                critic_lr: 1e-3,
            },
            rollout: RolloutConfig {
                num_envs: 4,
                episodes_for_fitness: 1,
                rollout_episodes: 1,
                max_episode_steps: 200,
                exploration_epsilon: 0.1,
                replay_buffer_capacity: 100_000,
                batch_size: 256,
                min_sample_timesteps: 1000,
            },
            schedule: ScheduleKnobs {
                warmup_iters: 5,
                random_timesteps: 1000,
                rl_injection_interval: 10,
                updates_per_iter: Some(1),
                rl_updates_frac_per_iter: None,
                num_iters: 100,
                eval_interval: 10,
                eval_episodes: 5,
                save_replay_buffer: false,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn num_elites_over_pop_size_is_rejected() {
        let mut cfg = base();
        cfg.population.num_elites = 100;
        assert!(matches!(cfg.validate(), Err(EngineError::ConfigurationError(_))));
    }

    #[test]
    fn odd_pop_size_with_mirror_sampling_is_rejected() {
        let mut cfg = base();
        cfg.population.pop_size = 15;
        cfg.population.mirror_sampling = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn erlga_requires_enough_elites_for_rl_agents() {
        let mut cfg = base();
        cfg.population.variant = EcVariant::ErlGa;
        cfg.population.num_elites = 1;
        cfg.td3.num_rl_agents = 3;
        assert!(cfg.validate().is_err());
    }
}
