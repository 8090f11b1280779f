use burn::tensor::backend::AutodiffBackend;

use crate::collector::{ActorPolicy, Collector};
use crate::env::{Env, EnvBank};
use crate::net::ParamsPolicy;
use crate::obs_norm::RunningMeanStd;
use crate::rng::Key;
use crate::td3::Td3Agent;

/// One evaluation pass's results (§4.7 "Evaluation", §9 "Evaluation cadence
/// detail"): deterministic rollouts that never touch the replay buffer or
/// optimizer state.
#[derive(Debug, Clone)]
pub struct EvalReport {
    pub rl_episode_returns: Vec<f32>,
    pub rl_episode_lengths: Vec<f32>,
    /// Only populated for ES-style variants, which additionally evaluate the
    /// EC mean candidate (`ec_opt_state.mean`) as a second deterministic
    /// rollout.
    pub pop_center_episode_return: Option<f32>,
    pub pop_center_episode_length: Option<f32>,
}

/// C8: drives deterministic rollouts for reporting only.
pub struct Evaluator;

impl Evaluator {
    /// Evaluate every RL actor deterministically (ERL-Origin, ERL-GA).
    pub fn evaluate_rl_agents<B: AutodiffBackend, E: Env>(
        agents: &[Td3Agent<B>],
        env_bank: &mut EnvBank<E>,
        eval_episodes: usize,
        key: Key,
        obs_stats: &RunningMeanStd,
    ) -> EvalReport {
        let keys = key.split_n(agents.len().max(1));
        let mut returns = Vec::with_capacity(agents.len());
        let mut lengths = Vec::with_capacity(agents.len());
        for (agent, k) in agents.iter().zip(keys) {
            let (metric, _transitions) = Collector::evaluate(agent, env_bank, eval_episodes, k, None, Some(obs_stats));
            returns.push(mean(&metric.episode_returns));
            lengths.push(mean(&metric.episode_lengths));
        }
        EvalReport {
            rl_episode_returns: returns,
            rl_episode_lengths: lengths,
            pop_center_episode_return: None,
            pop_center_episode_length: None,
        }
    }

    /// Evaluate the RL actors *and* the EC mean candidate (ERL-ES), reporting
    /// `pop_center_*` metrics alongside the RL ones.
    pub fn evaluate_with_pop_center<B: AutodiffBackend, E: Env>(
        agents: &[Td3Agent<B>],
        ec_mean: &crate::net::PolicyParams,
        action_space: &crate::env::Box,
        env_bank: &mut EnvBank<E>,
        eval_episodes: usize,
        key: Key,
        obs_stats: &RunningMeanStd,
    ) -> EvalReport {
        let (rl_key, center_key) = key.split();
        let mut report = Self::evaluate_rl_agents(agents, env_bank, eval_episodes, rl_key, obs_stats);
        let policy = ParamsPolicy { params: ec_mean, action_space };
        let (metric, _transitions) = Collector::evaluate(&policy, env_bank, eval_episodes, center_key, None, Some(obs_stats));
        report.pop_center_episode_return = Some(mean(&metric.episode_returns));
        report.pop_center_episode_length = Some(mean(&metric.episode_lengths));
        report
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::toy::Reach;
    use crate::env::Autoreset;
    use crate::td3::Td3Config;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;

    #[test]
    fn evaluate_rl_agents_reports_one_row_per_agent() {
        let device = Default::default();
        let action_space = crate::env::Box::new(vec![-1.0], vec![1.0]);
        let config = Td3Config {
            gamma: 0.99,
            tau: 0.01,
            policy_noise: 0.1,
            noise_clip: 0.3,
            actor_update_interval: 2,
        };
        let agents: Vec<Td3Agent<TestBackend>> = (0..2)
            .map(|_| Td3Agent::new(2, 1, &[8], action_space.clone(), config.clone(), device))
            .collect();
        let envs: Vec<Reach> = (0..2).map(|_| Reach::new(vec![0.0, 0.0], 1.0, 0.05)).collect();
        let mut bank = EnvBank::new(envs, Autoreset::Disabled, 10, 0.99);
        let report = Evaluator::evaluate_rl_agents(&agents, &mut bank, 1, Key::from_seed(0), &RunningMeanStd::new(2));
        assert_eq!(report.rl_episode_returns.len(), 2);
        assert!(report.pop_center_episode_return.is_none());
    }
}
