use crate::env::{Env, EnvBank};
use crate::memory::Transition;
use crate::obs_norm::{RunningMeanStd, NORMALIZE_EPS};
use crate::rng::Key;

/// An actor capable of producing actions for a single observation, without
/// committing to a particular network framework — the EC side evaluates
/// plain [`crate::net::PolicyParams`] forward passes, the RL side evaluates
/// live `burn` `Mlp<B>` modules. Both implement this trait so [`Collector`]
/// need not know which.
pub trait ActorPolicy {
    /// Deterministic action (`evaluate_actions` in the source material).
    fn act(&self, obs: &[f32]) -> Vec<f32>;

    /// Stochastic action with exploration noise added
    /// (`compute_actions`/"fitness with exploration"). `epsilon` scales a
    /// zero-mean Gaussian perturbation.
    fn act_exploratory(&self, obs: &[f32], key: Key, epsilon: f32) -> Vec<f32> {
        use rand_distr::{Distribution, Normal};
        let mut rng = key.into_rng();
        let base = self.act(obs);
        if epsilon <= 0.0 {
            return base;
        }
        let normal = Normal::new(0.0, epsilon).expect("epsilon must be finite and >= 0");
        base.into_iter().map(|a| a + normal.sample(&mut rng)).collect()
    }
}

/// Per-env episode metrics from one rollout (§3 `EpisodeMetric`, here for a
/// single policy rather than a whole population — `workflow` loops this over
/// the population/RL-agent axis, following the same per-individual idiom
/// `td3`'s `Vec<TD3Agent<B>>` already uses in place of a true `vmap`).
#[derive(Debug, Clone)]
pub struct EpisodeMetric {
    /// Observed episode length per env; averaged across episodes completed
    /// within this rollout's horizon (or the in-progress length if none
    /// completed).
    pub episode_lengths: Vec<f32>,
    /// Undiscounted (or config-discounted) return per env, same averaging.
    pub episode_returns: Vec<f32>,
}

/// C4: drives one policy through an env bank for a bounded number of
/// episodes per env, returning episode metrics and the valid (non-padding)
/// transitions collected along the way.
pub struct Collector;

impl Collector {
    /// `evaluate(policy, env_bank, num_episodes, key, exploration_epsilon, obs_stats)`.
    ///
    /// Runs the bank for `num_episodes * max_episode_steps` steps (§4.4).
    /// Every step taken while an env was *not* already flagged `done` is a
    /// genuine transition and is kept; autoreset "reset steps" and
    /// `Disabled`-discipline no-ops are dropped, which is exactly strategy
    /// (a) of §4.3 (only valid prefixes ever reach the caller — no masking
    /// pass is needed downstream).
    ///
    /// `obs_stats`, when given, normalizes the observation handed to the
    /// policy for action selection (§9 "Running statistics": the normalizer
    /// is shared and read by every population member, EC and RL alike, even
    /// though only RL-side transitions ever update it). The raw observation
    /// is still what lands in the returned [`Transition`]s, so the buffer
    /// always holds un-normalized data and later consumers normalize with
    /// whatever stats are current at read time.
    pub fn evaluate<E: Env, P: ActorPolicy>(
        policy: &P,
        env_bank: &mut EnvBank<E>,
        num_episodes: usize,
        key: Key,
        exploration_epsilon: Option<f32>,
        obs_stats: Option<&RunningMeanStd>,
    ) -> (EpisodeMetric, Vec<Transition>) {
        let n = env_bank.num_envs();
        let horizon = num_episodes as u32 * env_bank.max_episode_steps();

        let (reset_key, step_key) = key.split();
        let mut state = env_bank.reset(reset_key);
        let mut prev_done = vec![false; n];
        let mut completed_lengths: Vec<Vec<f32>> = vec![Vec::new(); n];
        let mut completed_returns: Vec<Vec<f32>> = vec![Vec::new(); n];
        let mut just_completed = vec![false; n];
        let mut transitions = Vec::new();

        let step_keys = step_key.split_n(horizon as usize);
        for step_key in step_keys {
            let env_keys = step_key.split_n(n);
            let actions: Vec<Vec<f32>> = state
                .obs
                .iter()
                .zip(env_keys)
                .map(|(obs, k)| {
                    let normed;
                    let obs = match obs_stats {
                        Some(stats) => {
                            normed = stats.normalize(obs, NORMALIZE_EPS);
                            &normed
                        }
                        None => obs,
                    };
                    match exploration_epsilon {
                        Some(eps) if eps > 0.0 => policy.act_exploratory(obs, k, eps),
                        _ => policy.act(obs),
                    }
                })
                .collect();
            let pre_obs = state.obs.clone();

            let next_state = env_bank.step(&actions, &prev_done);

            for i in 0..n {
                if !prev_done[i] {
                    transitions.push(Transition {
                        obs: pre_obs[i].clone(),
                        action: actions[i].clone(),
                        reward: next_state.reward[i],
                        next_obs: next_state.obs[i].clone(),
                        termination: next_state.termination[i],
                    });
                    if next_state.done[i] && !just_completed[i] {
                        completed_lengths[i].push(next_state.steps[i] as f32);
                        completed_returns[i].push(next_state.episode_return[i]);
                        just_completed[i] = true;
                    }
                } else {
                    // a step taken while already done is either a no-op
                    // (Disabled) or an autoreset reset-step; either way it
                    // allows the *next* episode at this env to be counted.
                    just_completed[i] = false;
                }
            }

            prev_done = next_state.done.clone();
            state = next_state;
        }

        let episode_lengths = (0..n)
            .map(|i| mean_or(&completed_lengths[i], state.steps[i] as f32))
            .collect();
        let episode_returns = (0..n)
            .map(|i| mean_or(&completed_returns[i], state.episode_return[i]))
            .collect();

        (
            EpisodeMetric {
                episode_lengths,
                episode_returns,
            },
            transitions,
        )
    }
}

fn mean_or(values: &[f32], fallback: f32) -> f32 {
    if values.is_empty() {
        fallback
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
