/// Toy vectorized environments used by the test suite (§ "Test tooling").
#[cfg(any(test, feature = "toy-envs"))]
pub mod toy;

use crate::rng::Key;

/// A bounded real box, `[low, high]^A` (§6 "Environment contract").
#[derive(Debug, Clone, PartialEq)]
pub struct Box {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl Box {
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len());
        Self { low, high }
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn clip(&self, values: &[f32]) -> Vec<f32> {
        values
            .iter()
            .zip(&self.low)
            .zip(&self.high)
            .map(|((&v, &lo), &hi)| v.clamp(lo, hi))
            .collect()
    }
}

/// Autoreset discipline selectable at [`EnvBank`] construction (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autoreset {
    /// Once `done`, further steps are no-ops returning the same terminal
    /// state. Required for episodic fitness estimation.
    Disabled,
    /// Reset with fresh randomness on the step after `done`.
    Normal,
    /// Reset to the deterministic state captured at the first `reset`, on
    /// the step after `done`. No reset randomness at episode boundaries.
    Fast,
}

/// One parallel env's single-step MDP contract (§6). `EnvBank` vectorizes
/// this over `num_envs` copies and layers the autoreset discipline on top.
pub trait Env {
    /// Observation dimension.
    fn obs_dim(&self) -> usize;
    fn action_space(&self) -> &Box;

    /// Reset to a fresh initial state using `key` for any stochasticity.
    fn reset(&mut self, key: Key) -> Vec<f32>;

    /// Step once. Returns `(obs, reward, terminated, truncated)`.
    /// `terminated` is a natural episode end; `truncated` is a time-limit
    /// hit. The two never coincide as `true` simultaneously — see
    /// `EnvBank::step`, which enforces that rule at the bank level.
    fn step(&mut self, action: &[f32]) -> (Vec<f32>, f32, bool, bool);
}

/// Batched state returned by [`EnvBank::reset`]/[`EnvBank::step`] (§3
/// `Trajectory`'s per-step fields, here un-stacked over time).
#[derive(Debug, Clone)]
pub struct EnvState {
    pub obs: Vec<Vec<f32>>,
    pub reward: Vec<f32>,
    pub done: Vec<bool>,
    pub termination: Vec<bool>,
    pub truncation: Vec<bool>,
    pub steps: Vec<u32>,
    pub ori_obs: Vec<Vec<f32>>,
    pub episode_return: Vec<f32>,
}

/// Vectorized env bank (C2): `num_envs` independent copies of `E`, stepped
/// together, with one autoreset discipline applied uniformly.
pub struct EnvBank<E: Env> {
    envs: Vec<E>,
    autoreset: Autoreset,
    max_episode_steps: u32,
    steps: Vec<u32>,
    episode_return: Vec<f32>,
    fast_reset_state: Vec<Option<Vec<f32>>>,
    discount: f32,
}

impl<E: Env> EnvBank<E> {
    pub fn new(envs: Vec<E>, autoreset: Autoreset, max_episode_steps: u32, discount: f32) -> Self {
        let n = envs.len();
        Self {
            envs,
            autoreset,
            max_episode_steps,
            steps: vec![0; n],
            episode_return: vec![0.0; n],
            fast_reset_state: vec![None; n],
            discount,
        }
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn obs_dim(&self) -> usize {
        self.envs[0].obs_dim()
    }

    pub fn action_space(&self) -> &Box {
        self.envs[0].action_space()
    }

    pub fn max_episode_steps(&self) -> u32 {
        self.max_episode_steps
    }

    /// `reset(key)`: reset every env bank member with an independently split
    /// key and clear episode bookkeeping.
    pub fn reset(&mut self, key: Key) -> EnvState {
        let keys = key.split_n(self.envs.len());
        let mut obs = Vec::with_capacity(self.envs.len());
        for (env, k) in self.envs.iter_mut().zip(keys) {
            let o = env.reset(k);
            obs.push(o);
        }
        self.steps = vec![0; self.envs.len()];
        self.episode_return = vec![0.0; self.envs.len()];
        if self.autoreset == Autoreset::Fast {
            self.fast_reset_state = obs.iter().cloned().map(Some).collect();
        }
        EnvState {
            obs: obs.clone(),
            reward: vec![0.0; self.envs.len()],
            done: vec![false; self.envs.len()],
            termination: vec![false; self.envs.len()],
            truncation: vec![false; self.envs.len()],
            steps: self.steps.clone(),
            ori_obs: obs,
            episode_return: self.episode_return.clone(),
        }
    }

    /// `step(actions)`: step every env bank member and apply the bank's
    /// autoreset discipline. `prev_done` is the `done` flag from the
    /// previous call (or all-`false` for the first step after `reset`).
    pub fn step(&mut self, actions: &[Vec<f32>], prev_done: &[bool]) -> EnvState {
        let n = self.envs.len();
        assert_eq!(actions.len(), n);
        assert_eq!(prev_done.len(), n);

        let mut obs = Vec::with_capacity(n);
        let mut reward = Vec::with_capacity(n);
        let mut termination = Vec::with_capacity(n);
        let mut truncation = Vec::with_capacity(n);
        let mut ori_obs = Vec::with_capacity(n);

        for i in 0..n {
            if prev_done[i] && self.autoreset == Autoreset::Disabled {
                // no-op: return the same terminal state again.
                let zero = vec![0.0; self.envs[i].obs_dim()];
                obs.push(zero.clone());
                reward.push(0.0);
                termination.push(false);
                truncation.push(false);
                ori_obs.push(zero);
                continue;
            }

            if prev_done[i] && self.autoreset != Autoreset::Disabled {
                // step after done: perform the reset in place of a real step.
                let next_obs = match self.autoreset {
                    Autoreset::Fast => self
                        .fast_reset_state
                        .get(i)
                        .cloned()
                        .flatten()
                        .unwrap_or_else(|| self.envs[i].reset(Key::from_seed(i as u64))),
                    Autoreset::Normal => self.envs[i].reset(Key::from_seed(
                        (i as u64)
                            .wrapping_add(self.steps[i] as u64)
                            .wrapping_mul(2654435761),
                    )),
                    Autoreset::Disabled => unreachable!(),
                };
                self.steps[i] = 0;
                self.episode_return[i] = 0.0;
                ori_obs.push(next_obs.clone());
                obs.push(next_obs);
                reward.push(0.0);
                termination.push(false);
                truncation.push(false);
                continue;
            }

            let (o, r, term, trunc) = self.envs[i].step(&actions[i]);
            self.steps[i] += 1;
            self.episode_return[i] += r * self.discount.powi(self.steps[i] as i32 - 1);
            let timed_out = self.steps[i] >= self.max_episode_steps;
            // truncation is zero when termination and the time limit coincide (§4.2).
            let truncated = (trunc || timed_out) && !term;
            ori_obs.push(o.clone());
            obs.push(o);
            reward.push(r);
            termination.push(term);
            truncation.push(truncated);
        }

        let done: Vec<bool> = termination
            .iter()
            .zip(&truncation)
            .map(|(&t, &u)| t || u)
            .collect();

        EnvState {
            obs,
            reward,
            done,
            termination,
            truncation,
            steps: self.steps.clone(),
            ori_obs,
            episode_return: self.episode_return.clone(),
        }
    }
}
