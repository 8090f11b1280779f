use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Data, Tensor};

use crate::collector::ActorPolicy;
use crate::env::Box as ActionBox;
use crate::error::{EngineError, Result};
use crate::memory::TransitionBatch;
use crate::net::{Mlp, PolicyParams};
use crate::obs_norm::{RunningMeanStd, NORMALIZE_EPS};
use crate::rng::Key;

/// Hyperparameters for one [`Td3Agent`] (§4.6 "TD3 gradient core").
#[derive(Debug, Clone)]
pub struct Td3Config {
    pub gamma: f32,
    pub tau: f32,
    pub policy_noise: f32,
    pub noise_clip: f32,
    pub actor_update_interval: usize,
}

/// One TD3 actor/twin-critic triple with their Polyak targets. The ERL
/// workflow holds a `Vec<Td3Agent<B>>`, one per RL actor, in place of the
/// original's vmapped multi-agent tensor (see `DESIGN.md`).
///
/// Optimizers are not owned here, mirroring the teacher's `DQNAgent::learn`,
/// which takes `optimizer: &mut impl Optimizer<M, B>` rather than storing
/// one: the workflow driver constructs and owns them so it controls their
/// lifetime across iterations.
pub struct Td3Agent<B: AutodiffBackend> {
    actor: Option<Mlp<B>>,
    actor_target: Option<Mlp<B>>,
    critic1: Option<Mlp<B>>,
    critic1_target: Option<Mlp<B>>,
    critic2: Option<Mlp<B>>,
    critic2_target: Option<Mlp<B>>,
    device: B::Device,
    config: Td3Config,
    action_space: ActionBox,
    updates: usize,
}

/// Losses from one [`Td3Agent::update`] call, folded into `WorkflowMetrics`.
#[derive(Debug, Clone, Copy)]
pub struct Td3UpdateInfo {
    pub critic_loss: f32,
    pub actor_loss: Option<f32>,
}

impl<B: AutodiffBackend> Td3Agent<B> {
    pub fn new(obs_dim: usize, action_dim: usize, hidden_sizes: &[usize], action_space: ActionBox, config: Td3Config, device: B::Device) -> Self {
        let actor_layers: Vec<usize> = std::iter::once(obs_dim).chain(hidden_sizes.iter().copied()).chain(std::iter::once(action_dim)).collect();
        let critic_layers: Vec<usize> = std::iter::once(obs_dim + action_dim)
            .chain(hidden_sizes.iter().copied())
            .chain(std::iter::once(1))
            .collect();

        let actor = Mlp::new(&actor_layers, &device);
        let actor_target = Mlp::new(&actor_layers, &device).load_params(&actor.to_params(), &device);
        let critic1 = Mlp::new(&critic_layers, &device);
        let critic1_target = Mlp::new(&critic_layers, &device).load_params(&critic1.to_params(), &device);
        let critic2 = Mlp::new(&critic_layers, &device);
        let critic2_target = Mlp::new(&critic_layers, &device).load_params(&critic2.to_params(), &device);

        Self {
            actor: Some(actor),
            actor_target: Some(actor_target),
            critic1: Some(critic1),
            critic1_target: Some(critic1_target),
            critic2: Some(critic2),
            critic2_target: Some(critic2_target),
            device,
            config,
            action_space,
            updates: 0,
        }
    }

    /// Deterministic action for a single observation (no exploration noise;
    /// that is the collector's concern, see [`crate::collector::ActorPolicy`]).
    pub fn act(&self, obs: &[f32]) -> Vec<f32> {
        let dim = obs.len();
        let input: Tensor<B, 2> = Tensor::from_data(Data::new(obs.to_vec(), [1, dim].into()), &self.device);
        let out = self
            .actor
            .as_ref()
            .expect("actor present outside update")
            .forward_actor(input, self.action_space.low[0], self.action_space.high[0]);
        out.into_data().value
    }

    pub fn to_actor_params(&self) -> PolicyParams {
        self.actor.as_ref().expect("actor present outside update").to_params()
    }

    fn to_tensor2(rows: &[Vec<f32>], device: &B::Device) -> Tensor<B, 2> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::from_data(Data::new(flat, [rows.len(), cols].into()), device)
    }

    /// One TD3 update (§4.6): twin critics trained against a clipped,
    /// target-smoothed Bellman target every call; the actor and both target
    /// networks are updated only every `actor_update_interval` calls
    /// (delayed policy update, §8 item 7).
    pub fn update<OA, OC>(
        &mut self,
        batch: &TransitionBatch,
        obs_stats: &RunningMeanStd,
        actor_opt: &mut OA,
        critic1_opt: &mut OC,
        critic2_opt: &mut OC,
        actor_lr: f64,
        critic_lr: f64,
        key: Key,
    ) -> Result<Td3UpdateInfo>
    where
        OA: Optimizer<Mlp<B>, B>,
        OC: Optimizer<Mlp<B>, B>,
    {
        let device = self.device.clone();
        let batch_size = batch.reward.len();

        // §9 "Running statistics": the shared normalizer is read here the
        // same way the collector reads it for action selection, so the
        // critic/actor are trained on the same normalized observations they
        // see at rollout time.
        let normed_obs: Vec<Vec<f32>> = batch.obs.iter().map(|o| obs_stats.normalize(o, NORMALIZE_EPS)).collect();
        let normed_next_obs: Vec<Vec<f32>> = batch.next_obs.iter().map(|o| obs_stats.normalize(o, NORMALIZE_EPS)).collect();

        let obs = Self::to_tensor2(&normed_obs, &device);
        let action = Self::to_tensor2(&batch.action, &device);
        let next_obs = Self::to_tensor2(&normed_next_obs, &device);
        let reward: Tensor<B, 2> = Tensor::from_data(Data::new(batch.reward.clone(), [batch_size].into()), &device).unsqueeze_dim(1);
        let non_terminal: Vec<f32> = batch.termination.iter().map(|&t| if t { 0.0 } else { 1.0 }).collect();
        let non_terminal: Tensor<B, 2> = Tensor::from_data(Data::new(non_terminal, [batch_size].into()), &device).unsqueeze_dim(1);

        let actor_target = self.actor_target.take().unwrap();
        let critic1_target = self.critic1_target.take().unwrap();
        let critic2_target = self.critic2_target.take().unwrap();

        let mut rng = key.into_rng();
        let noise_vec: Vec<f32> = {
            use rand_distr::{Distribution, Normal};
            let n = Normal::new(0.0, self.config.policy_noise).unwrap();
            (0..batch_size * action.dims()[1])
                .map(|_| {
                    let v: f32 = n.sample(&mut rng);
                    v.clamp(-self.config.noise_clip, self.config.noise_clip)
                })
                .collect()
        };
        let noise: Tensor<B, 2> = Tensor::from_data(Data::new(noise_vec, [batch_size, action.dims()[1]].into()), &device);

        let next_action = (actor_target.forward_actor(next_obs.clone(), self.action_space.low[0], self.action_space.high[0]) + noise)
            .clamp(self.action_space.low[0], self.action_space.high[0]);

        let next_q1 = critic1_target.forward_critic(Tensor::cat(vec![next_obs.clone(), next_action.clone()], 1));
        let next_q2 = critic2_target.forward_critic(Tensor::cat(vec![next_obs, next_action], 1));
        // elementwise min of the twin critics, via the same `cat`+dim-reduce
        // idiom the teacher uses for `max_dim` in its Bellman target.
        let target_q = Tensor::cat(vec![next_q1, next_q2], 1).min_dim(1).detach();
        let y = reward + non_terminal * target_q * self.config.gamma;
        let y = y.detach();

        self.actor_target = Some(actor_target);

        let critic1 = self.critic1.take().unwrap();
        let q1 = critic1.forward_critic(Tensor::cat(vec![obs.clone(), action.clone()], 1));
        let critic1_loss = MseLoss::new().forward(q1, y.clone(), Reduction::Mean);
        let critic1_loss_value = critic1_loss.clone().into_scalar();
        if !critic1_loss_value.is_finite() {
            log::error!("critic1 loss is non-finite ({critic1_loss_value})");
            return Err(EngineError::NumericFailure("critic1 loss is non-finite".into()));
        }
        let grads = GradientsParams::from_grads(critic1_loss.backward(), &critic1);
        let critic1 = critic1_opt.step(critic_lr, critic1, grads);
        self.critic1 = Some(critic1);

        let critic2 = self.critic2.take().unwrap();
        let q2 = critic2.forward_critic(Tensor::cat(vec![obs.clone(), action], 1));
        let critic2_loss = MseLoss::new().forward(q2, y, Reduction::Mean);
        let critic2_loss_value = critic2_loss.clone().into_scalar();
        if !critic2_loss_value.is_finite() {
            log::error!("critic2 loss is non-finite ({critic2_loss_value})");
            return Err(EngineError::NumericFailure("critic2 loss is non-finite".into()));
        }
        let grads = GradientsParams::from_grads(critic2_loss.backward(), &critic2);
        let critic2 = critic2_opt.step(critic_lr, critic2, grads);
        self.critic2 = Some(critic2);

        self.critic1_target = Some(critic1_target);
        self.critic2_target = Some(critic2_target);

        self.updates += 1;
        let mut actor_loss_value = None;

        if self.updates % self.config.actor_update_interval == 0 {
            let actor = self.actor.take().unwrap();
            let actor_action = actor.forward_actor(obs.clone(), self.action_space.low[0], self.action_space.high[0]);
            let q = self
                .critic1
                .as_ref()
                .unwrap()
                .forward_critic(Tensor::cat(vec![obs, actor_action], 1));
            let actor_loss = q.mean().neg();
            let actor_loss_scalar = actor_loss.clone().into_scalar();
            if !actor_loss_scalar.is_finite() {
                log::error!("actor loss is non-finite ({actor_loss_scalar})");
                self.actor = Some(actor);
                return Err(EngineError::NumericFailure("actor loss is non-finite".into()));
            }
            actor_loss_value = Some(actor_loss_scalar);
            let grads = GradientsParams::from_grads(actor_loss.backward(), &actor);
            let actor = actor_opt.step(actor_lr, actor, grads);

            let tau = self.config.tau;
            self.actor_target = Some(self.actor_target.take().unwrap().soft_update(&actor, tau));
            self.critic1_target = Some(self.critic1_target.take().unwrap().soft_update(self.critic1.as_ref().unwrap(), tau));
            self.critic2_target = Some(self.critic2_target.take().unwrap().soft_update(self.critic2.as_ref().unwrap(), tau));
            self.actor = Some(actor);
        }

        Ok(Td3UpdateInfo {
            critic_loss: critic1_loss_value,
            actor_loss: actor_loss_value,
        })
    }
}

/// Lets a live `Td3Agent` feed straight into [`crate::collector::Collector`]
/// for both the RL rollout and deterministic evaluation, the same way
/// `PolicyParams`/`Mlp<B>` do via `ParamsPolicy`/`NetPolicy`.
impl<B: AutodiffBackend> ActorPolicy for Td3Agent<B> {
    fn act(&self, obs: &[f32]) -> Vec<f32> {
        Td3Agent::act(self, obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ReplayBuffer, Transition};
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamWConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn agent() -> Td3Agent<TestBackend> {
        let device = Default::default();
        let action_space = ActionBox::new(vec![-1.0], vec![1.0]);
        let config = Td3Config {
            gamma: 0.99,
            tau: 0.01,
            policy_noise: 0.2,
            noise_clip: 0.5,
            actor_update_interval: 2,
        };
        Td3Agent::new(3, 1, &[8], action_space, config, device)
    }

    fn filled_batch() -> TransitionBatch {
        let mut buf = ReplayBuffer::new(32);
        let batch: Vec<_> = (0..16)
            .map(|i| Transition {
                obs: vec![i as f32, 0.0, 0.0],
                action: vec![0.1],
                reward: 1.0,
                next_obs: vec![i as f32 + 1.0, 0.0, 0.0],
                termination: i % 7 == 0,
            })
            .collect();
        buf.add(batch, None);
        buf.sample(16, Key::from_seed(0)).unwrap()
    }

    #[test]
    fn update_runs_without_panicking_and_reports_finite_critic_loss() {
        let mut agent = agent();
        let mut actor_opt = AdamWConfig::new().init();
        let mut critic1_opt = AdamWConfig::new().init();
        let mut critic2_opt = AdamWConfig::new().init();
        let batch = filled_batch();
        let info = agent.update(&batch, &RunningMeanStd::new(3), &mut actor_opt, &mut critic1_opt, &mut critic2_opt, 1e-3, 1e-3, Key::from_seed(1)).unwrap();
        assert!(info.critic_loss.is_finite());
    }

    #[test]
    fn actor_only_updates_on_delayed_interval() {
        let mut agent = agent();
        let mut actor_opt = AdamWConfig::new().init();
        let mut critic1_opt = AdamWConfig::new().init();
        let mut critic2_opt = AdamWConfig::new().init();
        let batch = filled_batch();
        let info1 = agent.update(&batch, &RunningMeanStd::new(3), &mut actor_opt, &mut critic1_opt, &mut critic2_opt, 1e-3, 1e-3, Key::from_seed(2)).unwrap();
        assert!(info1.actor_loss.is_none());
        let info2 = agent.update(&batch, &RunningMeanStd::new(3), &mut actor_opt, &mut critic1_opt, &mut critic2_opt, 1e-3, 1e-3, Key::from_seed(3)).unwrap();
        assert!(info2.actor_loss.is_some());
    }

    #[test]
    fn act_returns_action_within_bounds() {
        let agent = agent();
        let action = agent.act(&[0.0, 0.0, 0.0]);
        assert_eq!(action.len(), 1);
        assert!(action[0] >= -1.0 && action[0] <= 1.0);
    }
}
