//! ERL workflow driver (C7, §4.7): the per-iteration state machine that
//! co-evolves an EC population and trains `num_rl_agents` TD3 actors against
//! a shared replay buffer, with variant-specific RL→EC injection.

pub mod es;
pub mod ga;
pub mod origin;

use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

use crate::collector::{ActorPolicy, Collector};
use crate::config::WorkflowConfig;
use crate::ec::{Cem, EcOptimizer, ErlGa, Ga, OpenEs, TellInfo, VanillaEsMod};
use crate::env::{Autoreset, Env, EnvBank};
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::memory::ReplayBuffer;
use crate::net::{Mlp, ParamsPolicy, PolicyParams};
use crate::obs_norm::RunningMeanStd;
use crate::rng::Key;
use crate::td3::Td3Agent;

/// Tagged union over the five EC optimizer variants (§9 "Polymorphism across
/// optimizer variants": re-architected here as a tagged variant rather than
/// a trait object, since injection needs variant-specific `tell_external`
/// methods that are not part of the uniform [`EcOptimizer`] contract).
pub enum EcState {
    Ga(Ga),
    ErlGa(ErlGa),
    Cem(Cem),
    OpenEs(OpenEs),
    VanillaEsMod(VanillaEsMod),
}

impl EcState {
    pub fn pop_size(&self) -> usize {
        match self {
            EcState::Ga(o) => o.pop_size(),
            EcState::ErlGa(o) => o.pop_size(),
            EcState::Cem(o) => o.pop_size(),
            EcState::OpenEs(o) => o.pop_size(),
            EcState::VanillaEsMod(o) => o.pop_size(),
        }
    }

    pub fn ask(&mut self, key: Key) -> Vec<PolicyParams> {
        match self {
            EcState::Ga(o) => o.ask(key),
            EcState::ErlGa(o) => o.ask(key),
            EcState::Cem(o) => o.ask(key),
            EcState::OpenEs(o) => o.ask(key),
            EcState::VanillaEsMod(o) => o.ask(key),
        }
    }

    pub fn tell(&mut self, fitnesses: &[f32]) -> Result<TellInfo> {
        match self {
            EcState::Ga(o) => o.tell(fitnesses),
            EcState::ErlGa(o) => o.tell(fitnesses),
            EcState::Cem(o) => o.tell(fitnesses),
            EcState::OpenEs(o) => o.tell(fitnesses),
            EcState::VanillaEsMod(o) => o.tell(fitnesses),
        }
    }

    pub fn last_population(&self) -> &[PolicyParams] {
        match self {
            EcState::Ga(o) => o.last_population(),
            EcState::ErlGa(o) => o.last_population(),
            EcState::Cem(o) => o.last_population(),
            EcState::OpenEs(o) => o.last_population(),
            EcState::VanillaEsMod(o) => o.last_population(),
        }
    }

    pub fn overwrite_population(&mut self, indices: &[usize], replacements: &[PolicyParams]) -> Result<()> {
        match self {
            EcState::Ga(o) => o.overwrite_population(indices, replacements),
            EcState::ErlGa(o) => o.overwrite_population(indices, replacements),
            EcState::Cem(o) => o.overwrite_population(indices, replacements),
            EcState::OpenEs(o) => o.overwrite_population(indices, replacements),
            EcState::VanillaEsMod(o) => o.overwrite_population(indices, replacements),
        }
    }

    /// The distribution mean, for the ES-style variants only (§4.7
    /// "Evaluation" additionally evaluates this deterministically).
    pub fn mean(&self) -> Option<&PolicyParams> {
        match self {
            EcState::OpenEs(o) => Some(o.mean()),
            EcState::VanillaEsMod(o) => Some(o.mean()),
            EcState::Ga(_) | EcState::ErlGa(_) | EcState::Cem(_) => None,
        }
    }
}

/// Per-iteration training metrics (§3 `WorkflowMetrics`, §8 item 10: both
/// counters here increase strictly across iterations).
#[derive(Debug, Clone, Default)]
pub struct WorkflowMetrics {
    pub iterations: u64,
    pub sampled_timesteps: u64,
    pub rl_sampled_timesteps: u64,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub critic_loss: Option<f32>,
    pub actor_loss: Option<f32>,
    pub eval_episode_return: Option<f32>,
    pub eval_episode_length: Option<f32>,
    pub pop_center_episode_return: Option<f32>,
}

/// Variant-specific RL→EC injection policy (§4.7 step 7), implemented by the
/// unit structs in `origin`/`ga`/`es`.
pub trait InjectionPolicy {
    /// Returns `true` on iterations where injection actually mutates the EC
    /// state (§8 item 8: the population tensor changes only on these).
    fn inject(
        ec_state: &mut EcState,
        rl_actor_params: &[PolicyParams],
        ec_fitnesses: &[f32],
        rl_fitnesses: &[f32],
        iteration: u64,
        rl_injection_interval: u64,
        rng_seed: u64,
    ) -> Result<(TellInfo, bool)>;
}

/// Uniform-random policy used only for the pre-fill rollout (§9 "Random
/// -policy pre-fill"): samples independently in `[low, high]` per dimension.
struct RandomPolicy<'a> {
    action_space: &'a crate::env::Box,
}

impl ActorPolicy for RandomPolicy<'_> {
    fn act(&self, _obs: &[f32]) -> Vec<f32> {
        // deterministic placeholder; real randomness comes from `act_exploratory`
        self.action_space.low.clone()
    }

    fn act_exploratory(&self, _obs: &[f32], key: Key, _epsilon: f32) -> Vec<f32> {
        let mut rng = key.into_rng();
        self.action_space
            .low
            .iter()
            .zip(&self.action_space.high)
            .map(|(&lo, &hi)| rng.gen_range(lo..=hi))
            .collect()
    }
}

/// The C7 driver itself. Generic over the `burn` backend `B` and the env
/// type `E` shared by the EC and RL rollout banks (§5: single-threaded
/// cooperative driver, no shared mutable state between iterations other than
/// what this struct owns).
pub struct ErlWorkflow<B: AutodiffBackend, E: Env> {
    pub ec_state: EcState,
    pub rl_agents: Vec<Td3Agent<B>>,
    pub obs_preprocessor: RunningMeanStd,
    pub replay_buffer: ReplayBuffer,
    pub ec_env_bank: EnvBank<E>,
    pub rl_env_bank: EnvBank<E>,
    pub eval_env_bank: EnvBank<E>,
    pub config: WorkflowConfig,
    pub metrics: WorkflowMetrics,
    device: B::Device,
}

impl<B: AutodiffBackend, E: Env + Clone> ErlWorkflow<B, E> {
    pub fn new(
        ec_state: EcState,
        rl_agents: Vec<Td3Agent<B>>,
        envs_for_ec: Vec<E>,
        envs_for_rl: Vec<E>,
        envs_for_eval: Vec<E>,
        config: WorkflowConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let obs_dim = envs_for_ec.first().map(|e| e.obs_dim()).unwrap_or(0);
        let ec_env_bank = EnvBank::new(envs_for_ec, Autoreset::Disabled, config.rollout.max_episode_steps, config.td3.discount);
        let rl_env_bank = EnvBank::new(envs_for_rl, Autoreset::Normal, config.rollout.max_episode_steps, config.td3.discount);
        let eval_env_bank = EnvBank::new(envs_for_eval, Autoreset::Disabled, config.rollout.max_episode_steps, config.td3.discount);
        let replay_buffer = ReplayBuffer::new(config.rollout.replay_buffer_capacity);
        log::info!(
            "workflow setup: pop_size={} num_rl_agents={} num_envs={} replay_buffer_capacity={}",
            ec_state.pop_size(),
            rl_agents.len(),
            config.rollout.num_envs,
            config.rollout.replay_buffer_capacity
        );
        Ok(Self {
            ec_state,
            rl_agents,
            obs_preprocessor: RunningMeanStd::new(obs_dim),
            replay_buffer,
            ec_env_bank,
            rl_env_bank,
            eval_env_bank,
            config,
            metrics: WorkflowMetrics::default(),
            device,
        })
    }

    /// Optional pre-fill (§9 "Random-policy pre-fill"): rolls a uniform
    /// random policy through a NORMAL-autoreset bank for
    /// `random_timesteps / num_envs` steps and appends every transition
    /// (autoreset banks never produce padding, so no mask is needed).
    pub fn prefill(&mut self, key: Key) {
        if self.config.schedule.random_timesteps == 0 {
            return;
        }
        let action_space = self.rl_env_bank.action_space().clone();
        let policy = RandomPolicy { action_space: &action_space };
        let num_episodes = (self.config.schedule.random_timesteps / self.rl_env_bank.num_envs().max(1)).div_ceil(self.config.rollout.max_episode_steps as usize).max(1);
        let (_, transitions) = Collector::evaluate(&policy, &mut self.rl_env_bank, num_episodes, key, Some(1.0), None);
        for t in &transitions {
            self.obs_preprocessor.update(&t.obs);
        }
        log::info!("pre-fill: added {} random-policy transitions to the replay buffer", transitions.len());
        self.metrics.sampled_timesteps += transitions.len() as u64;
        self.replay_buffer.add(transitions, None);
    }

    /// Runs one iteration of the §4.7 state machine, delegating the
    /// injection step to `Policy`. Returns the updated metrics.
    pub fn step<Policy, OA, OC>(&mut self, key: Key, actor_opts: &mut [OA], critic1_opts: &mut [OC], critic2_opts: &mut [OC]) -> Result<WorkflowMetrics>
    where
        Policy: InjectionPolicy,
        OA: Optimizer<Mlp<B>, B>,
        OC: Optimizer<Mlp<B>, B>,
    {
        let (ec_key, rl_key, learn_key, next_key) = split4(key);
        self.metrics.iterations += 1;
        let iteration = self.metrics.iterations;
        let warmed_up = iteration > self.config.schedule.warmup_iters as u64;

        // 2. ask
        let pop = self.ec_state.ask(ec_key.clone());

        // 3. EC rollout
        let action_space = self.ec_env_bank.action_space().clone();
        let mut ec_returns = Vec::with_capacity(pop.len());
        let ec_keys = ec_key.split_n(pop.len());
        for (params, k) in pop.iter().zip(ec_keys) {
            let policy = ParamsPolicy { params, action_space: &action_space };
            let (metric, transitions) = Collector::evaluate(&policy, &mut self.ec_env_bank, self.config.rollout.episodes_for_fitness, k, None, Some(&self.obs_preprocessor));
            self.metrics.sampled_timesteps += transitions.len() as u64;
            ec_returns.push(mean(&metric.episode_returns));
            self.replay_buffer.add(transitions, None);
        }

        // 4. RL rollout (gated by warm-up only for the origin-style budget;
        // always performed here, since the replay buffer needs data from
        // iteration 1 regardless of variant).
        let mut rl_fitnesses = Vec::with_capacity(self.rl_agents.len());
        let rl_keys = rl_key.split_n(self.rl_agents.len());
        for (agent, k) in self.rl_agents.iter().zip(rl_keys) {
            let (metric, transitions) = Collector::evaluate(agent, &mut self.rl_env_bank, self.config.rollout.rollout_episodes, k, Some(self.config.rollout.exploration_epsilon), Some(&self.obs_preprocessor));
            for t in &transitions {
                self.obs_preprocessor.update(&t.obs);
            }
            self.metrics.sampled_timesteps += transitions.len() as u64;
            self.metrics.rl_sampled_timesteps += transitions.len() as u64;
            rl_fitnesses.push(mean(&metric.episode_returns));
            self.replay_buffer.add(transitions, None);
        }

        // 6. RL update, gated by warm-up and buffer readiness. A buffer that
        // hasn't reached `min_sample_timesteps` yet is §7's EmptyBuffer case:
        // not an error, just a skipped update for this iteration.
        self.metrics.critic_loss = None;
        self.metrics.actor_loss = None;
        if warmed_up && self.replay_buffer.size() < self.config.rollout.min_sample_timesteps {
            log::warn!(
                "iteration {iteration}: skipping RL update, buffer has {} transitions (need {})",
                self.replay_buffer.size(),
                self.config.rollout.min_sample_timesteps
            );
        }
        if iteration == self.config.schedule.warmup_iters as u64 + 1 {
            log::info!("iteration {iteration}: warm-up complete, RL updates begin");
        }
        if warmed_up && self.replay_buffer.size() >= self.config.rollout.min_sample_timesteps {
            // `total_timesteps` for the "origin" scaling rule includes this
            // iteration's own EC+RL rollout contribution, since
            // `sampled_timesteps` above is already incremented before this
            // point.
            let num_updates = match self.config.schedule.rl_updates_frac_per_iter {
                Some(frac) => {
                    let raw = (self.metrics.sampled_timesteps as f64 * frac as f64).ceil() as u64;
                    ((raw / self.config.td3.actor_update_interval.max(1) as u64).max(1)) as usize
                }
                None => self.config.schedule.updates_per_iter.unwrap_or(1),
            };
            let learn_keys = learn_key.split_n(num_updates * self.rl_agents.len());
            let mut ki = 0;
            for _ in 0..num_updates {
                for (i, agent) in self.rl_agents.iter_mut().enumerate() {
                    let (batch_key, noise_key) = learn_keys[ki].clone().split();
                    ki += 1;
                    let batch = self.replay_buffer.sample(self.config.rollout.batch_size, batch_key)?;
                    let info = agent.update(
                        &batch,
                        &self.obs_preprocessor,
                        &mut actor_opts[i],
                        &mut critic1_opts[i],
                        &mut critic2_opts[i],
                        self.config.td3.actor_lr as f64,
                        self.config.td3.critic_lr as f64,
                        noise_key,
                    )?;
                    self.metrics.critic_loss = Some(info.critic_loss);
                    if info.actor_loss.is_some() {
                        self.metrics.actor_loss = info.actor_loss;
                    }
                }
            }
        }

        // 7-8. injection + tell
        let rl_actor_params: Vec<PolicyParams> = self.rl_agents.iter().map(|a| a.to_actor_params()).collect();
        let (info, _changed) = if warmed_up {
            Policy::inject(
                &mut self.ec_state,
                &rl_actor_params,
                &ec_returns,
                &rl_fitnesses,
                iteration,
                self.config.schedule.rl_injection_interval as u64,
                next_key.seed(),
            )?
        } else {
            (self.ec_state.tell(&ec_returns)?, false)
        };

        self.metrics.best_fitness = info.best_fitness;
        self.metrics.mean_fitness = info.mean_fitness;

        // C8 evaluation, §4.7: invoked every `eval_interval` iterations
        // independently of the rest of the step; deterministic rollouts
        // only, never touching the replay buffer or optimizer state.
        self.metrics.eval_episode_return = None;
        self.metrics.eval_episode_length = None;
        self.metrics.pop_center_episode_return = None;
        if self.config.schedule.eval_interval > 0 && iteration % self.config.schedule.eval_interval as u64 == 0 {
            let report = match self.ec_state.mean() {
                Some(ec_mean) => {
                    let action_space = self.eval_env_bank.action_space().clone();
                    Evaluator::evaluate_with_pop_center(
                        &self.rl_agents,
                        ec_mean,
                        &action_space,
                        &mut self.eval_env_bank,
                        self.config.schedule.eval_episodes,
                        next_key,
                        &self.obs_preprocessor,
                    )
                }
                None => Evaluator::evaluate_rl_agents(&self.rl_agents, &mut self.eval_env_bank, self.config.schedule.eval_episodes, next_key, &self.obs_preprocessor),
            };
            self.metrics.eval_episode_return = Some(mean(&report.rl_episode_returns));
            self.metrics.eval_episode_length = Some(mean(&report.rl_episode_lengths));
            self.metrics.pop_center_episode_return = report.pop_center_episode_return;
        }

        log::debug!(
            "iteration {iteration}: best_fitness={:.3} mean_fitness={:.3} sampled_timesteps={}",
            self.metrics.best_fitness,
            self.metrics.mean_fitness,
            self.metrics.sampled_timesteps
        );

        Ok(self.metrics.clone())
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn split4(key: Key) -> (Key, Key, Key, Key) {
    let (a, rest) = key.split();
    let (b, rest) = rest.split();
    let (c, d) = rest.split();
    (a, b, c, d)
}

#[cfg(test)]
mod tests {
    use burn::optim::AdamWConfig;

    use super::origin::Origin;
    use super::*;
    use crate::config::{PopulationConfig, RolloutConfig, ScheduleConfig, ScheduleKnobs, Td3Hyperparams};
    use crate::ec::erlga::ErlGaConfig;
    use crate::ec::mutation::MutationConfig;
    use crate::ec::vanilla_es_mod::MixStrategy;
    use crate::env::toy::Reach;
    use crate::net::params::LayerParams;
    use crate::td3::Td3Config;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;

    fn prototype() -> PolicyParams {
        PolicyParams {
            hidden: vec![LayerParams::zeros(2, 8)],
            head: LayerParams::zeros(8, 2),
        }
    }

    fn tiny_config() -> WorkflowConfig {
        WorkflowConfig {
            population: PopulationConfig {
                variant: crate::config::EcVariant::Ga,
                pop_size: 4,
                num_elites: 2,
                mutation: MutationConfig {
                    reset_prob: 0.01,
                    num_mutation_frac: 0.1,
                    super_mut_prob: 0.05,
                    super_mut_strength: 1.0,
                    mut_strength: 0.1,
                    vec_relative_prob: 0.5,
                    weight_max_magnitude: 5.0,
                },
                crossover: ErlGaConfig { num_crossover_frac: 0.5, enable_crossover: true },
                cem_init_variance: 1.0,
                cem_variance_eps: 1e-3,
                openes_sigma: ScheduleConfig { init: 0.1, decay: 0.999, min: 0.01 },
                openes_alpha: ScheduleConfig { init: 0.05, decay: 0.999, min: 0.005 },
                mirror_sampling: false,
                vanilla_es_sigma: ScheduleConfig { init: 0.1, decay: 0.999, min: 0.01 },
                mix_strategy: MixStrategy::Append,
            },
            td3: Td3Hyperparams {
                num_rl_agents: 2,
                tau: 0.01,
                discount: 0.99,
                actor_update_interval: 2,
                policy_noise: 0.1,
                clip_policy_noise: 0.3,
                actor_lr: 1e-3,
                critic_lr: 1e-3,
            },
            rollout: RolloutConfig {
                num_envs: 2,
                episodes_for_fitness: 1,
                rollout_episodes: 1,
                max_episode_steps: 5,
                exploration_epsilon: 0.1,
                replay_buffer_capacity: 1000,
                batch_size: 4,
                min_sample_timesteps: 8,
            },
            schedule: ScheduleKnobs {
                warmup_iters: 0,
                random_timesteps: 8,
                rl_injection_interval: 2,
                updates_per_iter: Some(1),
                rl_updates_frac_per_iter: None,
                num_iters: 3,
                eval_interval: 2,
                eval_episodes: 1,
                save_replay_buffer: false,
            },
        }
    }

    fn make_workflow() -> ErlWorkflow<TestBackend, Reach> {
        let config = tiny_config();
        let device = Default::default();
        let ga = Ga::init(prototype(), config.population.pop_size, config.population.num_elites, config.population.mutation.clone(), Key::from_seed(7));
        let ec_state = EcState::Ga(ga);

        let td3_cfg = Td3Config {
            gamma: config.td3.discount,
            tau: config.td3.tau,
            policy_noise: config.td3.policy_noise,
            noise_clip: config.td3.clip_policy_noise,
            actor_update_interval: config.td3.actor_update_interval,
        };
        let action_space = crate::env::Box::new(vec![-1.0, -1.0], vec![1.0, 1.0]);
        let rl_agents: Vec<Td3Agent<TestBackend>> = (0..config.td3.num_rl_agents)
            .map(|_| Td3Agent::new(2, 2, &[8], action_space.clone(), td3_cfg.clone(), device))
            .collect();

        let make_envs = || (0..config.rollout.num_envs).map(|_| Reach::new(vec![0.0, 0.0], 1.0, 0.05)).collect::<Vec<_>>();
        ErlWorkflow::new(ec_state, rl_agents, make_envs(), make_envs(), make_envs(), config, device).unwrap()
    }

    #[test]
    fn prefill_then_step_reports_monotonic_metrics_and_gated_eval() {
        let mut workflow = make_workflow();
        workflow.prefill(Key::from_seed(1));
        assert!(workflow.metrics.sampled_timesteps > 0);

        let num_agents = workflow.rl_agents.len();
        let mut actor_opts: Vec<_> = (0..num_agents).map(|_| AdamWConfig::new().init()).collect();
        let mut critic1_opts: Vec<_> = (0..num_agents).map(|_| AdamWConfig::new().init()).collect();
        let mut critic2_opts: Vec<_> = (0..num_agents).map(|_| AdamWConfig::new().init()).collect();

        let mut prev_iterations = workflow.metrics.iterations;
        let mut prev_timesteps = workflow.metrics.sampled_timesteps;
        for i in 0..3u64 {
            let metrics = workflow.step::<Origin, _, _>(Key::from_seed(100 + i), &mut actor_opts, &mut critic1_opts, &mut critic2_opts).unwrap();
            assert!(metrics.iterations > prev_iterations);
            assert!(metrics.sampled_timesteps >= prev_timesteps);
            prev_iterations = metrics.iterations;
            prev_timesteps = metrics.sampled_timesteps;

            if metrics.iterations % workflow.config.schedule.eval_interval as u64 == 0 {
                assert!(metrics.eval_episode_return.is_some());
            } else {
                assert!(metrics.eval_episode_return.is_none());
            }
        }
    }
}
