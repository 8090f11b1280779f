//! Core orchestration engine for a hybrid evolutionary + off-policy RL
//! training loop: a population of actors co-evolved by an ask/tell EC
//! optimizer alongside a small number of TD3 gradient-trained actors,
//! exchanging trajectories through a shared replay buffer.

/// RL-side agent container: TD3 twin-critic actors (C6).
pub mod td3;

/// Parameter vector codec (C1) and the `burn`-backed actor/critic modules.
pub mod net;

/// Fixed-capacity ring buffer data structure underlying [`memory::ReplayBuffer`].
pub mod ds;

/// Vectorized env bank (C2) and autoreset disciplines.
pub mod env;

/// Experience replay (C3).
pub mod memory;

/// Population rollout engine (C4).
pub mod collector;

/// EC optimizer family (C5): GA, ERL-GA, CEM, OpenES, VanillaESMod.
pub mod ec;

/// Deterministic rollouts for reporting only (C8).
pub mod evaluator;

/// Running observation normalizer, shared across the population and RL agents.
pub mod obs_norm;

/// ERL workflow driver (C7): the per-iteration state machine.
pub mod workflow;

/// Configuration surface (§6).
pub mod config;

/// Engine error taxonomy (§7).
pub mod error;

/// Explicit, splittable RNG keys (no global RNG, §5/§9).
pub mod rng;
