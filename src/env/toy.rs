use super::{Box, Env};
use crate::rng::Key;
use rand::Rng;

/// A deterministic reach-the-target continuous-control toy: the observation
/// is the current position, the action is a bounded displacement, and the
/// episode terminates once the agent is within `tolerance` of `target` (or
/// truncates at the env bank's `max_episode_steps`). Reward is
/// `-‖pos - target‖²`, matching E1/E2's fitness landscape.
///
/// Stands in for the out-of-scope Brax/Gym simulators in this crate's own
/// tests, the same way the teacher's `gym` module stands in for real
/// environments in its examples.
#[derive(Debug, Clone)]
pub struct Reach {
    dim: usize,
    target: Vec<f32>,
    pos: Vec<f32>,
    tolerance: f32,
    action_space: Box,
}

impl Reach {
    pub fn new(target: Vec<f32>, action_bound: f32, tolerance: f32) -> Self {
        let dim = target.len();
        let action_space = Box::new(vec![-action_bound; dim], vec![action_bound; dim]);
        Self {
            dim,
            target,
            pos: vec![0.0; dim],
            tolerance,
            action_space,
        }
    }

    fn dist2(&self) -> f32 {
        self.pos
            .iter()
            .zip(&self.target)
            .map(|(&p, &t)| (p - t) * (p - t))
            .sum()
    }
}

impl Env for Reach {
    fn obs_dim(&self) -> usize {
        self.dim
    }

    fn action_space(&self) -> &Box {
        &self.action_space
    }

    fn reset(&mut self, key: Key) -> Vec<f32> {
        let mut rng = key.into_rng();
        self.pos = (0..self.dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        self.pos.clone()
    }

    fn step(&mut self, action: &[f32]) -> (Vec<f32>, f32, bool, bool) {
        let clipped = self.action_space.clip(action);
        for (p, a) in self.pos.iter_mut().zip(&clipped) {
            *p += a;
        }
        let reward = -self.dist2();
        let terminated = self.dist2().sqrt() < self.tolerance;
        (self.pos.clone(), reward, terminated, false)
    }
}

/// A 1-step stateless bandit: every episode is exactly one step long and the
/// reward is a deterministic function of the action, matching E5's
/// convergence scenario. `obs` is constant (a single zero), so the actor's
/// output does not depend on observation content at all.
#[derive(Debug, Clone)]
pub struct Bandit {
    optimum: Vec<f32>,
    action_space: Box,
}

impl Bandit {
    pub fn new(optimum: Vec<f32>) -> Self {
        let dim = optimum.len();
        let action_space = Box::new(vec![-1.0; dim], vec![1.0; dim]);
        Self {
            optimum,
            action_space,
        }
    }
}

impl Env for Bandit {
    fn obs_dim(&self) -> usize {
        1
    }

    fn action_space(&self) -> &Box {
        &self.action_space
    }

    fn reset(&mut self, _key: Key) -> Vec<f32> {
        vec![0.0]
    }

    fn step(&mut self, action: &[f32]) -> (Vec<f32>, f32, bool, bool) {
        let clipped = self.action_space.clip(action);
        let reward = -clipped
            .iter()
            .zip(&self.optimum)
            .map(|(&a, &o)| (a - o) * (a - o))
            .sum::<f32>();
        (vec![0.0], reward, true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reach_step_moves_toward_reward() {
        let mut env = Reach::new(vec![0.0, 0.0], 1.0, 0.01);
        env.reset(Key::from_seed(0));
        let (_, r1, _, _) = env.step(&[0.0, 0.0]);
        let (_, r2, _, _) = env.step(&[0.01, 0.01]);
        assert!(r2 >= r1 || r2 == r1, "moving should not worsen a near-zero action");
    }

    #[test]
    fn bandit_rewards_optimum_with_zero() {
        let mut env = Bandit::new(vec![0.3, -0.2]);
        env.reset(Key::from_seed(0));
        let (_, r, term, _) = env.step(&[0.3, -0.2]);
        assert!((r - 0.0).abs() < 1e-6);
        assert!(term);
    }
}
