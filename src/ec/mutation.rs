use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::net::params::{LayerParams, PolicyParams};
use crate::rng::Key;

/// Knobs for the MLP mutation operator (§4.5 "MLP mutation operator").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    pub reset_prob: f32,
    pub num_mutation_frac: f32,
    pub super_mut_prob: f32,
    pub super_mut_strength: f32,
    pub mut_strength: f32,
    pub vec_relative_prob: f32,
    pub weight_max_magnitude: f32,
}

fn rms(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&x| x * x).sum::<f32>() / values.len() as f32).sqrt()
}

fn mutate_tensor(values: &mut [f32], cfg: &MutationConfig, rng: &mut impl rand::RngCore) {
    if rng.gen::<f32>() < cfg.reset_prob {
        // fresh re-initialization: small uniform noise around zero, the
        // same scale `burn`'s default linear initializer uses.
        let bound = 1.0 / (values.len() as f32).sqrt().max(1.0);
        for v in values.iter_mut() {
            *v = rng.gen_range(-bound..bound);
        }
        return;
    }

    let scale = if rng.gen::<f32>() < cfg.vec_relative_prob {
        rms(values).max(1e-8)
    } else {
        1.0
    };

    let num_to_mutate = ((values.len() as f32) * cfg.num_mutation_frac).round() as usize;
    let mut indices: Vec<usize> = (0..values.len()).collect();
    // Fisher-Yates partial shuffle to pick `num_to_mutate` indices uniformly.
    for i in 0..num_to_mutate.min(indices.len()) {
        let j = rng.gen_range(i..indices.len());
        indices.swap(i, j);
    }

    for &ix in indices.iter().take(num_to_mutate) {
        let w = values[ix];
        let strength = if rng.gen::<f32>() < cfg.super_mut_prob {
            cfg.super_mut_strength
        } else {
            cfg.mut_strength
        };
        let sigma = (strength * w.abs() * scale).max(1e-8);
        let noise = Normal::new(0.0, sigma).unwrap().sample(rng);
        values[ix] = (w + noise).clamp(-cfg.weight_max_magnitude, cfg.weight_max_magnitude);
    }
}

fn mutate_layer(layer: &LayerParams, cfg: &MutationConfig, rng: &mut impl rand::RngCore) -> LayerParams {
    let mut weight = layer.weight.clone();
    let mut bias = layer.bias.clone();
    mutate_tensor(&mut weight, cfg, rng);
    mutate_tensor(&mut bias, cfg, rng);
    LayerParams {
        weight,
        bias,
        shape: layer.shape,
    }
}

/// Apply the mutation operator to every layer of `parent`, using `key` for
/// all randomness.
pub fn mutate(parent: &PolicyParams, cfg: &MutationConfig, key: Key) -> PolicyParams {
    let mut rng = key.into_rng();
    PolicyParams {
        hidden: parent.hidden.iter().map(|l| mutate_layer(l, cfg, &mut rng)).collect(),
        head: mutate_layer(&parent.head, cfg, &mut rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MutationConfig {
        MutationConfig {
            reset_prob: 0.0,
            num_mutation_frac: 1.0,
            super_mut_prob: 0.0,
            super_mut_strength: 1.0,
            mut_strength: 0.1,
            vec_relative_prob: 0.0,
            weight_max_magnitude: 1.0,
        }
    }

    fn proto() -> PolicyParams {
        let mut p = PolicyParams {
            hidden: vec![LayerParams::zeros(3, 4)],
            head: LayerParams::zeros(4, 2),
        };
        for w in p.head.weight.iter_mut() {
            *w = 0.5;
        }
        p
    }

    #[test]
    fn mutation_is_deterministic_given_key() {
        let parent = proto();
        let a = mutate(&parent, &cfg(), Key::from_seed(1));
        let b = mutate(&parent, &cfg(), Key::from_seed(1));
        assert_eq!(a, b);
    }

    #[test]
    fn mutation_respects_max_magnitude_clip() {
        let mut c = cfg();
        c.mut_strength = 1000.0;
        let parent = proto();
        let child = mutate(&parent, &c, Key::from_seed(2));
        for w in &child.head.weight {
            assert!(w.abs() <= c.weight_max_magnitude + 1e-6);
        }
    }

    #[test]
    fn reset_prob_one_replaces_all_weights() {
        let mut c = cfg();
        c.reset_prob = 1.0;
        let parent = proto();
        let child = mutate(&parent, &c, Key::from_seed(3));
        assert_ne!(child.head.weight, parent.head.weight);
    }
}
