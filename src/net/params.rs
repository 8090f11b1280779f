use crate::error::{EngineError, Result};

/// One `Linear` layer's weights and bias, stored flat and row-major
/// (`weight[o * in + i]`, shape `(out, in)`).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
    pub shape: (usize, usize),
}

impl LayerParams {
    pub fn zeros(in_size: usize, out_size: usize) -> Self {
        Self {
            weight: vec![0.0; in_size * out_size],
            bias: vec![0.0; out_size],
            shape: (out_size, in_size),
        }
    }

    fn len(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// A fully flattened MLP policy: named hidden layers plus a head, mirroring
/// the `Linear<B>` fields of the teacher's `Model<B>` but sized generically
/// instead of fixed at three layers.
///
/// This is the EC-side representation (§3 `PolicyParams`): plain `Vec<f32>`
/// leaves rather than `burn::Tensor`, so mutation/crossover/codec operations
/// do not need an autodiff backend. `net::mlp::Mlp` bridges to and from this
/// type for forward/backward passes.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyParams {
    pub hidden: Vec<LayerParams>,
    pub head: LayerParams,
}

impl PolicyParams {
    /// Deterministic leaf traversal order: hidden layers in order, then the
    /// head, weight before bias within each layer. `to_vector`/`to_tree` must
    /// agree on this order for the round-trip invariant to hold (§8 item 1).
    fn layers(&self) -> impl Iterator<Item = &LayerParams> {
        self.hidden.iter().chain(std::iter::once(&self.head))
    }

    /// Total flat dimension `D`.
    pub fn dim(&self) -> usize {
        self.layers().map(LayerParams::len).sum()
    }

    /// C1: flatten to a 1-D vector of length `dim()`.
    pub fn to_vector(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dim());
        for layer in self.layers() {
            out.extend_from_slice(&layer.weight);
            out.extend_from_slice(&layer.bias);
        }
        out
    }

    /// C1: inverse of `to_vector`, using `self` as the shape prototype.
    pub fn to_tree(&self, vector: &[f32]) -> Result<PolicyParams> {
        if vector.len() != self.dim() {
            return Err(EngineError::ShapeMismatch {
                expected: self.dim(),
                actual: vector.len(),
                context: "PolicyParams::to_tree".into(),
            });
        }
        let mut cursor = 0usize;
        let mut take = |n: usize| -> Vec<f32> {
            let slice = vector[cursor..cursor + n].to_vec();
            cursor += n;
            slice
        };
        let rebuild = |proto: &LayerParams, take: &mut dyn FnMut(usize) -> Vec<f32>| LayerParams {
            weight: take(proto.weight.len()),
            bias: take(proto.bias.len()),
            shape: proto.shape,
        };
        let hidden = self
            .hidden
            .iter()
            .map(|proto| rebuild(proto, &mut take))
            .collect();
        let head = rebuild(&self.head, &mut take);
        Ok(PolicyParams { hidden, head })
    }

    /// Generic tree-map primitive (§9 "Nested parameter trees"): zip two
    /// policies of identical shape and combine every weight/bias leaf
    /// element-wise. Reused by Polyak updates, mutation, and crossover.
    pub fn zip_map(&self, other: &PolicyParams, mut f: impl FnMut(f32, f32) -> f32) -> Result<PolicyParams> {
        if self.hidden.len() != other.hidden.len() {
            return Err(EngineError::ShapeMismatch {
                expected: self.hidden.len(),
                actual: other.hidden.len(),
                context: "PolicyParams::zip_map hidden layer count".into(),
            });
        }
        let zip_layer = |a: &LayerParams, b: &LayerParams, f: &mut dyn FnMut(f32, f32) -> f32| -> Result<LayerParams> {
            if a.shape != b.shape {
                return Err(EngineError::ShapeMismatch {
                    expected: a.shape.0 * a.shape.1,
                    actual: b.shape.0 * b.shape.1,
                    context: "PolicyParams::zip_map layer shape".into(),
                });
            }
            Ok(LayerParams {
                weight: a.weight.iter().zip(&b.weight).map(|(&x, &y)| f(x, y)).collect(),
                bias: a.bias.iter().zip(&b.bias).map(|(&x, &y)| f(x, y)).collect(),
                shape: a.shape,
            })
        };
        let hidden = self
            .hidden
            .iter()
            .zip(&other.hidden)
            .map(|(a, b)| zip_layer(a, b, &mut f))
            .collect::<Result<Vec<_>>>()?;
        let head = zip_layer(&self.head, &other.head, &mut f)?;
        Ok(PolicyParams { hidden, head })
    }

    /// Tree-map with only a per-leaf unary op (no second tree needed).
    pub fn map(&self, mut f: impl FnMut(f32) -> f32) -> PolicyParams {
        let map_layer = |l: &LayerParams, f: &mut dyn FnMut(f32) -> f32| LayerParams {
            weight: l.weight.iter().map(|&x| f(x)).collect(),
            bias: l.bias.iter().map(|&x| f(x)).collect(),
            shape: l.shape,
        };
        PolicyParams {
            hidden: self.hidden.iter().map(|l| map_layer(l, &mut f)).collect(),
            head: map_layer(&self.head, &mut f),
        }
    }

    fn layer_forward(layer: &LayerParams, input: &[f32]) -> Vec<f32> {
        let (out_size, in_size) = layer.shape;
        assert_eq!(input.len(), in_size);
        (0..out_size)
            .map(|o| {
                let row = &layer.weight[o * in_size..(o + 1) * in_size];
                row.iter().zip(input).map(|(&w, &x)| w * x).sum::<f32>() + layer.bias[o]
            })
            .collect()
    }

    /// Evaluate this policy on one observation without any tensor framework:
    /// a plain ReLU-hidden, tanh-head forward pass, scaled into the action
    /// box. The EC side never needs `burn`'s autodiff machinery — only the
    /// RL side, where gradients are taken, does (see `net::mlp::Mlp`).
    pub fn forward(&self, obs: &[f32], action_low: &[f32], action_high: &[f32]) -> Vec<f32> {
        let mut x = obs.to_vec();
        for layer in &self.hidden {
            x = Self::layer_forward(layer, &x).into_iter().map(|v| v.max(0.0)).collect();
        }
        let raw = Self::layer_forward(&self.head, &x);
        raw.into_iter()
            .zip(action_low)
            .zip(action_high)
            .map(|((v, &lo), &hi)| {
                let t = v.tanh();
                let scale = (hi - lo) / 2.0;
                let center = (hi + lo) / 2.0;
                t * scale + center
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proto() -> PolicyParams {
        PolicyParams {
            hidden: vec![LayerParams::zeros(3, 4), LayerParams::zeros(4, 4)],
            head: LayerParams::zeros(4, 2),
        }
    }

    #[test]
    fn dim_equals_sum_of_leaf_sizes() {
        let p = sample_proto();
        // layer1: 3*4 + 4 = 16; layer2: 4*4 + 4 = 20; head: 4*2 + 2 = 10
        assert_eq!(p.dim(), 16 + 20 + 10);
    }

    #[test]
    fn round_trip_is_bitwise_identity() {
        let proto = sample_proto();
        let mut filled = proto.clone();
        for (i, w) in filled.hidden[0].weight.iter_mut().enumerate() {
            *w = i as f32 * 0.5;
        }
        filled.head.bias = vec![1.0, -1.0];
        let vector = filled.to_vector();
        assert_eq!(vector.len(), proto.dim());
        let recovered = proto.to_tree(&vector).unwrap();
        assert_eq!(recovered, filled);
    }

    #[test]
    fn to_tree_rejects_wrong_length() {
        let proto = sample_proto();
        let bad = vec![0.0; proto.dim() - 1];
        assert!(proto.to_tree(&bad).is_err());
    }

    #[test]
    fn forward_output_is_within_action_bounds() {
        let p = sample_proto().map(|_| 0.3);
        let obs = vec![1.0, -1.0, 0.5];
        let low = vec![-2.0, -2.0];
        let high = vec![2.0, 2.0];
        let action = p.forward(&obs, &low, &high);
        assert_eq!(action.len(), 2);
        for (a, (lo, hi)) in action.iter().zip(low.iter().zip(&high)) {
            assert!(*a >= *lo && *a <= *hi);
        }
    }

    #[test]
    fn zip_map_adds_elementwise() {
        let a = sample_proto().map(|_| 1.0);
        let b = sample_proto().map(|_| 2.0);
        let summed = a.zip_map(&b, |x, y| x + y).unwrap();
        assert!(summed.head.weight.iter().all(|&x| x == 3.0));
    }
}
