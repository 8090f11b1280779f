use burn::module::{Module, Param};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{Data, Tensor};

use super::params::{LayerParams, PolicyParams};

/// A feed-forward network with `hidden.len()` ReLU hidden layers and a head,
/// shaped identically to [`PolicyParams`]. Used for both the actor (head
/// passed through `tanh` and scaled to the action box) and the twin critics
/// (head left linear, one scalar output).
///
/// Mirrors the teacher's `Model<B>` (`examples/dqn_cartpole/model.rs`)
/// generalized from three fixed `Linear<B>` fields to a `Vec<Linear<B>>`.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    /// `layer_sizes` lists every layer's input width followed by the final
    /// output width, e.g. `[obs_dim, 64, 64, action_dim]`.
    pub fn new(layer_sizes: &[usize], device: &B::Device) -> Self {
        assert!(layer_sizes.len() >= 2, "need at least input and output width");
        let mut hidden = Vec::new();
        for pair in layer_sizes[..layer_sizes.len() - 1].windows(2) {
            hidden.push(LinearConfig::new(pair[0], pair[1]).init(device));
        }
        let head = LinearConfig::new(
            layer_sizes[layer_sizes.len() - 2],
            layer_sizes[layer_sizes.len() - 1],
        )
        .init(device);
        Self { hidden, head }
    }

    fn forward_trunk(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for layer in &self.hidden {
            x = burn::tensor::activation::relu(layer.forward(x));
        }
        x
    }

    /// Actor forward pass: trunk, head, `tanh`, scaled into `[a_low, a_high]`.
    pub fn forward_actor(&self, obs: Tensor<B, 2>, a_low: f32, a_high: f32) -> Tensor<B, 2> {
        let x = self.forward_trunk(obs);
        let raw = burn::tensor::activation::tanh(self.head.forward(x));
        let scale = (a_high - a_low) / 2.0;
        let center = (a_high + a_low) / 2.0;
        raw * scale + center
    }

    /// Critic forward pass: `obs` and `action` are pre-concatenated by the
    /// caller along the feature axis; head output is a single Q-value column.
    pub fn forward_critic(&self, obs_action: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.forward_trunk(obs_action);
        self.head.forward(x)
    }

    /// Polyak update: `self ← (1-τ)·self + τ·other`, applied tensor-by-tensor
    /// via `Param::map`, exactly the mechanism the teacher uses in
    /// `soft_update_linear`/`soft_update_tensor`.
    pub fn soft_update(mut self, other: &Self, tau: f32) -> Self {
        assert_eq!(self.hidden.len(), other.hidden.len());
        self.hidden = self
            .hidden
            .into_iter()
            .zip(&other.hidden)
            .map(|(this, that)| soft_update_linear(this, that, tau))
            .collect();
        self.head = soft_update_linear(self.head, &other.head, tau);
        self
    }

    /// Load weights from an EC-side [`PolicyParams`] tree, overwriting every
    /// leaf tensor via `Param::map` (never rebuilding the `Module`, matching
    /// `burn`'s own convention for in-place parameter replacement).
    pub fn load_params(mut self, params: &PolicyParams, device: &B::Device) -> Self {
        assert_eq!(self.hidden.len(), params.hidden.len());
        self.hidden = self
            .hidden
            .into_iter()
            .zip(&params.hidden)
            .map(|(layer, proto)| load_linear(layer, proto, device))
            .collect();
        self.head = load_linear(self.head, &params.head, device);
        self
    }

    /// Export the live tensors as a flat [`PolicyParams`] tree.
    pub fn to_params(&self) -> PolicyParams {
        PolicyParams {
            hidden: self.hidden.iter().map(linear_to_params).collect(),
            head: linear_to_params(&self.head),
        }
    }
}

fn soft_update_tensor<B: Backend, const D: usize>(
    this: Param<Tensor<B, D>>,
    that: &Param<Tensor<B, D>>,
    tau: f32,
) -> Param<Tensor<B, D>> {
    this.map(|tensor| tensor * (1.0 - tau) + that.val() * tau)
}

fn soft_update_linear<B: Backend>(mut this: Linear<B>, that: &Linear<B>, tau: f32) -> Linear<B> {
    this.weight = soft_update_tensor(this.weight, &that.weight, tau);
    this.bias = match (this.bias, &that.bias) {
        (Some(b1), Some(b2)) => Some(soft_update_tensor(b1, b2, tau)),
        (_, _) => None,
    };
    this
}

/// `burn::nn::Linear::weight` is shaped `[in_size, out_size]` (it computes
/// `x @ weight`), while [`LayerParams::weight`] is stored out-major
/// (`weight[o * in + i]`, shape `(out, in)`, §4.1/§9 "Nested parameter
/// trees"). The two conversions below transpose explicitly so every EC-side
/// consumer (`PolicyParams::forward`, mutation, crossover) and every
/// burn-side consumer agree on the same logical weight matrix, including
/// for non-square layers and for RL actors injected into the EC population.
fn load_linear<B: Backend>(mut layer: Linear<B>, proto: &LayerParams, device: &B::Device) -> Linear<B> {
    let (out_size, in_size) = proto.shape;
    let weight_data = Data::new(proto.weight.clone(), [out_size, in_size].into());
    let bias_data = Data::new(proto.bias.clone(), [out_size].into());
    layer.weight = layer.weight.map(|_| {
        let out_in: Tensor<B, 2> = Tensor::from_data(weight_data.clone(), device);
        out_in.transpose()
    });
    layer.bias = layer
        .bias
        .map(|b| b.map(|_| Tensor::from_data(bias_data.clone(), device)));
    layer
}

fn linear_to_params<B: Backend>(layer: &Linear<B>) -> LayerParams {
    let weight = layer.weight.val();
    let dims = weight.dims();
    let (in_size, out_size) = (dims[0], dims[1]);
    let weight_vec: Vec<f32> = weight.transpose().into_data().value;
    let bias_vec: Vec<f32> = layer
        .bias
        .as_ref()
        .map(|b| b.val().into_data().value)
        .unwrap_or_else(|| vec![0.0; out_size]);
    LayerParams {
        weight: weight_vec,
        bias: bias_vec,
        shape: (out_size, in_size),
    }
}
