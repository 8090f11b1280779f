use burn::tensor::backend::Backend;
use burn::tensor::{Data, Tensor};

use crate::collector::ActorPolicy;
use crate::env::Box as ActionBox;

use super::mlp::Mlp;
use super::params::PolicyParams;

/// Bridges an EC-side [`PolicyParams`] candidate into the [`ActorPolicy`]
/// contract the collector expects, without touching `burn` at all.
pub struct ParamsPolicy<'a> {
    pub params: &'a PolicyParams,
    pub action_space: &'a ActionBox,
}

impl ActorPolicy for ParamsPolicy<'_> {
    fn act(&self, obs: &[f32]) -> Vec<f32> {
        self.params
            .forward(obs, &self.action_space.low, &self.action_space.high)
    }
}

/// Bridges a live `burn` actor module into the [`ActorPolicy`] contract.
/// Every call runs one single-observation forward pass; this crate does not
/// attempt to batch the collector's rollout loop into one tensor op (see
/// `DESIGN.md`'s note on `burn` lacking `vmap`).
pub struct NetPolicy<'a, B: Backend> {
    pub net: &'a Mlp<B>,
    pub action_space: &'a ActionBox,
    pub device: &'a B::Device,
}

impl<B: Backend> ActorPolicy for NetPolicy<'_, B> {
    fn act(&self, obs: &[f32]) -> Vec<f32> {
        let dim = obs.len();
        let input: Tensor<B, 2> =
            Tensor::from_data(Data::new(obs.to_vec(), [1, dim].into()), self.device);
        let out = self
            .net
            .forward_actor(input, self.action_space.low[0], self.action_space.high[0]);
        out.into_data().value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::params::LayerParams;

    #[test]
    fn params_policy_delegates_to_forward() {
        let params = PolicyParams {
            hidden: vec![LayerParams::zeros(2, 3)],
            head: LayerParams::zeros(3, 1),
        };
        let action_space = ActionBox::new(vec![-1.0], vec![1.0]);
        let policy = ParamsPolicy {
            params: &params,
            action_space: &action_space,
        };
        let action = policy.act(&[0.5, -0.5]);
        assert_eq!(action.len(), 1);
        assert!(action[0] >= -1.0 && action[0] <= 1.0);
    }
}
