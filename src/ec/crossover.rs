use rand::Rng;

use crate::net::params::{LayerParams, PolicyParams};
use crate::rng::Key;

/// Single-point MLP crossover (§4.5 "MLP crossover"): for each layer tensor,
/// pick a random split index along the output axis; the child is
/// `concat(parent_a[:k], parent_b[k:])`, applied to weight rows and the
/// matching bias entries together so neuron alignment is preserved.
pub fn crossover(parent_a: &PolicyParams, parent_b: &PolicyParams, key: Key) -> PolicyParams {
    let mut rng = key.into_rng();
    let cross_layer = |a: &LayerParams, b: &LayerParams, rng: &mut rand_chacha::ChaCha8Rng| -> LayerParams {
        let (out_size, in_size) = a.shape;
        let k = rng.gen_range(0..=out_size);
        let mut weight = Vec::with_capacity(a.weight.len());
        let mut bias = Vec::with_capacity(a.bias.len());
        for o in 0..out_size {
            let source = if o < k { a } else { b };
            weight.extend_from_slice(&source.weight[o * in_size..(o + 1) * in_size]);
            bias.push(source.bias[o]);
        }
        LayerParams {
            weight,
            bias,
            shape: a.shape,
        }
    };

    let hidden = parent_a
        .hidden
        .iter()
        .zip(&parent_b.hidden)
        .map(|(a, b)| cross_layer(a, b, &mut rng))
        .collect();
    let head = cross_layer(&parent_a.head, &parent_b.head, &mut rng);
    PolicyParams { hidden, head }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(value: f32) -> PolicyParams {
        let mut p = PolicyParams {
            hidden: vec![LayerParams::zeros(2, 4)],
            head: LayerParams::zeros(4, 2),
        };
        for w in p.hidden[0].weight.iter_mut() {
            *w = value;
        }
        for b in p.hidden[0].bias.iter_mut() {
            *b = value;
        }
        p
    }

    #[test]
    fn child_rows_come_only_from_one_parent_each() {
        let a = named(1.0);
        let b = named(2.0);
        let child = crossover(&a, &b, Key::from_seed(0));
        let (out_size, in_size) = child.hidden[0].shape;
        for o in 0..out_size {
            let row = &child.hidden[0].weight[o * in_size..(o + 1) * in_size];
            let bias = child.hidden[0].bias[o];
            let all_from_a = row.iter().all(|&w| w == 1.0) && bias == 1.0;
            let all_from_b = row.iter().all(|&w| w == 2.0) && bias == 2.0;
            assert!(all_from_a || all_from_b, "row {o} mixes parents");
        }
    }

    #[test]
    fn crossover_is_deterministic_given_key() {
        let a = named(1.0);
        let b = named(2.0);
        let c1 = crossover(&a, &b, Key::from_seed(9));
        let c2 = crossover(&a, &b, Key::from_seed(9));
        assert_eq!(c1, c2);
    }
}
