use rand::Rng;

use crate::ds::RingBuffer;
use crate::error::{EngineError, Result};
use crate::rng::Key;

/// One `(obs, action, reward, next_obs, termination)` transition (§3
/// `ReplayBuffer`). `termination` records only natural episode end (not
/// truncation), so TD3 bootstraps correctly through a truncated episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub obs: Vec<f32>,
    pub action: Vec<f32>,
    pub reward: f32,
    pub next_obs: Vec<f32>,
    pub termination: bool,
}

/// A sampled minibatch, struct-of-arrays shaped for direct tensor conversion.
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    pub obs: Vec<Vec<f32>>,
    pub action: Vec<Vec<f32>>,
    pub reward: Vec<f32>,
    pub next_obs: Vec<Vec<f32>>,
    pub termination: Vec<bool>,
}

/// C3: fixed-capacity ring of transitions with uniform batch sampling.
///
/// Grounded on `benbaarber-rl/src/ds/ring_buffer.rs`'s `RingBuffer<T>` and
/// `src/memory/base.rs`'s `ReplayMemory<E>` wrapping it; reworked here to
/// hold flat transitions instead of whole episodes, since `add` must accept
/// only the valid (non-padding) prefix of a rollout (§4.3).
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    ring: RingBuffer<Transition>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn size(&self) -> usize {
        self.ring.len()
    }

    pub fn write_idx(&self) -> usize {
        self.ring.write_ix()
    }

    /// `add(batch, mask)`: append every transition flagged by `mask` (or all,
    /// if `mask` is `None`), in order. On overflow, wraps and overwrites the
    /// oldest. This is strategy (a) of §4.3: the caller passes only the
    /// valid prefix, so no padding timestep is ever written.
    pub fn add(&mut self, batch: Vec<Transition>, mask: Option<&[bool]>) {
        match mask {
            None => {
                for t in batch {
                    self.ring.push(t);
                }
            }
            Some(mask) => {
                assert_eq!(mask.len(), batch.len());
                for (t, &keep) in batch.into_iter().zip(mask) {
                    if keep {
                        self.ring.push(t);
                    }
                }
            }
        }
    }

    /// `sample(batch_size, key)`: draw `batch_size` indices uniformly in
    /// `[0, size)` with replacement.
    pub fn sample(&self, batch_size: usize, key: Key) -> Result<TransitionBatch> {
        let size = self.size();
        if size == 0 {
            log::warn!("sample requested {batch_size} transitions but the buffer is empty");
            return Err(EngineError::EmptyBuffer {
                available: 0,
                required: batch_size,
            });
        }
        let mut rng = key.into_rng();
        let mut obs = Vec::with_capacity(batch_size);
        let mut action = Vec::with_capacity(batch_size);
        let mut reward = Vec::with_capacity(batch_size);
        let mut next_obs = Vec::with_capacity(batch_size);
        let mut termination = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let ix = rng.gen_range(0..size);
            let t = &self.ring[ix];
            obs.push(t.obs.clone());
            action.push(t.action.clone());
            reward.push(t.reward);
            next_obs.push(t.next_obs.clone());
            termination.push(t.termination);
        }
        Ok(TransitionBatch {
            obs,
            action,
            reward,
            next_obs,
            termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(i: f32) -> Transition {
        Transition {
            obs: vec![i],
            action: vec![i],
            reward: i,
            next_obs: vec![i + 1.0],
            termination: false,
        }
    }

    #[test]
    fn capacity_and_write_idx_after_overflow() {
        let mut buf = ReplayBuffer::new(5);
        let batch: Vec<_> = (0..12).map(|i| dummy(i as f32)).collect();
        buf.add(batch, None);
        assert_eq!(buf.size(), 5.min(12));
        assert_eq!(buf.write_idx(), 12 % 5);
    }

    #[test]
    fn mask_strips_padding_timesteps() {
        let mut buf = ReplayBuffer::new(100);
        let batch: Vec<_> = (0..10).map(|i| dummy(i as f32)).collect();
        let mask = vec![true, true, true, false, false, false, false, false, false, false];
        buf.add(batch, Some(&mask));
        assert_eq!(buf.size(), 3, "only unmasked transitions are written");
    }

    #[test]
    fn sample_on_empty_buffer_is_empty_buffer_error() {
        let buf = ReplayBuffer::new(10);
        let err = buf.sample(4, Key::from_seed(0));
        assert!(matches!(err, Err(EngineError::EmptyBuffer { .. })));
    }

    #[test]
    fn sample_returns_requested_batch_size() {
        let mut buf = ReplayBuffer::new(10);
        buf.add((0..10).map(|i| dummy(i as f32)).collect(), None);
        let batch = buf.sample(7, Key::from_seed(1)).unwrap();
        assert_eq!(batch.obs.len(), 7);
        assert_eq!(batch.reward.len(), 7);
    }
}
