mod buffer;

pub use buffer::{ReplayBuffer, Transition, TransitionBatch};
