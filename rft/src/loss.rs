//! Outgoing packet loss simulation
//!
//! The sender consults a [`LossHook`] right before each datagram would be
//! written. A dropped datagram is still recorded as outstanding and guarded by
//! its retransmission timer, so recovery goes through the normal timeout path.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Decides whether an outgoing packet is dropped
pub trait LossHook: Send {
    /// Return `true` to drop this send of `seq` (`attempt` starts at 1)
    fn should_drop(&mut self, seq: u32, attempt: u32) -> bool;
}

/// Never drops anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoss;

impl LossHook for NoLoss {
    fn should_drop(&mut self, _seq: u32, _attempt: u32) -> bool {
        false
    }
}

/// Drops each packet independently with a fixed probability
#[derive(Debug)]
pub struct RandomLoss {
    probability: f64,
    rng: StdRng,
}

impl RandomLoss {
    /// Create with an entropy-seeded generator
    pub fn new(probability: f64) -> Self {
        Self::with_rng(probability, StdRng::from_entropy())
    }

    /// Create with a fixed seed, for reproducible runs
    pub fn seeded(probability: f64, seed: u64) -> Self {
        Self::with_rng(probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(probability: f64, rng: StdRng) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        RandomLoss { probability, rng }
    }

    /// Drop probability
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl LossHook for RandomLoss {
    fn should_drop(&mut self, _seq: u32, _attempt: u32) -> bool {
        self.probability > 0.0 && self.rng.gen_bool(self.probability)
    }
}

/// Drops the first send of each listed sequence number, once
#[derive(Debug, Clone, Default)]
pub struct DropOnce {
    pending: HashSet<u32>,
}

impl DropOnce {
    /// Drop the first transmission of every sequence number in `seqs`
    pub fn new(seqs: impl IntoIterator<Item = u32>) -> Self {
        DropOnce {
            pending: seqs.into_iter().collect(),
        }
    }

    /// Sequence numbers that have not been dropped yet
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl LossHook for DropOnce {
    fn should_drop(&mut self, seq: u32, _attempt: u32) -> bool {
        self.pending.remove(&seq)
    }
}

impl<F> LossHook for F
where
    F: FnMut(u32, u32) -> bool + Send,
{
    fn should_drop(&mut self, seq: u32, attempt: u32) -> bool {
        self(seq, attempt)
    }
}
