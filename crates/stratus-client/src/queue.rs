//! Outbound FIFO queues drained by the packetizer.

use std::collections::VecDeque;

use stratus_common::BatchLimits;
use stratus_core::{ControllerFrame, FrameMetadata, KeyboardFrame, MouseFrame, PointerFrame};

/// Unbounded FIFO of pending frames.
#[derive(Debug, Clone)]
pub struct FrameQueue<T> {
    items: VecDeque<T>,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> FrameQueue<T> {
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove up to `limit - 1` items from the front, oldest first.
    pub fn drain_batch(&mut self, limit: usize) -> Vec<T> {
        let take = self.items.len().min(limit.saturating_sub(1));
        self.items.drain(..take).collect()
    }
}

/// Frames removed from the queues in one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Drained {
    pub metadata: Vec<FrameMetadata>,
    pub controller: Vec<ControllerFrame>,
    pub pointer: Vec<PointerFrame>,
    pub mouse: Vec<MouseFrame>,
    pub keyboard: Vec<KeyboardFrame>,
}

impl Drained {
    /// Mouse and keyboard activity alone never produces a packet.
    pub fn triggers_send(&self) -> bool {
        !self.metadata.is_empty() || !self.controller.is_empty() || !self.pointer.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.triggers_send() && self.mouse.is_empty() && self.keyboard.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
pub struct OutboundQueues {
    pub metadata: FrameQueue<FrameMetadata>,
    pub controller: FrameQueue<ControllerFrame>,
    pub pointer: FrameQueue<PointerFrame>,
    pub mouse: FrameQueue<MouseFrame>,
    pub keyboard: FrameQueue<KeyboardFrame>,
}

impl OutboundQueues {
    pub fn drain(&mut self, limits: &BatchLimits) -> Drained {
        Drained {
            metadata: self.metadata.drain_batch(limits.metadata),
            controller: self.controller.drain_batch(limits.controller),
            pointer: self.pointer.drain_batch(limits.pointer),
            mouse: self.mouse.drain_batch(limits.mouse),
            keyboard: self.keyboard.drain_batch(limits.keyboard),
        }
    }

    pub fn clear(&mut self) {
        self.metadata.clear();
        self.controller.clear();
        self.pointer.clear();
        self.mouse.clear();
        self.keyboard.clear();
    }
}
