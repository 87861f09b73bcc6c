use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// One object value change published by a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub object_index: usize,
    pub offset: u32,
    pub value: i32,
    pub timestamp: DateTime<Local>,
    /// Shared by all events of one read, increasing from read to read
    pub sequence: u32,
}

/// Destination of change events.
pub trait EventQueue {
    fn push(&mut self, event: ChangeEvent);
}

impl EventQueue for Vec<ChangeEvent> {
    fn push(&mut self, event: ChangeEvent) {
        Vec::push(self, event);
    }
}

/// Bounded FIFO. When full the oldest event is dropped and the overflow
/// flag is set until taken.
#[derive(Debug, Clone)]
pub struct BufferedEventQueue {
    events: VecDeque<ChangeEvent>,
    capacity: usize,
    overflowed: bool,
}

impl BufferedEventQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pop(&mut self) -> Option<ChangeEvent> {
        self.events.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.events.drain(..)
    }

    /// Returns whether events were lost since the last call.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }
}

impl EventQueue for BufferedEventQueue {
    fn push(&mut self, event: ChangeEvent) {
        if self.events.len() >= self.capacity {
            if !self.overflowed {
                warn!("Event queue full ({} events), dropping oldest", self.capacity);
            }
            self.events.pop_front();
            self.overflowed = true;
        }
        self.events.push_back(event);
    }
}
