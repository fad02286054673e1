//! Per-session sequence counter

use super::{SequenceControl, SequenceFlags, MAX_SEQUENCE_COUNT};

/// Number of distinct sequence counts (14 bits)
pub const SEQUENCE_MODULUS: u32 = MAX_SEQUENCE_COUNT as u32 + 1;

/// Producer-side counter, starts at 0 and wraps at 16384
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Return the current count and advance
    pub fn advance(&mut self) -> u16 {
        let current = self.next;
        self.next = successor(current);
        current
    }

    /// Take the next count as a sequence control word
    pub fn next_control(&mut self, flags: SequenceFlags) -> SequenceControl {
        SequenceControl {
            flags,
            count: self.advance(),
        }
    }

    /// The count the next call to `advance` will return
    pub fn peek(&self) -> u16 {
        self.next
    }
}

/// The count that follows `count`, modulo 16384
pub fn successor(count: u16) -> u16 {
    ((u32::from(count) + 1) % SEQUENCE_MODULUS) as u16
}

/// Number of counts skipped between `previous` and `current`.
/// Zero when `current` directly follows `previous`.
pub fn gap(previous: u16, current: u16) -> u16 {
    let distance =
        (u32::from(current) + SEQUENCE_MODULUS - u32::from(previous)) % SEQUENCE_MODULUS;
    // a repeated count reads as a full lap minus one
    ((distance + SEQUENCE_MODULUS - 1) % SEQUENCE_MODULUS) as u16
}
