// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity byte stack.
//!
//! Bytes `[0, n)` are harvested but not yet handed out. Pushes land at `n`;
//! a pop of `k` takes `[n - k, n)`, the most recent `k` pushes, in push
//! order. Bytes from an older push are only ever returned once everything
//! pushed after them is gone.

pub struct RandomPool<const C: usize> {
    bytes: [u8; C],
    n: usize,
}

impl<const C: usize> Default for RandomPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> RandomPool<C> {
    pub const fn new() -> Self {
        Self {
            bytes: [0; C],
            n: 0,
        }
    }

    /// Adds `byte` on top. Returns `false`, and drops the byte, if the pool
    /// is full.
    pub fn push(&mut self, byte: u8) -> bool {
        match self.bytes.get_mut(self.n) {
            Some(slot) => {
                *slot = byte;
                self.n += 1;
                true
            }
            None => false,
        }
    }

    /// Removes the top `k` bytes, or nothing if fewer than `k` are held.
    pub fn pop(&mut self, k: usize) -> Option<&[u8]> {
        let top = self.n;
        let base = top.checked_sub(k)?;
        self.n = base;
        Some(&self.bytes[base..top])
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn is_full(&self) -> bool {
        self.n == C
    }
}
