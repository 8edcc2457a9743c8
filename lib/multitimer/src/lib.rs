// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A timer multiplexer.
//!
//! `Multitimer` lets one periodic hardware tick stand in for any number (up
//! to `N`) of independent logical timers, each owned by some client. It
//! knows nothing about the kernel: the owner type is a parameter, and firing
//! is reported through a callback so the caller decides how to notify.
//!
//! The expected usage model is:
//!
//! - Create a `Multitimer<Owner, N>`.
//!
//! - `register` a timer on behalf of a client whenever one asks.
//!
//! - On every tick of the underlying timer, advance your clock and call
//!   `expire` with the new time.
//!
//! Every tick inspects every slot. `N` is small and fixed, so a linear scan
//! is cheaper than keeping the table sorted.
//!
//! # Time and wraparound
//!
//! Time is a `u32` that wraps. A deadline is considered reached when the
//! signed distance from it to now is non-negative, so comparisons stay
//! correct across the wrap as long as no delay or period exceeds half the
//! range. `register` refuses anything longer than [`MAX_DELAY`].

#![cfg_attr(not(test), no_std)]

/// Table size of the reference system.
pub const DEFAULT_SLOTS: usize = 4;

/// Longest delay (and so period) a timer can be registered with.
pub const MAX_DELAY: u32 = i32::MAX as u32;

/// Checks whether `deadline` has been reached at time `now`, tolerating one
/// wrap of the clock between them.
pub fn has_elapsed(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// One logical timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot<O> {
    /// Who to notify, or `None` if the slot is free.
    pub owner: Option<O>,
    /// Interval between firings, or 0 for a one-shot.
    pub period: u32,
    /// Next time this timer is due.
    pub deadline: u32,
}

impl<O> Slot<O> {
    pub const FREE: Self = Self {
        owner: None,
        period: 0,
        deadline: 0,
    };
}

/// Reasons `register` can refuse a timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterError {
    /// Every slot is armed.
    TableFull,
    /// The delay is over [`MAX_DELAY`], which would put the deadline in
    /// the past as far as [`has_elapsed`] can tell.
    TooLong,
}

pub struct Multitimer<O: Copy + Eq, const N: usize = DEFAULT_SLOTS> {
    slots: [Slot<O>; N],
}

impl<O: Copy + Eq, const N: usize> Default for Multitimer<O, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Copy + Eq, const N: usize> Multitimer<O, N> {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::FREE; N],
        }
    }

    /// Arms a timer for `owner` that is due `delay` after `now`.
    ///
    /// If `repeat` is set the timer keeps firing every `delay` thereafter;
    /// a repeating timer with a zero delay would fire on every tick forever,
    /// so it is treated as a one-shot instead.
    ///
    /// The first free slot is used, scanning from index 0. Returns the slot
    /// index, which the owner can later pass to `cancel`. A delay over
    /// [`MAX_DELAY`] is refused whether or not a slot is free.
    pub fn register(
        &mut self,
        owner: O,
        now: u32,
        delay: u32,
        repeat: bool,
    ) -> Result<usize, RegisterError> {
        if delay > MAX_DELAY {
            return Err(RegisterError::TooLong);
        }
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.owner.is_none())
            .ok_or(RegisterError::TableFull)?;

        *slot = Slot {
            owner: Some(owner),
            period: if repeat { delay } else { 0 },
            deadline: now.wrapping_add(delay),
        };
        Ok(index)
    }

    /// Frees slot `index` if it is armed on behalf of `owner`. Returns
    /// whether anything was freed.
    pub fn cancel(&mut self, owner: O, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.owner == Some(owner) => {
                *slot = Slot::FREE;
                true
            }
            _ => false,
        }
    }

    /// Fires every armed timer whose deadline has been reached at `now`.
    ///
    /// `fire` is called with the owner and the deadline that was reached:
    /// the time the timer was *due*, not `now`. A repeating timer then moves
    /// its deadline forward by exactly one period (so a timer whose period is
    /// shorter than the tick falls behind, and catches up one period per
    /// call); a one-shot frees its slot.
    ///
    /// Returns the number of timers fired.
    pub fn expire(&mut self, now: u32, mut fire: impl FnMut(O, u32)) -> usize {
        let mut fired = 0;
        for slot in &mut self.slots {
            let Some(owner) = slot.owner else {
                continue;
            };
            if !has_elapsed(now, slot.deadline) {
                continue;
            }

            fire(owner, slot.deadline);
            fired += 1;

            if slot.period > 0 {
                slot.deadline = slot.deadline.wrapping_add(slot.period);
            } else {
                *slot = Slot::FREE;
            }
        }
        fired
    }

    pub fn get(&self, index: usize) -> Option<&Slot<O>> {
        self.slots.get(index)
    }

    /// Number of slots currently armed.
    pub fn armed(&self) -> usize {
        self.slots.iter().filter(|s| s.owner.is_some()).count()
    }
}
