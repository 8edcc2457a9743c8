// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User support library for driver tasks and their clients.
//!
//! This contains the contract every task has with the kernel, expressed as
//! the [`Kernel`] trait, and re-exports the contents of the `abi` crate that
//! gets shared with the kernel.
//!
//! # Why a trait?
//!
//! Driver tasks never name the kernel directly. Each is handed something that
//! implements [`Kernel`] when it is started, and every point where a task can
//! block goes through it. On target
//! that's the syscall layer; on a development host it's the fake kernel in
//! `test/fake-kern`. The drivers themselves can't tell the difference.
//!
//! # Interrupts
//!
//! Interrupts are not handled in interrupt context by anything in this
//! workspace. The kernel turns each hardware event on an *armed* line into a
//! single `INTERRUPT` message from [`TaskId::HARDWARE`] and masks the line.
//! The driver services the device and then calls [`Kernel::rearm`]. The
//! device's status condition must be cleared *before* rearming; see
//! [`hl::serve_one_shot`] for the one place that sequence is written down.

#![no_std]

pub use abi::*;

pub mod fault;
pub mod hl;

pub use fault::{Fault, Policy};

/// Services a task consumes from the kernel.
///
/// Every method is called from the task's own (single) thread of control.
/// The only methods that can block are `receive`, `receive_timeout`,
/// `request` and `request_with_lease`.
pub trait Kernel {
    /// Deposits `msg` for `dest` and returns without waiting for it to be
    /// received. The transport fills in `msg.sender`.
    fn send(&mut self, dest: TaskId, msg: Message);

    /// Blocks until a message admitted by `source` is available and returns
    /// it. Messages from one sender are received in the order sent.
    fn receive(&mut self, source: Source) -> Message;

    /// Like `receive`, but gives up after `ticks` time units have passed on
    /// the OS clock (see [`Kernel::tick`]). Giving up produces a message of
    /// kind [`Kind::TIMEOUT`] from [`TaskId::KERNEL`].
    fn receive_timeout(&mut self, source: Source, ticks: u32) -> Message;

    /// Sends `msg` to `dest` and blocks until `dest` sends something back,
    /// returning that. From the caller's point of view this is atomic: no
    /// other task's message can be mistaken for the reply.
    fn request(&mut self, dest: TaskId, msg: Message) -> Message {
        self.send(dest, msg);
        self.receive(Source::Task(dest))
    }

    /// Variant of `request` that lends `lease` to `dest` for the duration of
    /// the exchange. `dest` may write into it with [`Kernel::write_lease`]
    /// until it replies.
    fn request_with_lease(
        &mut self,
        dest: TaskId,
        msg: Message,
        lease: &mut [u8],
    ) -> Message;

    /// Writes `data` into the buffer lent by `lender`, starting at `offset`.
    fn write_lease(
        &mut self,
        lender: TaskId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), LeaseError>;

    /// Enables delivery of the next event on `line` to the calling task.
    fn arm(&mut self, line: IrqLine);

    /// Re-enables delivery on `line` after the previous event has been fully
    /// serviced. Re-arming a line that is already armed does nothing.
    fn rearm(&mut self, line: IrqLine);

    /// Advances the OS clock used by `receive_timeout` by `elapsed` time
    /// units. Called by the timer driver on every tick.
    fn tick(&mut self, elapsed: u32);

    /// Stops the whole system. There is no per-task recovery: the smallest
    /// unit that can be restarted is the device.
    fn halt(&mut self, fault: Fault) -> !;
}

/// Reasons a lease write can fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LeaseError {
    /// The lender isn't blocked in a request to us, or lent nothing.
    WentAway,
    /// The write would run past the end of the lent buffer.
    OutOfRange,
}
