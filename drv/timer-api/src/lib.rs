// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the timer driver.
//!
//! Times are in milliseconds and are only as fine as the driver's tick: a
//! timer due at time `t` is noticed on the first tick at or after `t`, and
//! its `PING` carries `t` itself.
//!
//! Every `PING` comes from the timer task, and so does every reply to a
//! registration or cancellation. A task holding a repeating timer should
//! therefore consume its pings with [`Timer::wait_ping`] before making any
//! other call here; a stale ping in the way of a reply is reported as
//! [`ClientError::UnexpectedReply`].

#![no_std]

use userlib::hl::{expect_reply, ClientError};
use userlib::{Kernel, Kind, Message, Source, TaskId};

/// Names one of the driver's timer slots, for [`Timer::cancel`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot(pub u32);

/// Handle on the timer driver task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timer(TaskId);

impl From<TaskId> for Timer {
    fn from(task: TaskId) -> Self {
        Timer(task)
    }
}

impl Timer {
    fn register<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        ms: u32,
        repeat: bool,
    ) -> Result<Slot, ClientError> {
        let reply = kernel.request(
            self.0,
            Message::with_args(Kind::REGISTER, ms, repeat.into()),
        );
        let reply = expect_reply(reply, Kind::OK)?;
        Ok(Slot(reply.args[0]))
    }

    /// Blocks for `ms` milliseconds. Returns the time the delay was due.
    pub fn delay<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        ms: u32,
    ) -> Result<u32, ClientError> {
        self.register(kernel, ms, false)?;
        self.wait_ping(kernel)
    }

    /// Asks for a `PING` every `ms` milliseconds, starting `ms` from now.
    pub fn pulse<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        ms: u32,
    ) -> Result<Slot, ClientError> {
        self.register(kernel, ms, true)
    }

    /// Frees `slot`. Returns `false` if it wasn't ours to free, including
    /// when it was a one-shot that has already fired.
    pub fn cancel<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        slot: Slot,
    ) -> Result<bool, ClientError> {
        let reply =
            kernel.request(self.0, Message::with_args(Kind::CANCEL, slot.0, 0));
        let reply = expect_reply(reply, Kind::OK)?;
        Ok(reply.args[0] != 0)
    }

    /// Blocks until the next `PING` and returns the time it was due.
    pub fn wait_ping<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
    ) -> Result<u32, ClientError> {
        let ping = kernel.receive(Source::Task(self.0));
        let ping = expect_reply(ping, Kind::PING)?;
        Ok(ping.args[0])
    }
}
