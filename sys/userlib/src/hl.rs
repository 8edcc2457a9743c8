// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level driver and client helpers.
//!
//! This is intended to provide a more ergonomic interface than calling the
//! [`Kernel`] methods directly, and to write the interrupt-rendezvous
//! sequence down exactly once.

use abi::{IrqLine, Kind, Message, Source, TaskId};

use crate::{Fault, Kernel, LeaseError};

/// Blocks until the next interrupt notification on `line`.
///
/// Only hardware messages are accepted, so client requests that arrive in the
/// meantime stay queued in the transport until the driver returns to its
/// top-level wait. Anything from the hardware other than an `INTERRUPT` for
/// `line` is a protocol violation.
pub fn await_interrupt<K: Kernel + ?Sized>(
    kernel: &mut K,
    line: IrqLine,
) -> Result<(), Fault> {
    let m = kernel.receive(Source::Hardware);
    if is_interrupt(&m, line) {
        Ok(())
    } else {
        Err(Fault::protocol(&m))
    }
}

/// Checks whether `m` is the hardware's notification for `line`.
pub fn is_interrupt(m: &Message, line: IrqLine) -> bool {
    m.kind == Kind::INTERRUPT
        && m.sender == TaskId::HARDWARE
        && m.args[0] == u32::from(line.0)
}

/// A peripheral that performs one operation per client request and signals
/// completion with a single interrupt.
///
/// Implementors own the peripheral's registers. [`serve_one_shot`] supplies
/// the protocol around them.
pub trait OneShot {
    /// The line the completion interrupt arrives on.
    fn line(&self) -> IrqLine;

    /// Programs the peripheral to begin the operation described by
    /// `request`. Returning an error leaves the peripheral idle.
    fn start(&mut self, request: &Message) -> Result<(), Fault>;

    /// Called once the completion interrupt has arrived. Reads the result and
    /// clears whatever device status caused the interrupt; the line is
    /// re-armed only after this returns.
    fn complete(&mut self) -> Result<u32, Fault>;
}

/// Result of one successful [`serve_one_shot`] cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Served {
    pub client: TaskId,
    pub value: u32,
}

/// Runs one Idle -> Busy -> Idle cycle of a single-owner driver.
///
/// - Idle: receive from anyone; anything other than a `REQUEST` is a protocol
///   violation.
/// - Busy: start the device, then wait on the hardware only.
/// - Complete the device (read, clear status), *then* rearm, then reply `OK`
///   with the result to the client recorded in Idle.
///
/// Only one request is ever in flight; other clients stay blocked in their
/// `request` until we come back around.
pub fn serve_one_shot<K, D>(kernel: &mut K, device: &mut D) -> Result<Served, Fault>
where
    K: Kernel + ?Sized,
    D: OneShot + ?Sized,
{
    let m = kernel.receive(Source::Any);
    if m.kind != Kind::REQUEST {
        return Err(Fault::protocol(&m));
    }
    let client = m.sender;

    device.start(&m)?;
    await_interrupt(kernel, device.line())?;
    let value = device.complete()?;
    kernel.rearm(device.line());

    Caller::from(client).reply_ok(kernel, value);
    Ok(Served { client, value })
}

/// A handle to a task that is blocked waiting for our reply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Caller {
    id: TaskId,
}

impl From<TaskId> for Caller {
    fn from(id: TaskId) -> Self {
        Caller { id }
    }
}

impl Caller {
    /// Sends an `OK` reply carrying `value`.
    pub fn reply_ok<K: Kernel + ?Sized>(self, kernel: &mut K, value: u32) {
        kernel.send(self.id, Message::ok(value));
    }

    /// Copies `src` into the caller's lease, starting at `offset`.
    pub fn write_fully_at<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        offset: usize,
        src: &[u8],
    ) -> Result<(), Fault> {
        kernel
            .write_lease(self.id, offset, src)
            .map_err(|_: LeaseError| Fault::LeaseWentAway { client: self.id })
    }
}

/// Errors a client can see from a driver's reply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClientError {
    /// The driver answered with a kind we weren't expecting.
    UnexpectedReply { kind: Kind },
    /// The driver is configured to survive this request and declined it.
    Refused,
}

/// Checks that `reply` has kind `expected`.
pub fn expect_reply(reply: Message, expected: Kind) -> Result<Message, ClientError> {
    if reply.kind == expected {
        Ok(reply)
    } else if reply.kind == Kind::REFUSED {
        Err(ClientError::Refused)
    } else {
        Err(ClientError::UnexpectedReply { kind: reply.kind })
    }
}
