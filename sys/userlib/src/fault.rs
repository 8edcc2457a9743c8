// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver faults and what to do about them.
//!
//! Every driver step returns `Result<_, Fault>`. The decision to stop the
//! system is made in one place, [`dispose`], according to a [`Policy`] fixed
//! when the driver is built.

use abi::{Kind, Message, TaskId};

use crate::Kernel;

/// Everything that can go wrong inside a driver task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fault {
    /// A message of a kind the driver can't accept in its current state.
    /// This is a programming error in a client or driver.
    Protocol { kind: Kind, sender: TaskId },
    /// A status flag the driver relies on was not set when the completion
    /// interrupt arrived. The driver and device no longer agree.
    Hardware,
    /// The timer driver's slot table is full.
    TimersExhausted { client: TaskId },
    /// A request's parameters can never be satisfied, e.g. more random bytes
    /// than the pool can hold.
    BadRequest { client: TaskId },
    /// The client's lease vanished or was too short to receive the reply.
    LeaseWentAway { client: TaskId },
}

impl Fault {
    pub fn protocol(msg: &Message) -> Self {
        Fault::Protocol {
            kind: msg.kind,
            sender: msg.sender,
        }
    }
}

/// How a driver reacts to faults.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Policy {
    /// Every fault halts the system.
    #[default]
    FailFast,
    /// Resource exhaustion is reported to the requesting client with a
    /// `REFUSED` reply and the driver carries on. Everything else halts.
    ReportExhaustion,
}

/// Outcome of applying a `Policy` to a `Fault`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Disposition {
    Halt,
    Refuse(TaskId),
}

impl Policy {
    pub fn judge(self, fault: Fault) -> Disposition {
        match (self, fault) {
            (Policy::ReportExhaustion, Fault::TimersExhausted { client }) => {
                Disposition::Refuse(client)
            }
            _ => Disposition::Halt,
        }
    }
}

/// Applies `policy` to `fault`: either tells the culprit no, or halts.
pub fn dispose<K: Kernel + ?Sized>(kernel: &mut K, policy: Policy, fault: Fault) {
    match policy.judge(fault) {
        Disposition::Refuse(client) => {
            kernel.send(client, Message::new(Kind::REFUSED));
        }
        Disposition::Halt => kernel.halt(fault),
    }
}
