// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel ABI definitions, shared between the kernel, driver tasks and their
//! clients.
//!
//! Everything that crosses a task boundary is described here: task
//! identities, the fixed-shape `Message` record, the filters a receiver can
//! apply, and the interrupt lines that drivers arm.

#![no_std]

use core::fmt;

/// Names a task.
///
/// Task identities are fixed when the system is built; driver tasks are
/// created once at startup and never restarted, so there is no generation
/// number to go stale.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TaskId(pub u16);

impl TaskId {
    /// The all-ones `TaskId` is reserved to represent the "virtual kernel
    /// task." Timeouts arrive from this sender.
    pub const KERNEL: Self = Self(!0);

    /// Reserved `TaskId` for interrupt notifications. A driver that has armed
    /// an interrupt line receives each event as an `INTERRUPT` message from
    /// this sender.
    pub const HARDWARE: Self = Self(!0 - 1);

    /// Checks whether this names one of the two virtual senders rather than a
    /// real task.
    pub fn is_virtual(self) -> bool {
        self == Self::KERNEL || self == Self::HARDWARE
    }
}

/// Type tag carried by every message.
///
/// The kinds used by the drivers are associated constants; any other value is
/// free for applications to define among themselves.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Kind(pub u16);

impl Kind {
    /// Hardware event on an armed interrupt line.
    pub const INTERRUPT: Self = Self(1);
    /// Client asks a driver to perform its operation.
    pub const REQUEST: Self = Self(2);
    /// Successful reply to a `REQUEST`, `REGISTER` or `CANCEL`.
    pub const OK: Self = Self(3);
    /// Client asks the timer driver for a notification.
    pub const REGISTER: Self = Self(4);
    /// Timer notification; slot 0 carries the due time.
    pub const PING: Self = Self(5);
    /// No matching message arrived within a bounded receive.
    pub const TIMEOUT: Self = Self(6);
    /// Client asks the timer driver to free one of its slots.
    pub const CANCEL: Self = Self(7);
    /// Driver declined a request it is configured to survive.
    pub const REFUSED: Self = Self(8);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::INTERRUPT => "INTERRUPT",
            Self::REQUEST => "REQUEST",
            Self::OK => "OK",
            Self::REGISTER => "REGISTER",
            Self::PING => "PING",
            Self::TIMEOUT => "TIMEOUT",
            Self::CANCEL => "CANCEL",
            Self::REFUSED => "REFUSED",
            _ => return None,
        })
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Kind({})", self.0),
        }
    }
}

/// Number of integer payload slots in a `Message`.
pub const MESSAGE_ARGS: usize = 2;

/// A fixed-shape message.
///
/// Messages are small enough to copy and are never queued beyond the one
/// outstanding message each sender may have. The `sender` field is filled in
/// by the transport; whatever the sender puts there is overwritten.
///
/// A message may also lend a writable buffer to the receiver for the duration
/// of a request; `lease_len` is that buffer's length (zero if none was lent),
/// and the receiver writes into it through the kernel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub kind: Kind,
    pub sender: TaskId,
    pub args: [u32; MESSAGE_ARGS],
    pub lease_len: usize,
}

impl Message {
    pub const fn new(kind: Kind) -> Self {
        Self::with_args(kind, 0, 0)
    }

    pub const fn with_args(kind: Kind, a0: u32, a1: u32) -> Self {
        Self {
            kind,
            sender: TaskId::KERNEL,
            args: [a0, a1],
            lease_len: 0,
        }
    }

    /// Shorthand for an `OK` reply carrying one value.
    pub const fn ok(value: u32) -> Self {
        Self::with_args(Kind::OK, value, 0)
    }

    /// Returns this message as the transport would deliver it from
    /// `sender`.
    pub const fn with_sender(mut self, sender: TaskId) -> Self {
        self.sender = sender;
        self
    }
}

/// Filter applied by a receiving task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// Accept the oldest message from anyone, including the hardware.
    Any,
    /// Accept only interrupt notifications.
    Hardware,
    /// Accept only messages from this task.
    Task(TaskId),
}

impl Source {
    pub fn admits(self, sender: TaskId) -> bool {
        match self {
            Source::Any => true,
            Source::Hardware => sender == TaskId::HARDWARE,
            Source::Task(t) => sender == t,
        }
    }
}

/// Newtype wrapper for an interrupt line number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct IrqLine(pub u8);

impl IrqLine {
    /// Lines are numbered within a single 32-bit enable register.
    pub const COUNT: u8 = 32;
}

/// Interrupt lines of the peripherals driven in this workspace, numbered as
/// on the nRF51.
pub mod irq {
    use super::IrqLine;

    pub const ADC: IrqLine = IrqLine(7);
    pub const TIMER1: IrqLine = IrqLine(9);
    pub const TEMP: IrqLine = IrqLine(12);
    pub const RNG: IrqLine = IrqLine(13);

    static_assertions::const_assert!(RNG.0 < IrqLine::COUNT);
}
