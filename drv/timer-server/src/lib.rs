// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timer multiplexing driver.
//!
//! Use the timer-api crate to interact with this driver.
//!
//! TIMER1 is run as a free-running periodic tick (every [`Config::tick`]
//! milliseconds). The driver counts ticks into a wrapping millisecond clock
//! and, on every tick, walks a small [`Multitimer`] table of client timers,
//! sending each one that has come due a `PING`. The same tick drives the
//! kernel's own timeouts.
//!
//! Requests:
//!
//! - `REGISTER(ms, repeat)`: arm a timer in the first free slot. The reply is
//!   `OK` with the slot index. A full table is a [`Fault::TimersExhausted`],
//!   which halts the system unless the driver was configured with
//!   [`Policy::ReportExhaustion`], in which case the client is told
//!   `REFUSED`. A delay over [`multitimer::MAX_DELAY`] (about 24 days) is a
//!   [`Fault::BadRequest`].
//! - `CANCEL(slot)`: free a slot the client owns. The reply is `OK` with 1
//!   if something was freed, else 0.

#![cfg_attr(target_os = "none", no_std)]

use multitimer::{Multitimer, RegisterError, DEFAULT_SLOTS};
use ringbuf::{ringbuf, ringbuf_entry};
use userlib::fault::{self, Fault, Policy};
use userlib::hl::{self, Caller};
use userlib::{irq, Kernel, Kind, Message, Source, TaskId};

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// TIMER1, as far as this driver uses it.
pub trait TimerRegisters {
    /// Configures 16-bit timer mode at 1 MHz, with compare channel 0 set to
    /// `tick_ms` milliseconds and shorted to clear, enables the COMPARE0
    /// interrupt, and starts counting.
    fn start(&mut self, tick_ms: u32);

    /// Whether the COMPARE0 event is set.
    fn compare_fired(&self) -> bool;

    fn clear_compare(&mut self);
}

/// Driver configuration, fixed when the task is built.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Milliseconds between hardware ticks.
    pub tick: u32,
    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick: 5,
            policy: Policy::FailFast,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Tick { now: u32, fired: usize },
    Spurious,
    Registered { client: TaskId, slot: usize, deadline: u32 },
    Cancelled { client: TaskId, slot: u32, freed: bool },
    Fault(Fault),
}

ringbuf!(Trace, 32, Trace::None);

/// What one call to [`TimerServer::serve`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handled {
    /// A hardware tick; `fired` timers were due.
    Tick { fired: usize },
    /// An interrupt with no compare event behind it.
    Spurious,
    Registered { client: TaskId, slot: usize },
    Cancelled { client: TaskId, freed: bool },
}

pub struct TimerServer<R, const N: usize = DEFAULT_SLOTS> {
    regs: R,
    config: Config,
    now: u32,
    timers: Multitimer<TaskId, N>,
}

impl<R: TimerRegisters, const N: usize> TimerServer<R, N> {
    pub fn init<K: Kernel + ?Sized>(
        mut regs: R,
        config: Config,
        kernel: &mut K,
    ) -> Self {
        regs.start(config.tick);
        kernel.arm(irq::TIMER1);
        TimerServer {
            regs,
            config,
            now: 0,
            timers: Multitimer::new(),
        }
    }

    /// Milliseconds counted since `init`, modulo 2^32.
    pub fn now(&self) -> u32 {
        self.now
    }

    /// Number of slots currently armed.
    pub fn armed(&self) -> usize {
        self.timers.armed()
    }

    /// Handles exactly one message.
    pub fn serve<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> Result<Handled, Fault> {
        let m = kernel.receive(Source::Any);
        match m.kind {
            Kind::INTERRUPT if hl::is_interrupt(&m, irq::TIMER1) => {
                Ok(self.tick(kernel))
            }
            Kind::REGISTER => self.register(kernel, &m),
            Kind::CANCEL => Ok(self.cancel(kernel, &m)),
            _ => Err(Fault::protocol(&m)),
        }
    }

    pub fn run<K: Kernel + ?Sized>(mut self, kernel: &mut K) -> ! {
        loop {
            if let Err(f) = self.serve(kernel) {
                ringbuf_entry!(Trace::Fault(f));
                fault::dispose(kernel, self.config.policy, f);
            }
        }
    }

    fn tick<K: Kernel + ?Sized>(&mut self, kernel: &mut K) -> Handled {
        let handled = if self.regs.compare_fired() {
            self.now = self.now.wrapping_add(self.config.tick);
            self.regs.clear_compare();
            kernel.tick(self.config.tick);

            let fired = self.timers.expire(self.now, |owner, due| {
                kernel.send(owner, Message::with_args(Kind::PING, due, 0));
            });
            ringbuf_entry!(Trace::Tick {
                now: self.now,
                fired
            });
            Handled::Tick { fired }
        } else {
            ringbuf_entry!(Trace::Spurious);
            Handled::Spurious
        };
        kernel.rearm(irq::TIMER1);
        handled
    }

    fn register<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
        m: &Message,
    ) -> Result<Handled, Fault> {
        let client = m.sender;
        let (delay, repeat) = (m.args[0], m.args[1] != 0);
        let slot = self
            .timers
            .register(client, self.now, delay, repeat)
            .map_err(|e| match e {
                RegisterError::TableFull => Fault::TimersExhausted { client },
                RegisterError::TooLong => Fault::BadRequest { client },
            })?;

        ringbuf_entry!(Trace::Registered {
            client,
            slot,
            deadline: self.now.wrapping_add(delay)
        });
        Caller::from(client).reply_ok(kernel, slot as u32);
        Ok(Handled::Registered { client, slot })
    }

    fn cancel<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
        m: &Message,
    ) -> Handled {
        let (client, slot) = (m.sender, m.args[0]);
        let freed = self.timers.cancel(client, slot as usize);
        ringbuf_entry!(Trace::Cancelled {
            client,
            slot,
            freed
        });
        Caller::from(client).reply_ok(kernel, freed.into());
        Handled::Cancelled { client, freed }
    }
}
