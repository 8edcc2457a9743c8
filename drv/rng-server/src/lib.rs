// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the nRF51 random number generator.
//!
//! Use the rng-api crate to interact with this driver.
//!
//! Unlike the converters, the generator is started once and left running.
//! Every byte it produces raises an interrupt, and the driver drains each one
//! into a [`RandomPool`] whether or not anyone is asking, so requests can
//! usually be answered without waiting for the hardware at all.
//!
//! A request for more bytes than the pool holds waits for the hardware, and
//! *only* the hardware, until there are enough. Other clients' requests stay
//! queued in the kernel meanwhile, so clients are served strictly one at a
//! time just as with the other drivers.

#![cfg_attr(target_os = "none", no_std)]

use drv_rng_api::POOL_CAPACITY;
use ringbuf::{ringbuf, ringbuf_entry};
use userlib::fault::{self, Fault, Policy};
use userlib::hl::{self, Caller, Served};
use userlib::{irq, Kernel, Kind, Message, Source, TaskId};

mod pool;
pub use pool::RandomPool;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// The generator's registers.
pub trait RngRegisters {
    /// Enables bias correction, clears VALRDY, starts the generator and
    /// enables the VALRDY interrupt.
    fn start(&mut self);

    fn value_ready(&self) -> bool;

    fn clear_value_ready(&mut self);

    /// The most recently generated byte.
    fn value(&self) -> u8;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Harvested { held: usize },
    PoolFull,
    Spurious,
    Request { client: TaskId, count: usize },
    Starved { held: usize },
    Delivered { client: TaskId, count: usize },
    Fault(Fault),
}

ringbuf!(Trace, 32, Trace::None);

/// What one call to [`RngServer::serve`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Handled {
    /// Took an interrupt while idle.
    Interrupt,
    /// Answered a request; `value` is the number of bytes delivered.
    Request(Served),
}

pub struct RngServer<R, const C: usize = POOL_CAPACITY> {
    regs: R,
    pool: RandomPool<C>,
}

impl<R: RngRegisters, const C: usize> RngServer<R, C> {
    pub fn init<K: Kernel + ?Sized>(mut regs: R, kernel: &mut K) -> Self {
        regs.start();
        kernel.arm(irq::RNG);
        RngServer {
            regs,
            pool: RandomPool::new(),
        }
    }

    /// Bytes currently held.
    pub fn held(&self) -> usize {
        self.pool.len()
    }

    /// Handles exactly one top-level message.
    pub fn serve<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> Result<Handled, Fault> {
        let m = kernel.receive(Source::Any);
        match m.kind {
            Kind::INTERRUPT if hl::is_interrupt(&m, irq::RNG) => {
                self.harvest(kernel);
                Ok(Handled::Interrupt)
            }
            Kind::REQUEST => self.fill(kernel, &m).map(Handled::Request),
            _ => Err(Fault::protocol(&m)),
        }
    }

    pub fn run<K: Kernel + ?Sized>(mut self, kernel: &mut K) -> ! {
        loop {
            if let Err(f) = self.serve(kernel) {
                ringbuf_entry!(Trace::Fault(f));
                fault::dispose(kernel, Policy::FailFast, f);
            }
        }
    }

    /// Moves one byte from the generator into the pool, then rearms.
    ///
    /// The line is rearmed even if there was nothing to take, or a spurious
    /// wakeup would leave us deaf to the generator for good.
    fn harvest<K: Kernel + ?Sized>(&mut self, kernel: &mut K) {
        if self.regs.value_ready() {
            let byte = self.regs.value();
            if self.pool.push(byte) {
                ringbuf_entry!(Trace::Harvested {
                    held: self.pool.len()
                });
            } else {
                ringbuf_entry!(Trace::PoolFull);
            }
            self.regs.clear_value_ready();
        } else {
            ringbuf_entry!(Trace::Spurious);
        }
        kernel.rearm(irq::RNG);
    }

    fn fill<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
        m: &Message,
    ) -> Result<Served, Fault> {
        let client = m.sender;
        let count = m.args[0] as usize;
        ringbuf_entry!(Trace::Request { client, count });

        if count > C || m.lease_len < count {
            return Err(Fault::BadRequest { client });
        }

        while self.pool.len() < count {
            ringbuf_entry!(Trace::Starved {
                held: self.pool.len()
            });
            hl::await_interrupt(kernel, irq::RNG)?;
            self.harvest(kernel);
        }

        let caller = Caller::from(client);
        let bytes = self.pool.pop(count).ok_or(Fault::BadRequest { client })?;
        caller.write_fully_at(kernel, 0, bytes)?;
        caller.reply_ok(kernel, count as u32);
        ringbuf_entry!(Trace::Delivered { client, count });

        Ok(Served {
            client,
            value: count as u32,
        })
    }
}
