// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the nRF51 successive-approximation ADC.
//!
//! Use the adc-api crate to interact with this driver.
//!
//! Each request names one of the analog inputs. The driver routes that input
//! to the converter, runs a single conversion, and routes it away again
//! before replying, so nothing about one request survives into the next.

#![cfg_attr(target_os = "none", no_std)]

use ringbuf::{ringbuf, ringbuf_entry};
use userlib::fault::{self, Fault, Policy};
use userlib::hl::{self, OneShot, Served};
use userlib::{irq, IrqLine, Kernel, Message};

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Number of analog inputs on the multiplexer.
pub const CHANNELS: u32 = 8;

static_assertions::const_assert!(CHANNELS <= u8::MAX as u32);

/// The converter's registers, as far as this driver uses them.
///
/// Whoever holds a value of this type owns the peripheral. It is moved into
/// the server at startup and never handed out again.
pub trait AdcRegisters {
    /// Sets 10-bit resolution, 1/3 input prescaling and a 1/3 VDD
    /// reference, enables the converter, and enables the END interrupt.
    fn configure(&mut self);

    /// Routes analog input `channel` to the converter, or disconnects all
    /// inputs if `None`.
    fn select(&mut self, channel: Option<u8>);

    /// Starts one conversion.
    fn start(&mut self);

    /// Whether the END event is set.
    fn end(&self) -> bool;

    fn clear_end(&mut self);

    /// Result of the last conversion.
    fn result(&self) -> u16;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Start { channel: u8 },
    Done(u16),
    Fault(Fault),
}

ringbuf!(Trace, 16, Trace::None);

pub struct AdcServer<R> {
    regs: R,
}

impl<R: AdcRegisters> AdcServer<R> {
    /// Configures the converter and arms its interrupt.
    pub fn init<K: Kernel + ?Sized>(mut regs: R, kernel: &mut K) -> Self {
        regs.configure();
        kernel.arm(irq::ADC);
        AdcServer { regs }
    }

    /// Serves exactly one client request.
    pub fn serve<K: Kernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> Result<Served, Fault> {
        hl::serve_one_shot(kernel, self)
    }

    pub fn run<K: Kernel + ?Sized>(mut self, kernel: &mut K) -> ! {
        loop {
            if let Err(f) = self.serve(kernel) {
                ringbuf_entry!(Trace::Fault(f));
                fault::dispose(kernel, Policy::FailFast, f);
            }
        }
    }
}

impl<R: AdcRegisters> OneShot for AdcServer<R> {
    fn line(&self) -> IrqLine {
        irq::ADC
    }

    fn start(&mut self, request: &Message) -> Result<(), Fault> {
        let channel = request.args[0];
        if channel >= CHANNELS {
            return Err(Fault::BadRequest {
                client: request.sender,
            });
        }
        let channel = channel as u8;
        ringbuf_entry!(Trace::Start { channel });

        self.regs.select(Some(channel));
        self.regs.start();
        Ok(())
    }

    fn complete(&mut self) -> Result<u32, Fault> {
        if !self.regs.end() {
            return Err(Fault::Hardware);
        }
        let value = self.regs.result();
        self.regs.select(None);
        self.regs.clear_end();
        ringbuf_entry!(Trace::Done(value));
        Ok(value.into())
    }
}
