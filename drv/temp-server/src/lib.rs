// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the nRF51 die temperature sensor.
//!
//! Use the temp-api crate to interact with this driver.

#![cfg_attr(target_os = "none", no_std)]

use ringbuf::{ringbuf, ringbuf_entry};
use userlib::fault::{self, Fault, Policy};
use userlib::hl::{self, OneShot, Served};
use userlib::{irq, IrqLine, Kernel, Message};

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// The sensor's registers.
pub trait TempRegisters {
    /// Enables the DATARDY interrupt.
    fn enable_interrupt(&mut self);

    /// Starts one measurement.
    fn start(&mut self);

    fn data_ready(&self) -> bool;

    fn clear_data_ready(&mut self);

    /// The last measurement, in quarter degrees Celsius.
    fn temperature(&self) -> i32;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Measured(i32),
    Fault(Fault),
}

ringbuf!(Trace, 16, Trace::None);

pub struct TempServer<R> {
    regs: R,
}

impl<R: TempRegisters> TempServer<R> {
    pub fn init<K: Kernel + ?Sized>(mut regs: R, kernel: &mut K) -> Self {
        regs.enable_interrupt();
        kernel.arm(irq::TEMP);
        TempServer { regs }
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

impl<R: TempRegisters> OneShot for TempServer<R> {
    fn line(&self) -> IrqLine {
        irq::TEMP
    }

    fn start(&mut self, _request: &Message) -> Result<(), Fault> {
        self.regs.start();
        Ok(())
    }

    fn complete(&mut self) -> Result<u32, Fault> {
        if !self.regs.data_ready() {
            return Err(Fault::Hardware);
        }
        let t = self.regs.temperature();
        self.regs.clear_data_ready();
        ringbuf_entry!(Trace::Measured(t));
        // Sign is carried through the reply slot's bit pattern.
        Ok(t as u32)
    }
}
