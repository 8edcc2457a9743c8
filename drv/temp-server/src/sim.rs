// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated temperature sensor for host tests. Measurements complete as
//! soon as they are started.

use std::sync::{Arc, Mutex, MutexGuard};

use fake_kern::FakeKernel;
use userlib::irq;

use crate::TempRegisters;

#[derive(Default)]
struct State {
    reading: i32,
    latched: i32,
    data_ready: bool,
    interrupt_enabled: bool,
    stalled: bool,
    measurements: usize,
}

#[derive(Clone)]
pub struct SimTemp {
    kernel: FakeKernel,
    state: Arc<Mutex<State>>,
}

impl SimTemp {
    pub fn new(kernel: &FakeKernel) -> Self {
        SimTemp {
            kernel: kernel.clone(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sets the die temperature, in quarter degrees.
    pub fn set_reading(&self, quarters: i32) {
        self.lock().reading = quarters;
    }

    pub fn stall(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Finishes a measurement the driver started while the sensor was
    /// stalled.
    pub fn complete(&self) {
        let mut st = self.lock();
        st.latched = st.reading;
        st.data_ready = true;
        drop(st);
        self.kernel.set_level(irq::TEMP, true);
    }

    /// Number of measurements started so far.
    pub fn measurements(&self) -> usize {
        self.lock().measurements
    }

    pub fn data_ready_flag(&self) -> bool {
        self.lock().data_ready
    }
}

impl TempRegisters for SimTemp {
    fn enable_interrupt(&mut self) {
        self.lock().interrupt_enabled = true;
    }

    fn start(&mut self) {
        let mut st = self.lock();
        st.measurements += 1;
        if st.stalled || !st.interrupt_enabled {
            return;
        }
        drop(st);
        self.complete();
    }

    fn data_ready(&self) -> bool {
        self.lock().data_ready
    }

    fn clear_data_ready(&mut self) {
        self.lock().data_ready = false;
        self.kernel.set_level(irq::TEMP, false);
    }

    fn temperature(&self) -> i32 {
        self.lock().latched
    }
}
