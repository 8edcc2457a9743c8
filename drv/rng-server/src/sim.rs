// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated random number generator for host tests.
//!
//! The "random" output is whatever the test feeds in, one byte at a time:
//! a byte is latched into VALUE with VALRDY set, and the next one only once
//! the driver clears VALRDY.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use fake_kern::FakeKernel;
use userlib::irq;

use crate::RngRegisters;

#[derive(Default)]
struct State {
    running: bool,
    value_ready: bool,
    value: u8,
    upcoming: VecDeque<u8>,
}

impl State {
    /// Latches the next byte if the generator is free to produce one.
    fn produce(&mut self) -> bool {
        if !self.running || self.value_ready {
            return false;
        }
        match self.upcoming.pop_front() {
            Some(b) => {
                self.value = b;
                self.value_ready = true;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct SimRng {
    kernel: FakeKernel,
    state: Arc<Mutex<State>>,
}

impl SimRng {
    pub fn new(kernel: &FakeKernel) -> Self {
        SimRng {
            kernel: kernel.clone(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queues bytes for the generator to produce, in order.
    pub fn feed(&self, bytes: impl IntoIterator<Item = u8>) {
        let mut st = self.lock();
        st.upcoming.extend(bytes);
        let raised = st.produce();
        drop(st);
        if raised {
            self.kernel.set_level(irq::RNG, true);
        }
    }

    pub fn value_ready_flag(&self) -> bool {
        self.lock().value_ready
    }
}

impl RngRegisters for SimRng {
    fn start(&mut self) {
        let mut st = self.lock();
        st.running = true;
        st.value_ready = false;
        let raised = st.produce();
        drop(st);
        if raised {
            self.kernel.set_level(irq::RNG, true);
        }
    }

    fn value_ready(&self) -> bool {
        self.lock().value_ready
    }

    fn clear_value_ready(&mut self) {
        let mut st = self.lock();
        st.value_ready = false;
        let raised = st.produce();
        drop(st);
        self.kernel.set_level(irq::RNG, false);
        if raised {
            self.kernel.set_level(irq::RNG, true);
        }
    }

    fn value(&self) -> u8 {
        self.lock().value
    }
}
