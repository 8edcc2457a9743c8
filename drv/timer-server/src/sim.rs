// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated TIMER1 for host tests. Time only passes when the test says
//! so, one compare event per [`SimTimer::fire`].

use std::sync::{Arc, Mutex, MutexGuard};

use fake_kern::FakeKernel;
use userlib::irq;

use crate::TimerRegisters;

#[derive(Default)]
struct State {
    tick_ms: Option<u32>,
    compare: bool,
}

#[derive(Clone)]
pub struct SimTimer {
    kernel: FakeKernel,
    state: Arc<Mutex<State>>,
}

impl SimTimer {
    pub fn new(kernel: &FakeKernel) -> Self {
        SimTimer {
            kernel: kernel.clone(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Tick length the driver programmed, once started.
    pub fn tick_ms(&self) -> Option<u32> {
        self.lock().tick_ms
    }

    /// Signals one compare match, as if a tick had elapsed.
    ///
    /// # Panics
    ///
    /// If the timer hasn't been started.
    pub fn fire(&self) {
        let mut st = self.lock();
        assert!(st.tick_ms.is_some(), "timer fired before it was started");
        st.compare = true;
        drop(st);
        self.kernel.set_level(irq::TIMER1, true);
    }
}

impl TimerRegisters for SimTimer {
    fn start(&mut self, tick_ms: u32) {
        self.lock().tick_ms = Some(tick_ms);
    }

    fn compare_fired(&self) -> bool {
        self.lock().compare
    }

    fn clear_compare(&mut self) {
        self.lock().compare = false;
        self.kernel.set_level(irq::TIMER1, false);
    }
}
