// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated converter for host tests.
//!
//! Conversions finish the instant they are started: the result is latched
//! from the selected input, END is set, and the interrupt line goes high
//! until END is cleared.

use std::sync::{Arc, Mutex, MutexGuard};

use fake_kern::FakeKernel;
use userlib::irq;

use crate::{AdcRegisters, CHANNELS};

/// Register operations, in the order the driver performed them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Op {
    Configure,
    Select(Option<u8>),
    Start,
    ClearEnd,
}

#[derive(Default)]
struct State {
    inputs: [u16; CHANNELS as usize],
    selected: Option<u8>,
    end: bool,
    result: u16,
    stalled: bool,
    ops: Vec<Op>,
}

#[derive(Clone)]
pub struct SimAdc {
    kernel: FakeKernel,
    state: Arc<Mutex<State>>,
}

impl SimAdc {
    pub fn new(kernel: &FakeKernel) -> Self {
        SimAdc {
            kernel: kernel.clone(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sets the voltage on `channel`, as the value a conversion will return.
    pub fn set_input(&self, channel: u8, value: u16) {
        self.lock().inputs[usize::from(channel)] = value & 0x3ff;
    }

    /// While stalled, started conversions never finish.
    pub fn stall(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    pub fn selected(&self) -> Option<u8> {
        self.lock().selected
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }
}

impl AdcRegisters for SimAdc {
    fn configure(&mut self) {
        self.lock().ops.push(Op::Configure);
    }

    fn select(&mut self, channel: Option<u8>) {
        let mut st = self.lock();
        st.selected = channel;
        st.ops.push(Op::Select(channel));
    }

    fn start(&mut self) {
        let mut st = self.lock();
        st.ops.push(Op::Start);
        if st.stalled {
            return;
        }
        // An unrouted converter reads ground.
        let result = st.selected.map_or(0, |c| st.inputs[usize::from(c)]);
        st.result = result;
        st.end = true;
        drop(st);
        self.kernel.set_level(irq::ADC, true);
    }

    fn end(&self) -> bool {
        self.lock().end
    }

    fn clear_end(&mut self) {
        let mut st = self.lock();
        st.end = false;
        st.ops.push(Op::ClearEnd);
        drop(st);
        self.kernel.set_level(irq::ADC, false);
    }

    fn result(&self) -> u16 {
        self.lock().result
    }
}
