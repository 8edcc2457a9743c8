// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the ADC driver.

#![no_std]

use userlib::hl::{expect_reply, ClientError};
use userlib::{Kernel, Kind, Message, TaskId};

/// Handle on the ADC driver task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Adc(TaskId);

impl From<TaskId> for Adc {
    fn from(task: TaskId) -> Self {
        Adc(task)
    }
}

impl Adc {
    /// Converts one sample on analog input `channel` and returns the raw
    /// 10-bit result. Blocks until the driver has served every request
    /// queued ahead of ours.
    pub fn read<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        channel: u8,
    ) -> Result<u16, ClientError> {
        let reply = kernel.request(
            self.0,
            Message::with_args(Kind::REQUEST, channel.into(), 0),
        );
        let reply = expect_reply(reply, Kind::OK)?;
        Ok(reply.args[0] as u16)
    }
}
