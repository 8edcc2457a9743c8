// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the die temperature driver.

#![no_std]

use userlib::hl::{expect_reply, ClientError};
use userlib::{Kernel, Kind, Message, TaskId};

/// A temperature in units of 1/4 degree Celsius, as the sensor reports it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Quarters(pub i32);

impl Quarters {
    /// Whole degrees, rounded towards negative infinity.
    pub fn degrees(self) -> i32 {
        self.0.div_euclid(4)
    }

    pub fn celsius(self) -> f32 {
        self.0 as f32 / 4.0
    }
}

/// Handle on the temperature driver task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Temp(TaskId);

impl From<TaskId> for Temp {
    fn from(task: TaskId) -> Self {
        Temp(task)
    }
}

impl Temp {
    /// Takes one measurement of the die temperature.
    pub fn read<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
    ) -> Result<Quarters, ClientError> {
        let reply = kernel.request(self.0, Message::new(Kind::REQUEST));
        let reply = expect_reply(reply, Kind::OK)?;
        Ok(Quarters(reply.args[0] as i32))
    }
}
