// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the random number driver.
//!
//! The driver keeps a small pool of bytes harvested from the hardware
//! generator and hands out the most recently harvested ones. A single request
//! can take at most [`POOL_CAPACITY`] bytes; [`Rng::fill`] splits larger
//! buffers up.

#![no_std]

use core::num::NonZeroU32;

use rand_core::{impls, RngCore};
use userlib::hl::{expect_reply, ClientError};
use userlib::{Kernel, Kind, Message, TaskId};

/// Size of the driver's pool, and so the most one request can ask for.
pub const POOL_CAPACITY: usize = 64;

static_assertions::const_assert!(POOL_CAPACITY <= u32::MAX as usize);

/// Handle on the random number driver task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rng(TaskId);

impl From<TaskId> for Rng {
    fn from(task: TaskId) -> Self {
        Rng(task)
    }
}

impl Rng {
    /// Fills `dest` with random bytes, one request per `POOL_CAPACITY`
    /// bytes.
    pub fn fill<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
        dest: &mut [u8],
    ) -> Result<(), ClientError> {
        for chunk in dest.chunks_mut(POOL_CAPACITY) {
            let request =
                Message::with_args(Kind::REQUEST, chunk.len() as u32, 0);
            let reply = kernel.request_with_lease(self.0, request, chunk);
            expect_reply(reply, Kind::OK)?;
        }
        Ok(())
    }

    pub fn next_u32<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
    ) -> Result<u32, ClientError> {
        let mut bytes = [0; 4];
        self.fill(kernel, &mut bytes)?;
        Ok(u32::from_ne_bytes(bytes))
    }

    pub fn next_u8<K: Kernel + ?Sized>(
        &self,
        kernel: &mut K,
    ) -> Result<u8, ClientError> {
        let mut byte = [0];
        self.fill(kernel, &mut byte)?;
        Ok(byte[0])
    }

    /// Borrows `kernel` to make a `rand_core` generator backed by the
    /// driver.
    pub fn with_kernel<'k, K: Kernel + ?Sized>(
        self,
        kernel: &'k mut K,
    ) -> DriverRng<'k, K> {
        DriverRng { rng: self, kernel }
    }
}

/// A [`RngCore`] that draws from the driver.
///
/// This is intentionally _not_ marked as `CryptoRng`: the pool is filled
/// with bias-corrected hardware output and nothing more.
pub struct DriverRng<'k, K: ?Sized> {
    rng: Rng,
    kernel: &'k mut K,
}

fn to_rand_error(e: ClientError) -> rand_core::Error {
    let code = match e {
        ClientError::Refused => 1,
        ClientError::UnexpectedReply { kind } => 2 + u32::from(kind.0),
    };
    match NonZeroU32::new(rand_core::Error::CUSTOM_START + code) {
        Some(code) => code.into(),
        None => unreachable!(),
    }
}

impl<K: Kernel + ?Sized> RngCore for DriverRng<'_, K> {
    fn next_u32(&mut self) -> u32 {
        impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill_bytes(dest) {
            panic!("rng driver: {e}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.rng.fill(&mut *self.kernel, dest).map_err(to_rand_error)
    }
}
