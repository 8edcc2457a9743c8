// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trace ring buffers for driver tasks.
//!
//! Drivers don't print. Instead each one declares a small static ring buffer
//! of typed events and drops an entry into it at the interesting points:
//! a request accepted, a conversion finished, a byte discarded, a fault. The
//! buffer can be read out of a halted device with a debugger, which is
//! exactly when it's needed.
//!
//! ## Constraints
//!
//! The entry type must implement both `Copy` and `PartialEq`. If you use the
//! variants of the macros that leave the name implicit, you can only have one
//! ring buffer per module.
//!
//! ## Creating a ring buffer
//!
//! ```ignore
//! #[derive(Copy, Clone, Debug, PartialEq)]
//! enum Trace {
//!     None,
//!     Request(u8),
//! }
//!
//! ringbuf!(Trace, 16, Trace::None);
//!
//! // ...
//!
//! ringbuf_entry!(Trace::Request(chan));
//! ```
//!
//! An entry identical to the most recent one (same source line, same
//! payload) bumps that entry's `count` instead of using a new slot, so a
//! driver spinning on the same event doesn't wipe out its history.
//!
//! ## Host builds
//!
//! On target, tasks are cooperative and never preempted in the middle of
//! recording an entry, so each buffer is a `static` in a `StaticCell`,
//! whose borrow flag turns any re-entry into a panic. On a development
//! host the same driver code may run on many test threads at once, so there
//! each thread gets its own buffer.

#![no_std]

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        /// Re-exported so that code generated by `ringbuf!` can name it
        /// without depending on `static-cell` directly.
        pub use static_cell::StaticCell;
    } else {
        extern crate std;

        #[doc(hidden)]
        pub use std::thread_local;
    }
}

/// Declares a ring buffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ring buffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// If you omit the name, it defaults to `__RINGBUF`.
#[cfg(all(not(feature = "disabled"), target_os = "none"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf::new($init));
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(all(not(feature = "disabled"), not(target_os = "none")))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        $crate::thread_local! {
            static $name: ::core::cell::RefCell<$crate::Ringbuf<$t, $n>> =
                const { ::core::cell::RefCell::new($crate::Ringbuf::new($init)) };
        }
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Inserts data into a named ring buffer (which should have been declared
/// with the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ring buffer
/// called `NAME`. Without a name, it defaults to `__RINGBUF`.
#[cfg(all(not(feature = "disabled"), target_os = "none"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other's bindings.
        let (p, buf) = ($payload, &$buf);
        $crate::Ringbuf::entry(
            &mut *$crate::StaticCell::borrow_mut(buf),
            line!() as u16,
            p,
        );
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(all(not(feature = "disabled"), not(target_os = "none")))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let p = $payload;
        $buf.with(|cell| {
            $crate::Ringbuf::entry(&mut *cell.borrow_mut(), line!() as u16, p)
        });
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// One recorded event.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size. Normally declared with the
/// [`ringbuf!`] macro rather than directly.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // An unset `last` is treated as out of range: nothing to coalesce
        // with, and the first entry lands in slot 0.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // No remainder here: most of our targets lack a hardware divide, and
        // the wrapping add maps the `usize::MAX` starting value onto 0.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Returns the most recently recorded entry, if any.
    pub fn latest(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }
}
