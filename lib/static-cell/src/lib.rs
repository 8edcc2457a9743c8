// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A mutable cell that can live in a `static`.
//!
//! Driver tasks keep their trace buffers in statics. A task can't be switched
//! out halfway through touching one, but nothing in the type system knows
//! that, so [`StaticCell`] checks it at runtime instead: a second borrow
//! while the first is alive panics rather than aliasing.

#![no_std]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A RefCell-style container for a `static` where only one borrow is ever
/// live at a time.
///
/// Only `mut` access is provided. There is no many-reader mode.
#[derive(Default)]
pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

impl<T> StaticCell<T> {
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Gets mutable access to the contents of `self`.
    ///
    /// Panics if a `StaticRef` for `self` is still alive.
    #[track_caller]
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        if self.borrowed.swap(true, Ordering::Acquire) {
            panic!("StaticCell already borrowed");
        }
        // Safety: the flag was clear, so no other `StaticRef` exists, and
        // none can be made until this one drops.
        unsafe {
            StaticRef {
                contents: &mut *self.cell.get(),
                borrow: &self.borrowed,
            }
        }
    }
}

unsafe impl<T> Sync for StaticCell<T> where for<'a> &'a mut T: Send {}

/// Exclusive access to a [`StaticCell`]'s contents. Dropping it releases
/// the cell.
pub struct StaticRef<'a, T> {
    contents: &'a mut T,
    borrow: &'a AtomicBool,
}

impl<T> Drop for StaticRef<'_, T> {
    fn drop(&mut self) {
        self.borrow.store(false, Ordering::Release);
    }
}

impl<T> core::ops::Deref for StaticRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.contents
    }
}

impl<T> core::ops::DerefMut for StaticRef<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contents
    }
}
