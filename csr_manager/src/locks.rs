// CSR Manager: Virtual Router Lifecycle on OpenStack
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Mutual exclusion per key (router ID).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set of locks, one per key. Operations on the same key are serialized, operations on
/// different keys run concurrently.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty set of locks
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock of `key`.
    pub fn with_lock<T, F: FnOnce() -> T>(&self, key: &str, f: F) -> T {
        let lock = self.map().entry(key.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        // drop the entry if nobody else holds or waits for it
        let mut map = self.map();
        if Arc::strong_count(&lock) == 2 {
            map.remove(key);
        }
        result
    }

    /// Number of keys currently locked or waited for
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// Returns true if no key is locked
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
