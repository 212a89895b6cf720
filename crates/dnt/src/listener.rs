// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table listener traits.
//!
//! A table dispatches `on_change` synchronously:
//!
//! - on a published table, from the thread that called [`Table::send`];
//! - on a subscribed table, from the substrate's delivery thread.
//!
//! # Thread Safety
//!
//! Listeners must be `Send + Sync`, should return quickly, and must not block:
//! a slow listener stalls either the publishing application or the delivery
//! loop shared by every subscribed table. Table and registry locks are
//! released before a listener runs, so reading the table from inside the
//! callback is fine.
//!
//! # Usage
//!
//! ```rust
//! use dnt::{ClosureListener, LoopbackSubstrate, TableRegistry};
//! use std::sync::Arc;
//!
//! let registry = TableRegistry::new(Arc::new(LoopbackSubstrate::new()));
//! registry.start_server()?;
//!
//! let table = registry.subscribe("FromServer")?;
//! table.on_change(Arc::new(ClosureListener::new(|t: &dnt::Table| {
//!     for key in t.keys() {
//!         println!("{} => {:?}", key, t.get_value(&key));
//!     }
//! })));
//! # Ok::<(), dnt::Error>(())
//! ```
//!
//! [`Table::send`]: crate::Table::send

use crate::table::Table;

/// Listener for table events.
pub trait TableListener: Send + Sync {
    /// Called after the table's data changed (local send or remote delivery).
    fn on_change(&self, table: &Table);

    /// Called when the table goes stale.
    ///
    /// Stale dispatch is not wired up; see [`Table::on_stale`].
    fn on_stale(&self, table: &Table) {
        let _ = table;
    }
}

/// Closure-based listener for change callbacks.
pub struct ClosureListener<F: Fn(&Table) + Send + Sync> {
    callback: F,
}

impl<F: Fn(&Table) + Send + Sync> ClosureListener<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: Fn(&Table) + Send + Sync> TableListener for ClosureListener<F> {
    fn on_change(&self, table: &Table) {
        (self.callback)(table);
    }
}
