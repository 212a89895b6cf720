// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named, directional key-value table.
//!
//! A [`Table`] is either *published* (writable, owned by this process) or
//! *subscribed* (read-only mirror of a remote publisher). The direction is
//! fixed at creation: there is no way for two endpoints to write the same
//! table.
//!
//! # Staleness
//!
//! Publishers declare an update interval in seconds. Subscribers receive it
//! with every update and report [`Table::is_stale`] once no update arrived
//! for `interval * STALE_FACTOR`. Staleness is computed on demand; there is
//! no timer thread.
//!
//! ```text
//! last_update            last_update + interval * 2.5
//!      |---------- fresh ----------|---------- stale ---------->
//! ```

use crate::codec::{self, normalize_interval, UPDATE_INTERVAL_KEY};
use crate::error::{Error, Result};
use crate::listener::TableListener;
use crate::registry::Shared;
use crate::substrate::{Delivery, DeliveryListener};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Scaling factor applied to the update interval before a table counts as
/// stale.
pub const STALE_FACTOR: f64 = 2.5;

#[derive(Default)]
struct TableData {
    data: HashMap<String, String>,
    interval: Option<u32>,
    last_update: Option<Instant>,
}

/// A named, published or subscribed key-value table.
///
/// Obtain tables from [`TableRegistry::publish`] and
/// [`TableRegistry::subscribe`]; the registry guarantees one instance per
/// name.
///
/// Reads are always allowed. Mutations ([`set_value`](Self::set_value),
/// [`remove`](Self::remove), [`clear`](Self::clear),
/// [`set_interval`](Self::set_interval), [`send`](Self::send)) fail with
/// [`Error::Directionality`] on subscribed tables.
///
/// [`TableRegistry::publish`]: crate::TableRegistry::publish
/// [`TableRegistry::subscribe`]: crate::TableRegistry::subscribe
pub struct Table {
    name: Arc<str>,
    writable: bool,
    inner: RwLock<TableData>,
    change_listener: RwLock<Option<Arc<dyn TableListener>>>,
    registry: Weak<Shared>,
}

impl Table {
    pub(crate) fn new(name: &str, writable: bool, registry: Weak<Shared>) -> Self {
        Self {
            name: Arc::from(name),
            writable,
            inner: RwLock::new(TableData::default()),
            change_listener: RwLock::new(None),
            registry,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` for published tables, `false` for subscribed ones.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::Directionality(self.name.to_string()))
        }
    }

    fn ensure_key(key: &str) -> Result<()> {
        if key == UPDATE_INTERVAL_KEY {
            Err(Error::ReservedKey(key.to_string()))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Interval and staleness
    // ------------------------------------------------------------------

    /// Declared update interval in seconds (`None` when unset).
    ///
    /// For subscribed tables this is the interval announced by the publisher.
    pub fn interval(&self) -> Option<u32> {
        self.inner.read().interval
    }

    /// Declare the expected update interval. `seconds <= 0` clears it.
    ///
    /// The interval is announced to subscribers on every [`send`](Self::send).
    pub fn set_interval(&self, seconds: i32) -> Result<()> {
        self.ensure_writable()?;
        self.inner.write().interval = normalize_interval(i64::from(seconds));
        Ok(())
    }

    /// Time of the last local mutation/send or remote delivery.
    pub fn last_update(&self) -> Option<Instant> {
        self.inner.read().last_update
    }

    /// `true` once no update happened within `interval * STALE_FACTOR`.
    ///
    /// Tables without a declared interval are never stale.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }

    /// Staleness as observed at `now`.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        let inner = self.inner.read();
        let Some(secs) = inner.interval else {
            return false;
        };
        let Some(last) = inner.last_update else {
            return true;
        };
        let limit = Duration::from_secs_f64(f64::from(secs) * STALE_FACTOR);
        now.saturating_duration_since(last) > limit
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register the change listener, replacing any previous one.
    pub fn on_change(&self, listener: Arc<dyn TableListener>) {
        *self.change_listener.write() = Some(listener);
    }

    /// Remove the change listener.
    pub fn clear_listener(&self) {
        *self.change_listener.write() = None;
    }

    /// Stale notifications are not dispatched.
    ///
    /// Use [`is_stale`](Self::is_stale) instead. Published tables reject the
    /// registration with [`Error::State`]; subscribed tables with
    /// [`Error::Unsupported`].
    pub fn on_stale(&self, listener: Arc<dyn TableListener>) -> Result<()> {
        let _ = listener;
        if self.writable {
            return Err(Error::State(format!("Table is local: {}", self.name)));
        }
        Err(Error::Unsupported("stale notifications"))
    }

    fn notify_changed(&self) {
        let listener = self.change_listener.read().clone();
        if let Some(listener) = listener {
            listener.on_change(self);
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().data.keys().cloned().collect()
    }

    /// Snapshot of the whole mapping.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().data.clone()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.inner.read().data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Value stored under `key`, `None` if absent.
    pub fn get_value(&self, key: &str) -> Option<String> {
        self.inner.read().data.get(key).cloned()
    }

    /// Integer stored under `key`.
    ///
    /// `Ok(None)` if absent, [`Error::Parse`] if the text is not an integer.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.parse_value(key, "integer")
    }

    /// Floating-point number stored under `key`.
    ///
    /// `Ok(None)` if absent, [`Error::Parse`] if the text is not a number.
    pub fn get_double(&self, key: &str) -> Result<Option<f64>> {
        self.parse_value(key, "double")
    }

    fn parse_value<T: std::str::FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>> {
        let Some(value) = self.get_value(key) else {
            return Ok(None);
        };
        value.trim().parse().map(Some).map_err(|_| Error::Parse {
            key: key.to_string(),
            value,
            expected,
        })
    }

    // ------------------------------------------------------------------
    // Writes (published tables only)
    // ------------------------------------------------------------------

    /// Add or replace a key-value pair.
    pub fn set_value(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.ensure_writable()?;
        Self::ensure_key(key)?;
        let mut inner = self.inner.write();
        inner.data.insert(key.to_string(), value.into());
        inner.last_update = Some(Instant::now());
        Ok(())
    }

    /// Store an integer as decimal text.
    pub fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, value.to_string())
    }

    /// Store a floating-point number as decimal text (`1.0`, `0.25`, `1e20`).
    pub fn set_double(&self, key: &str, value: f64) -> Result<()> {
        self.set_value(key, format!("{:?}", value))
    }

    /// Remove a key. Absent keys are ignored.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.ensure_writable()?;
        self.inner.write().data.remove(key);
        Ok(())
    }

    /// Remove every key.
    pub fn clear(&self) -> Result<()> {
        self.ensure_writable()?;
        self.inner.write().data.clear();
        Ok(())
    }

    /// Publish the current contents to all subscribers.
    ///
    /// The change listener of this table is invoked afterwards, on the
    /// calling thread: publishers observe their own sends.
    ///
    /// # Errors
    ///
    /// - [`Error::Directionality`] on subscribed tables.
    /// - [`Error::State`] once the table was dropped from its registry.
    /// - [`Error::Connection`] if the substrate refuses the payload.
    pub fn send(&self) -> Result<()> {
        self.ensure_writable()?;
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| Error::State(format!("registry gone for table {}", self.name)))?;
        registry.send(self)?;
        log::debug!("[dnt] sent table {}", self.name);

        self.notify_changed();
        Ok(())
    }

    /// Serialize for the wire and stamp the update time.
    pub(crate) fn encode_for_send(&self) -> Result<Vec<String>> {
        self.ensure_writable()?;
        let mut inner = self.inner.write();
        inner.last_update = Some(Instant::now());
        Ok(codec::encode_with_interval(&inner.data, inner.interval))
    }

    // ------------------------------------------------------------------
    // Delivery path (subscribed tables only)
    // ------------------------------------------------------------------

    /// Replace the contents with a received payload and notify the listener.
    pub(crate) fn receive(&self, values: &[String]) -> Result<()> {
        if self.writable {
            return Err(Error::State(format!(
                "delivery for published table {}",
                self.name
            )));
        }

        let envelope = codec::decode_envelope(values)?;
        {
            let mut inner = self.inner.write();
            inner.data = envelope.data;
            inner.interval = envelope.interval;
            inner.last_update = Some(Instant::now());
        }

        self.notify_changed();
        Ok(())
    }
}

impl DeliveryListener for Table {
    fn on_delivery(&self, delivery: &Delivery) {
        if *delivery.name != *self.name {
            return;
        }
        // Errors stay on this side of the delivery thread.
        if let Err(e) = self.receive(&delivery.values) {
            log::warn!("[dnt] dropped update for table {}: {}", self.name, e);
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("writable", &self.writable)
            .field("entries", &inner.data.len())
            .field("interval", &inner.interval)
            .field("last_update", &inner.last_update)
            .field("has_listener", &self.change_listener.read().is_some())
            .finish()
    }
}
