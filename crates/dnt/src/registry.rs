// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table registry: one directory of tables per process.
//!
//! The registry owns the connection state and is the only component that
//! talks to the [`Substrate`]. Lookup-or-create, pushes and drops all run
//! under a single registry-wide mutex, so two threads publishing the same
//! name always end up with the same [`Table`].
//!
//! # Architecture
//!
//! ```text
//! TableRegistry (cheap clone, shared handle)
//! +-- Shared
//!     +-- substrate: Arc<dyn Substrate>
//!     +-- state: Mutex<RegistryState>
//!         +-- role / connected
//!         +-- tables: HashMap<name, Entry { table, delivery listener id }>
//!
//! Table --(Weak<Shared>)--> send()      (publisher send path)
//! Substrate delivery thread --> Table::on_delivery  (subscriber path)
//! ```
//!
//! # Lifecycle
//!
//! 1. `TableRegistry::new(substrate)`
//! 2. `initialize(role)` once (repeat calls are no-ops)
//! 3. `publish` / `subscribe` / `drop_table` as needed
//!
//! There is no teardown: the registry lives until the last handle is dropped.
//!
//! # Lock Ordering
//!
//! Registry lock before table lock: [`Table::send`] encodes the table while
//! the registry lock is held. Listeners never run under either lock.

use crate::error::{Error, Result};
use crate::role::Role;
use crate::substrate::{DeliveryListener, ListenerId, Substrate, SubstrateError};
use crate::table::Table;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct Entry {
    table: Arc<Table>,
    listener: Option<ListenerId>,
}

#[derive(Default)]
struct RegistryState {
    role: Option<Role>,
    connected: bool,
    tables: HashMap<String, Entry>,
}

/// State shared between the registry handle and its tables.
pub(crate) struct Shared {
    substrate: Arc<dyn Substrate>,
    state: Mutex<RegistryState>,
}

impl Shared {
    /// Hand a serialized payload to the substrate.
    pub(crate) fn push(&self, name: &str, payload: Vec<String>) -> Result<()> {
        let state = self.state.lock();
        self.push_locked(&state, name, payload)
    }

    /// Encode and push `table`, which must be the registered publisher of
    /// its name.
    ///
    /// Encoding happens under the registry lock so concurrent sends reach
    /// the substrate in the order they snapshot the table.
    pub(crate) fn send(&self, table: &Table) -> Result<()> {
        let state = self.state.lock();
        self.send_locked(&state, table)
    }

    fn send_locked(&self, state: &RegistryState, table: &Table) -> Result<()> {
        let name = table.name();
        let entry = Self::writable_entry(state, name)?;
        if !std::ptr::eq(Arc::as_ptr(&entry.table), table) {
            return Err(Error::State(format!(
                "Table handle is no longer registered: {}",
                name
            )));
        }
        let payload = table.encode_for_send()?;
        self.substrate.put(name, payload)?;
        Ok(())
    }

    fn push_locked(&self, state: &RegistryState, name: &str, payload: Vec<String>) -> Result<()> {
        Self::writable_entry(state, name)?;
        self.substrate.put(name, payload)?;
        Ok(())
    }

    fn writable_entry<'a>(state: &'a RegistryState, name: &str) -> Result<&'a Entry> {
        if !state.connected {
            return Err(Error::Connection(SubstrateError::NotInitialized));
        }
        let entry = state
            .tables
            .get(name)
            .ok_or_else(|| Error::State(format!("No such table: {}", name)))?;
        if !entry.table.is_writable() {
            return Err(Error::State(format!("Table not writable: {}", name)));
        }
        Ok(entry)
    }
}

/// Directory of published and subscribed tables.
///
/// Cloning the registry yields another handle to the same tables.
///
/// # Example
///
/// ```rust
/// use dnt::{LoopbackSubstrate, TableRegistry};
/// use std::sync::Arc;
///
/// let registry = TableRegistry::new(Arc::new(LoopbackSubstrate::new()));
/// registry.start_server()?;
///
/// let table = registry.publish("FromServer")?;
/// table.set_value("k0", "v0")?;
/// table.set_interval(1)?;
/// table.send()?;
///
/// assert!(Arc::ptr_eq(&table, &registry.publish("FromServer")?));
/// assert!(registry.subscribe("FromServer").is_err());
/// # Ok::<(), dnt::Error>(())
/// ```
#[derive(Clone)]
pub struct TableRegistry {
    shared: Arc<Shared>,
}

impl TableRegistry {
    /// Create a registry on top of `substrate`. Call
    /// [`initialize`](Self::initialize) before creating tables.
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self {
            shared: Arc::new(Shared {
                substrate,
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Bring up the substrate for `role`.
    ///
    /// Idempotent: once connected, further calls return `Ok(())` and keep the
    /// original role. A substrate that reports it was already initialized
    /// (for example, one shared with another registry) counts as success.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] if the substrate fails to initialize. Nothing is
    /// retried; whether to abort or retry is up to the caller.
    pub fn initialize(&self, role: Role) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.connected {
            log::debug!("[dnt] registry already initialized, ignoring {}", role);
            return Ok(());
        }

        match self.shared.substrate.initialize(&role) {
            Ok(()) | Err(SubstrateError::AlreadyInitialized) => {}
            Err(e) => {
                log::error!("[dnt] unable to initialize substrate as {}: {}", role, e);
                return Err(e.into());
            }
        }

        log::info!("[dnt] initialized as {}", role);
        state.role = Some(role);
        state.connected = true;
        Ok(())
    }

    /// Initialize as a server (accepts inbound connections).
    pub fn start_server(&self) -> Result<()> {
        self.initialize(Role::Server)
    }

    /// Initialize as a client of `target` (team number or address).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] if `target` is neither; otherwise as
    /// [`initialize`](Self::initialize).
    pub fn start_client(&self, target: &str) -> Result<()> {
        self.initialize(Role::client(target)?)
    }

    /// `true` when initialized in client mode.
    pub fn is_client(&self) -> bool {
        self.shared
            .state
            .lock()
            .role
            .as_ref()
            .is_some_and(Role::is_client)
    }

    /// `true` once [`initialize`](Self::initialize) succeeded.
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().connected
    }

    pub fn role(&self) -> Option<Role> {
        self.shared.state.lock().role.clone()
    }

    /// Subscribe to a table published elsewhere (read-only).
    pub fn subscribe(&self, name: &str) -> Result<Arc<Table>> {
        self.get_or_create(name, false)
    }

    /// Publish a table (read-write).
    pub fn publish(&self, name: &str) -> Result<Arc<Table>> {
        self.get_or_create(name, true)
    }

    /// Return the table called `name`, creating it if needed.
    ///
    /// A new published table is sent once immediately; a new subscribed
    /// table is registered for deliveries.
    ///
    /// # Errors
    ///
    /// - [`Error::State`] if the table exists with the other direction.
    /// - [`Error::Connection`] if the registry is not initialized, or the
    ///   initial send fails.
    pub fn get_or_create(&self, name: &str, writable: bool) -> Result<Arc<Table>> {
        let mut state = self.shared.state.lock();

        if let Some(entry) = state.tables.get(name) {
            if entry.table.is_writable() != writable {
                return Err(Error::State(format!(
                    "Table already exists but does not share writable state: {}",
                    name
                )));
            }
            return Ok(Arc::clone(&entry.table));
        }

        if !state.connected {
            return Err(Error::Connection(SubstrateError::NotInitialized));
        }

        let table = Arc::new(Table::new(name, writable, Arc::downgrade(&self.shared)));

        if writable {
            state.tables.insert(
                name.to_string(),
                Entry {
                    table: Arc::clone(&table),
                    listener: None,
                },
            );
            if let Err(e) = self.shared.send_locked(&state, &table) {
                state.tables.remove(name);
                return Err(e);
            }
            log::debug!("[dnt] published table {}", name);
        } else {
            let listener: Arc<dyn DeliveryListener> = table.clone();
            let id = self.shared.substrate.add_listener(listener);
            state.tables.insert(
                name.to_string(),
                Entry {
                    table: Arc::clone(&table),
                    listener: Some(id),
                },
            );
            log::debug!("[dnt] subscribed table {}", name);
        }

        Ok(table)
    }

    /// Push a serialized payload for the published table `name`.
    ///
    /// Forwards an already encoded array as-is; tables publish through
    /// [`Table::send`] instead.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if not initialized or the substrate refuses.
    /// - [`Error::State`] if `name` is unknown or not writable.
    pub fn push(&self, name: &str, payload: Vec<String>) -> Result<()> {
        self.shared.push(name, payload)
    }

    /// Forget a table and stop its deliveries. Unknown names are ignored.
    ///
    /// Outstanding `Arc<Table>` handles stay readable but no longer receive
    /// updates (subscribed) and can no longer send (published).
    pub fn drop_table(&self, name: &str) {
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.tables.remove(name) {
            if let Some(id) = entry.listener {
                self.shared.substrate.remove_listener(id);
            }
            log::debug!("[dnt] dropped table {}", name);
        }
    }

    /// Existing table called `name`, without creating it.
    pub fn get(&self, name: &str) -> Option<Arc<Table>> {
        self.shared
            .state
            .lock()
            .tables
            .get(name)
            .map(|entry| Arc::clone(&entry.table))
    }

    /// Names of all registered tables.
    pub fn table_names(&self) -> Vec<String> {
        self.shared.state.lock().tables.keys().cloned().collect()
    }
}

impl fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TableRegistry")
            .field("role", &state.role)
            .field("connected", &state.connected)
            .field("tables", &state.tables.len())
            .finish()
    }
}
