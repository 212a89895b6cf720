// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process substrate.
//!
//! Publishers and subscribers living in the same process share one
//! [`LoopbackSubstrate`]. Arrays are retained per name and deliveries are
//! dispatched from a dedicated thread, so listeners run on a delivery
//! context distinct from the publishing thread, as they would with a
//! networked substrate.
//!
//! # Architecture
//!
//! ```text
//! put(name, values) ---+
//!                      |  Command::Deliver { delivery, targets }
//! add_listener(l) -----+  Command::DeliverTo { delivery, target }  (retained arrays)
//!                      v
//!        crossbeam channel (unbounded, FIFO)
//!                      |
//!                      v
//!        "dnt-delivery" thread -> listener.on_delivery(&delivery)
//! ```
//!
//! Targets are captured when a command is queued and re-checked when it is
//! dispatched: a listener registered later never sees an older update twice,
//! and a removed listener receives nothing further.

use super::{Delivery, DeliveryListener, ListenerId, Substrate, SubstrateError};
use crate::role::Role;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

enum Command {
    Deliver {
        delivery: Delivery,
        targets: Vec<ListenerId>,
    },
    DeliverTo {
        delivery: Delivery,
        target: ListenerId,
    },
    Shutdown,
}

#[derive(Default)]
struct State {
    role: Option<Role>,
    entries: HashMap<Arc<str>, Arc<[String]>>,
    listeners: HashMap<ListenerId, Arc<dyn DeliveryListener>>,
}

struct Worker {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

/// Substrate connecting tables inside a single process.
///
/// # Example
///
/// ```rust
/// use dnt::{LoopbackSubstrate, Role, Substrate};
///
/// let substrate = LoopbackSubstrate::new();
/// substrate.initialize(&Role::Server)?;
/// substrate.put("FromServer", vec!["k0".into(), "v0".into()])?;
/// assert_eq!(substrate.names(), vec!["FromServer".to_string()]);
/// # Ok::<(), dnt::SubstrateError>(())
/// ```
pub struct LoopbackSubstrate {
    state: Arc<Mutex<State>>,
    tx: Sender<Command>,
    rx: Mutex<Option<Receiver<Command>>>,
    worker: Mutex<Option<Worker>>,
    next_listener: AtomicU64,
}

impl LoopbackSubstrate {
    /// Create an uninitialized substrate. The delivery thread starts on
    /// [`Substrate::initialize`].
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Arc::new(Mutex::new(State::default())),
            tx,
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Role passed to the successful `initialize` call, if any.
    pub fn role(&self) -> Option<Role> {
        self.state.lock().role.clone()
    }

    /// Array currently stored under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<[String]>> {
        self.state.lock().entries.get(name).cloned()
    }

    fn spawn_worker(&self) -> Result<(), SubstrateError> {
        let rx = match self.rx.lock().take() {
            Some(rx) => rx,
            None => return Ok(()),
        };
        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name("dnt-delivery".to_string())
            .spawn(move || delivery_loop(&rx, &state))?;
        let thread_id = handle.thread().id();
        *self.worker.lock() = Some(Worker { handle, thread_id });
        Ok(())
    }
}

impl Default for LoopbackSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

fn delivery_loop(rx: &Receiver<Command>, state: &Mutex<State>) {
    log::debug!("[loopback] delivery thread started");
    while let Ok(cmd) = rx.recv() {
        match cmd {
            Command::Deliver { delivery, targets } => {
                for target in targets {
                    dispatch(state, target, &delivery);
                }
            }
            Command::DeliverTo { delivery, target } => dispatch(state, target, &delivery),
            Command::Shutdown => break,
        }
    }
    log::debug!("[loopback] delivery thread stopped");
}

fn dispatch(state: &Mutex<State>, target: ListenerId, delivery: &Delivery) {
    // Never call out while holding the state lock.
    let listener = state.lock().listeners.get(&target).cloned();
    if let Some(listener) = listener {
        listener.on_delivery(delivery);
    }
}

impl Substrate for LoopbackSubstrate {
    fn initialize(&self, role: &Role) -> Result<(), SubstrateError> {
        {
            let mut state = self.state.lock();
            if state.role.is_some() {
                return Err(SubstrateError::AlreadyInitialized);
            }
            state.role = Some(role.clone());
        }
        if let Err(e) = self.spawn_worker() {
            self.state.lock().role = None;
            return Err(e);
        }
        log::debug!("[loopback] initialized as {}", role);
        Ok(())
    }

    fn put(&self, name: &str, values: Vec<String>) -> Result<(), SubstrateError> {
        let mut state = self.state.lock();
        if state.role.is_none() {
            return Err(SubstrateError::NotInitialized);
        }

        let name: Arc<str> = Arc::from(name);
        let values: Arc<[String]> = values.into();
        let is_new = state
            .entries
            .insert(Arc::clone(&name), Arc::clone(&values))
            .is_none();
        let targets = state.listeners.keys().copied().collect();

        // Queue while still holding the lock so channel order matches state order.
        self.tx
            .send(Command::Deliver {
                delivery: Delivery {
                    name,
                    values,
                    is_new,
                },
                targets,
            })
            .map_err(|_| SubstrateError::ChannelClosed)
    }

    fn add_listener(&self, listener: Arc<dyn DeliveryListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        state.listeners.insert(id, listener);

        for (name, values) in &state.entries {
            let delivery = Delivery {
                name: Arc::clone(name),
                values: Arc::clone(values),
                is_new: true,
            };
            if self
                .tx
                .send(Command::DeliverTo {
                    delivery,
                    target: id,
                })
                .is_err()
            {
                log::warn!("[loopback] delivery channel closed, retained arrays not replayed");
                break;
            }
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state.lock().listeners.remove(&id);
    }

    fn names(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .keys()
            .map(|name| name.to_string())
            .collect()
    }

    fn remove(&self, name: &str) {
        self.state.lock().entries.remove(name);
    }
}

impl Drop for LoopbackSubstrate {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            // A listener may drop the last handle from the delivery thread itself.
            if worker.thread_id != thread::current().id() && worker.handle.join().is_err() {
                log::warn!("[loopback] delivery thread panicked");
            }
        }
    }
}
