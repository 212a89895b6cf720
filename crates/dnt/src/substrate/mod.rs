// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Messaging substrate abstraction.
//!
//! The substrate is the group-messaging layer underneath the tables: it
//! stores one array of strings per name and fans every update out to all
//! registered delivery listeners. Connection setup and the wire transport
//! belong to the implementation, not to the table layer.
//!
//! # Contract
//!
//! - [`Substrate::initialize`] is called once per role; a second call returns
//!   [`SubstrateError::AlreadyInitialized`], which callers may ignore.
//! - [`Substrate::put`] replaces the array stored under a name and delivers it.
//! - Listeners receive deliveries for *every* name on the channel and must
//!   filter for the names they own.
//! - Deliveries run on the substrate's own delivery context. Listeners must
//!   not block it.

mod loopback;

pub use loopback::LoopbackSubstrate;

use crate::role::Role;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by substrate implementations.
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// `initialize` was already called for this substrate.
    #[error("substrate already initialized")]
    AlreadyInitialized,

    /// Operation requires a successful `initialize` first.
    #[error("substrate not initialized")]
    NotInitialized,

    /// Binding or connecting the underlying transport failed.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// The delivery context is gone (substrate shut down).
    #[error("delivery channel closed")]
    ChannelClosed,

    /// I/O error with underlying cause.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One array update as seen by a delivery listener.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Name the array was published under.
    pub name: Arc<str>,
    /// The full array.
    pub values: Arc<[String]>,
    /// True the first time this name appears on the channel.
    pub is_new: bool,
}

/// Receiver of substrate deliveries.
///
/// Called from the substrate's delivery context. Implementations must be
/// `Send + Sync` and should return quickly.
pub trait DeliveryListener: Send + Sync {
    /// Called once per array update on the channel.
    fn on_delivery(&self, delivery: &Delivery);
}

/// Handle identifying a registered delivery listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Named string-array messaging layer.
pub trait Substrate: Send + Sync {
    /// Bring up connectivity for the given role.
    fn initialize(&self, role: &Role) -> Result<(), SubstrateError>;

    /// Store `values` under `name` and deliver them to all listeners.
    fn put(&self, name: &str, values: Vec<String>) -> Result<(), SubstrateError>;

    /// Register a listener for all deliveries on the channel.
    ///
    /// Arrays already stored when the listener registers are delivered to it
    /// (with `is_new = true`) so late subscribers see the current state.
    fn add_listener(&self, listener: Arc<dyn DeliveryListener>) -> ListenerId;

    /// Unregister a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);

    /// Names currently stored on the channel.
    fn names(&self) -> Vec<String>;

    /// Forget the array stored under `name`. Unknown names are ignored.
    fn remove(&self, name: &str);
}
