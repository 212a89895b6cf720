// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DNT - Directional Network Tables
//!
//! Named key-value tables of strings shared between a server and its
//! clients. Every table has exactly one writer: a process either *publishes*
//! a table (read-write) or *subscribes* to it (read-only mirror).
//!
//! ## Quick Start
//!
//! ```rust
//! use dnt::{ClosureListener, LoopbackSubstrate, Table, TableRegistry};
//! use std::sync::Arc;
//!
//! let substrate = Arc::new(LoopbackSubstrate::new());
//!
//! // Server side
//! let server = TableRegistry::new(substrate.clone());
//! server.start_server()?;
//! let out = server.publish("FromServer")?;
//!
//! // Client side (sharing the in-process substrate)
//! let client = TableRegistry::new(substrate);
//! client.start_client("4030")?;
//! let inbox = client.subscribe("FromServer")?;
//! inbox.on_change(Arc::new(ClosureListener::new(|t: &Table| {
//!     println!("{}: {:?}", t.name(), t.snapshot());
//! })));
//!
//! out.set_value("k0", "v0")?;
//! out.set_interval(1)?;
//! out.send()?;
//! # Ok::<(), dnt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |  TableRegistry   publish / subscribe / drop / push          |
//! +-------------------------------------------------------------+
//! |  Table           data, interval, staleness, change listener |
//! +-------------------------------------------------------------+
//! |  codec           [keys.., values..] + _UPDATE_INTERVAL      |
//! +-------------------------------------------------------------+
//! |  Substrate       named string arrays (LoopbackSubstrate)    |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade; binaries pick the backend.

pub mod codec;
pub mod config;
mod error;
pub mod listener;
pub mod registry;
pub mod role;
pub mod substrate;
pub mod table;

pub use codec::{Envelope, UPDATE_INTERVAL_KEY};
pub use config::{ConfigError, DntConfig};
pub use error::{Error, Result};
pub use listener::{ClosureListener, TableListener};
pub use registry::TableRegistry;
pub use role::{Role, ServerAddress};
pub use substrate::{
    Delivery, DeliveryListener, ListenerId, LoopbackSubstrate, Substrate, SubstrateError,
};
pub use table::{Table, STALE_FACTOR};

/// DNT version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
