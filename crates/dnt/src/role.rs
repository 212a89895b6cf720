// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process role (server or client) and client target parsing.
//!
//! The role only decides who accepts inbound connections. Servers and
//! clients can both publish and subscribe.

use crate::error::{Error, Result};
use std::fmt;
use std::net::IpAddr;

/// Highest team number that still fits the `10.TE.AM.2` scheme.
pub const MAX_TEAM_NUMBER: u16 = 25_599;

/// Where a client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddress {
    /// Team number, mapped to `10.TE.AM.2`.
    Team(u16),
    /// Raw address text.
    Host(String),
}

impl ServerAddress {
    /// Parse a team number or an address.
    ///
    /// Integers are team numbers. Anything else must parse as an IP address
    /// or at least look like a dotted address (first dot within the first
    /// four characters, seven characters minimum). The check is advisory,
    /// not a full validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use dnt::ServerAddress;
    ///
    /// assert_eq!(ServerAddress::parse("4030")?.host(), "10.40.30.2");
    /// assert_eq!(ServerAddress::parse("127.0.0.1")?.host(), "127.0.0.1");
    /// assert!(ServerAddress::parse("robot").is_err());
    /// # Ok::<(), dnt::Error>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();

        if let Ok(team) = text.parse::<i64>() {
            return match u16::try_from(team) {
                Ok(team) if (1..=MAX_TEAM_NUMBER).contains(&team) => Ok(Self::Team(team)),
                _ => Err(Error::InvalidAddress(text.to_string())),
            };
        }

        if text.parse::<IpAddr>().is_ok() {
            return Ok(Self::Host(text.to_string()));
        }

        match text.find('.') {
            Some(i) if i > 0 && i < 4 && text.len() >= 7 => Ok(Self::Host(text.to_string())),
            _ => Err(Error::InvalidAddress(text.to_string())),
        }
    }

    /// Host to connect to.
    pub fn host(&self) -> String {
        match self {
            Self::Team(team) => format!("10.{}.{}.2", team / 100, team % 100),
            Self::Host(host) => host.clone(),
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team(team) => write!(f, "team {} ({})", team, self.host()),
            Self::Host(host) => write!(f, "{}", host),
        }
    }
}

/// Connection role of this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Accepts inbound peer connections.
    Server,
    /// Connects out to a server.
    Client(ServerAddress),
}

impl Role {
    /// Client role from a team number or address string.
    pub fn client(target: &str) -> Result<Self> {
        ServerAddress::parse(target).map(Self::Client)
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client(addr) => write!(f, "client of {}", addr),
        }
    }
}
