// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flat string-array wire codec.
//!
//! A table travels over the substrate as one array of strings: all keys
//! first, then all values in the same order.
//!
//! ```text
//! { "k0": "v0", "k1": "v1" }   <->   ["k0", "k1", "v0", "v1"]
//! ```
//!
//! The publisher's update interval rides along under the reserved key
//! [`UPDATE_INTERVAL_KEY`]. [`Envelope`] keeps it out of the application
//! mapping: it is added by [`encode_envelope`] and stripped by
//! [`decode_envelope`].

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Reserved key carrying the publisher's update interval (seconds, decimal).
pub const UPDATE_INTERVAL_KEY: &str = "_UPDATE_INTERVAL";

/// Wire value for "no interval declared".
const UNSET_INTERVAL: &str = "-1";

/// Table contents as they cross the serialization boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Publisher-declared update interval in seconds, `None` when unset.
    pub interval: Option<u32>,
    /// Application key-value pairs (never contains the reserved key).
    pub data: HashMap<String, String>,
}

impl Envelope {
    pub fn new(data: HashMap<String, String>, interval: Option<u32>) -> Self {
        Self { interval, data }
    }
}

/// Normalize a signed interval: anything `<= 0` means unset.
pub fn normalize_interval(seconds: i64) -> Option<u32> {
    if seconds <= 0 {
        None
    } else {
        Some(u32::try_from(seconds).unwrap_or(u32::MAX))
    }
}

/// Serialize a mapping as `[keys.., values..]`.
///
/// Keys are enumerated once; the value half is emitted by walking that same
/// key list, so `out[i + n]` always belongs to `out[i]`.
pub fn encode(data: &HashMap<String, String>) -> Vec<String> {
    encode_pairs(data.iter().map(|(k, v)| (k.as_str(), v.as_str())), data.len())
}

fn encode_pairs<'a, I>(pairs: I, len_hint: usize) -> Vec<String>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    let (keys, values): (Vec<&str>, Vec<&str>) = pairs.unzip();
    let mut out = Vec::with_capacity(len_hint * 2);
    out.extend(keys.iter().map(|k| (*k).to_string()));
    out.extend(values.iter().map(|v| (*v).to_string()));
    out
}

/// Deserialize `[keys.., values..]` into a mapping.
///
/// # Errors
///
/// [`Error::Format`] if the array has an odd number of elements.
pub fn decode(values: &[String]) -> Result<HashMap<String, String>> {
    if values.len() % 2 != 0 {
        return Err(Error::Format(format!(
            "array contains an odd number of elements ({})",
            values.len()
        )));
    }

    let half = values.len() / 2;
    let (keys, vals) = values.split_at(half);
    Ok(keys.iter().cloned().zip(vals.iter().cloned()).collect())
}

/// Serialize an envelope, injecting the reserved interval key.
pub fn encode_envelope(envelope: &Envelope) -> Vec<String> {
    encode_with_interval(&envelope.data, envelope.interval)
}

/// Serialize a mapping plus interval without building an [`Envelope`].
pub fn encode_with_interval(data: &HashMap<String, String>, interval: Option<u32>) -> Vec<String> {
    let interval = interval.map_or_else(|| UNSET_INTERVAL.to_string(), |secs| secs.to_string());

    let pairs = data
        .iter()
        .filter(|(k, _)| k.as_str() != UPDATE_INTERVAL_KEY)
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(std::iter::once((UPDATE_INTERVAL_KEY, interval.as_str())));

    encode_pairs(pairs, data.len() + 1)
}

/// Deserialize an envelope, consuming the reserved interval key.
///
/// A payload without the reserved key decodes with `interval: None`.
///
/// # Errors
///
/// [`Error::Format`] for odd-length arrays or a non-numeric interval value.
pub fn decode_envelope(values: &[String]) -> Result<Envelope> {
    let mut data = decode(values)?;

    let interval = match data.remove(UPDATE_INTERVAL_KEY) {
        Some(text) => {
            let secs: i64 = text.trim().parse().map_err(|_| {
                Error::Format(format!("{} is not an integer: {:?}", UPDATE_INTERVAL_KEY, text))
            })?;
            normalize_interval(secs)
        }
        None => None,
    };

    Ok(Envelope { interval, data })
}
