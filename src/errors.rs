// ABOUTME: Unified error type for the configuration engine
// ABOUTME: One variant per failure class; conversion from std::io::Error for backends
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Error Handling
//!
//! All fallible engine operations return [`ConfigError`]. The engine never
//! aborts the process and never logs errors on the caller's behalf; the last
//! diagnostic is additionally recorded as text on the owning
//! [`Config`](crate::Config) and can be retrieved with
//! [`Config::errmsg`](crate::Config::errmsg).

use thiserror::Error;

/// Errors produced by the configuration engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A section, property, or function with the given name does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The value conversion primitive rejected the input.
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// A write would exceed the capacity of a caller-owned shared slot.
    ///
    /// The property's previous value is left intact.
    #[error("property {name}: value needs {needed} bytes but shared storage holds {capacity}")]
    StorageOverflow {
        /// Property name.
        name: String,
        /// Bytes required by the converted value.
        needed: usize,
        /// Fixed capacity of the caller-owned slot.
        capacity: usize,
    },

    /// An administrative write targeted a `READONLY` property.
    #[error("property {0} is readonly")]
    ReadOnly(String),

    /// The change trigger reported failure. The new value is still committed.
    #[error("trigger failed for property {name}: {message}")]
    TriggerFailed {
        /// Property name.
        name: String,
        /// Message returned by the trigger.
        message: String,
    },

    /// A value write happened from inside the same property's trigger.
    ///
    /// The write is committed; only the (recursive) notification is skipped.
    #[error("nested trigger on property {0}")]
    NestedTrigger(String),

    /// A structural violation of the request protocol or a persisted document.
    #[error("{0}")]
    MalformedRequest(String),

    /// A persistence backend failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
