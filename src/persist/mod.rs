// ABOUTME: Persistence layer: format selection and the pluggable backend trait
// ABOUTME: INI and JSON backends live in submodules; custom backends implement Backend
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Persistence
//!
//! Values load from and save to a configured file in INI or JSON form, or
//! through a caller-installed [`Backend`]. Reads apply values with the dirty
//! mark clear and the `FILE` flag set; it is the `FILE` flag, not dirtiness,
//! that keeps a loaded value in subsequent writes.

pub mod ini;
pub mod json;

use crate::config::Config;
use crate::errors::ConfigError;

/// On-disk representation of the persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Decide from the filename extension: `.json` is JSON, anything else INI.
    #[default]
    Auto,
    /// Line-oriented `key=value` sections.
    Ini,
    /// A JSON object, flat or sectioned.
    Json,
    /// A caller-installed [`Backend`].
    Custom,
}

/// A caller-supplied persistence backend (database, network store, etc).
///
/// The backend is handed the whole registry and is expected to route loaded
/// values through the normal write path.
pub trait Backend: Send {
    /// Load persisted values into the registry.
    fn read(&mut self, cfg: &mut Config) -> Result<(), ConfigError>;
    /// Persist the registry.
    fn write(&mut self, cfg: &mut Config) -> Result<(), ConfigError>;
}
