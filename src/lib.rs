// ABOUTME: Crate root: module wiring and public API surface
// ABOUTME: Re-exports the registry, property, value, merge, persistence, and request types
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # sdconfig - dynamic configuration engine
//!
//! A registry of named, typed, flagged configuration properties for
//! long-running agent processes. Modules declare property tables (optionally
//! backed by their own shared storage slots) and function tables; the engine
//! layers persisted values from INI or JSON files on top of declared
//! defaults, exposes every property by name and by stable numeric id, fires
//! change triggers on writes, dispatches JSON requests from remote
//! controllers, and exports a self-describing schema for UI discovery.
//!
//! ## Core flow
//!
//! ```no_run
//! use sdconfig::{Config, FileFormat, Kind, PropFlags, Property, Value};
//!
//! let props = vec![
//!     Property::new("interval", Kind::Int).with_default("30"),
//!     Property::new("name", Kind::String).with_flags(PropFlags::READONLY),
//! ];
//! let mut cfg = Config::new("agent", props, vec![]);
//! cfg.set_filename("agent.json", FileFormat::Auto);
//! cfg.read()?;
//!
//! cfg.set_property("agent", "interval", Value::Int(60))?;
//! let response = cfg.process_request(r#"{"get": ["interval"]}"#);
//! assert_eq!(response.status, 0);
//! # Ok::<(), sdconfig::ConfigError>(())
//! ```
//!
//! Every value mutation funnels through [`Property::set_value`]: conversion
//! to the declared kind first (a failure writes nothing), then the storage
//! write, then the trigger with a snapshot of the previous value. Reentrant
//! writes from inside a property's own trigger commit the value but skip the
//! recursive notification.

pub mod config;
pub mod errors;
pub mod merge;
pub mod persist;
pub mod property;
pub mod request;
pub mod schema;
pub mod section;
pub mod value;

pub use config::Config;
pub use errors::ConfigError;
pub use merge::{combine_funcs, combine_props};
pub use persist::{Backend, FileFormat};
pub use property::{PropFlags, Property, SharedSlot, Storage, Trigger};
pub use request::{ArgTuple, Function, RequestResponse};
pub use section::Section;
pub use value::{convert, Kind, Value};
