// ABOUTME: JSON backend: flat or sectioned object documents
// ABOUTME: Shares the document parser with Config::load_json
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::config::Config;
use crate::errors::ConfigError;
use crate::property::{PropFlags, Property};
use crate::value::Value;
use serde_json::Value as Json;
use std::fs;
use tracing::{debug, warn};

const FILE_ONLY: PropFlags = PropFlags::FILE
    .union(PropFlags::FILEONLY)
    .union(PropFlags::NOPUB);

/// Parse the configured JSON file into the registry.
///
/// A missing file is not an error for this format; the registry simply keeps
/// its defaults and the file appears on the first write.
pub fn read(cfg: &mut Config) -> Result<(), ConfigError> {
    let Some(path) = cfg.filename().map(std::path::Path::to_path_buf) else {
        return Err(ConfigError::Io(std::io::Error::other("no filename set")));
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    debug!(path = %path.display(), "reading json config");
    let root: Json = serde_json::from_str(&text)
        .map_err(|e| ConfigError::MalformedRequest(format!("error parsing {}: {e}", path.display())))?;
    parse_document(cfg, &root)
}

/// Apply a parsed JSON document to the registry.
///
/// The document is either sectioned (every top-level value an object of
/// properties) or flat (no top-level value an object); mixing the two shapes
/// is rejected. Flat keys resolve across all sections by name. Rebuilds the
/// id map afterwards.
pub(crate) fn parse_document(cfg: &mut Config, root: &Json) -> Result<(), ConfigError> {
    let Json::Object(map) = root else {
        return Err(ConfigError::MalformedRequest(
            "config document must be an object".to_string(),
        ));
    };
    let objects = map.values().filter(|v| v.is_object()).count();
    if objects != 0 && objects != map.len() {
        return Err(ConfigError::MalformedRequest(
            "config file mixes sections and non-sections".to_string(),
        ));
    }

    let trig = cfg.triggers_enabled();
    if objects == 0 {
        for (name, jval) in map {
            apply_flat(cfg, name, jval, trig);
        }
    } else {
        for (sname, body) in map {
            let Json::Object(props) = body else { continue };
            cfg.get_or_create_section(sname, PropFlags::empty());
            for (name, jval) in props {
                apply_sectioned(cfg, sname, name, jval, trig);
            }
        }
    }
    cfg.build_id_map();
    Ok(())
}

fn apply_flat(cfg: &mut Config, name: &str, jval: &Json, trig: bool) {
    let Some(value) = Value::from_json(jval) else {
        warn!(name, "skipping value with no property form");
        return;
    };
    if let Some(p) = cfg.find_property_mut(name) {
        set_loaded(p, name, value, trig);
        return;
    }
    let idx = cfg.get_or_create_section("", PropFlags::empty());
    synthesize(cfg, idx, name, value, trig);
}

fn apply_sectioned(cfg: &mut Config, sname: &str, name: &str, jval: &Json, trig: bool) {
    let Some(value) = Value::from_json(jval) else {
        warn!(section = sname, name, "skipping value with no property form");
        return;
    };
    if let Some(p) = cfg.get_property_mut(sname, name) {
        set_loaded(p, name, value, trig);
        return;
    }
    let idx = cfg.get_or_create_section(sname, PropFlags::empty());
    synthesize(cfg, idx, name, value, trig);
}

fn set_loaded(p: &mut Property, name: &str, value: Value, trig: bool) {
    if let Err(err) = p.set_value(value, false, trig) {
        warn!(name, %err, "could not apply file value");
        return;
    }
    p.flags_mut().insert(PropFlags::FILE);
}

fn synthesize(cfg: &mut Config, section_idx: usize, name: &str, value: Value, trig: bool) {
    let mut p = Property::new(name, value.kind()).with_flags(FILE_ONLY);
    if let Err(err) = p.set_value(value, false, trig) {
        warn!(name, %err, "could not apply file value");
        return;
    }
    if let Err(err) = cfg.add_property(section_idx, p, PropFlags::empty()) {
        warn!(name, %err, "could not register file-only property");
    }
}

/// Write dirty and file-sourced values to the configured JSON file, pretty
/// printed and sectioned. Dirty marks are cleared on success.
pub fn write(cfg: &mut Config) -> Result<(), ConfigError> {
    let Some(path) = cfg.filename().map(std::path::Path::to_path_buf) else {
        return Err(ConfigError::Io(std::io::Error::other("no filename set")));
    };
    let doc = cfg.to_json(PropFlags::NOSAVE, true);
    let mut text = serde_json::to_string_pretty(&doc)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    text.push('\n');
    fs::write(&path, text)?;
    debug!(path = %path.display(), "wrote json config");
    cfg.mark_saved(PropFlags::NOSAVE);
    Ok(())
}
