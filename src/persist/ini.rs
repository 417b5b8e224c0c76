// ABOUTME: INI backend: line-oriented [section] key=value files
// ABOUTME: Unknown keys are preserved as file-only string properties
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::config::Config;
use crate::errors::ConfigError;
use crate::property::{PropFlags, Property};
use crate::value::{Kind, Value};
use std::fmt::Write as _;
use std::fs;
use tracing::{debug, warn};

/// Flags given to keys found in the file with no matching declaration. They
/// survive rewrites but stay out of telemetry and the id map.
const FILE_ONLY: PropFlags = PropFlags::FILE
    .union(PropFlags::FILEONLY)
    .union(PropFlags::NOPUB);

/// Parse the configured INI file into the registry.
///
/// A missing file is an error for this format; an INI target is expected to
/// be provisioned. Values before the first `[section]` header belong to the
/// default (empty-named) section.
pub fn read(cfg: &mut Config) -> Result<(), ConfigError> {
    let Some(path) = cfg.filename().map(std::path::Path::to_path_buf) else {
        return Err(ConfigError::Io(std::io::Error::other("no filename set")));
    };
    let text = fs::read_to_string(&path)?;
    debug!(path = %path.display(), "reading ini config");

    let trig = cfg.triggers_enabled();
    let mut section = String::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            cfg.get_or_create_section(&section, PropFlags::empty());
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!(line = lineno + 1, "skipping malformed line");
            continue;
        };
        apply(cfg, &section, key.trim(), value.trim(), trig);
    }
    cfg.build_id_map();
    Ok(())
}

fn apply(cfg: &mut Config, section: &str, key: &str, value: &str, trig: bool) {
    if let Some(p) = cfg
        .get_section_mut(section)
        .and_then(|s| s.get_mut(key))
    {
        // Loaded values are not dirty; the FILE flag is what keeps them in
        // future writes.
        if let Err(err) = p.set_value(Value::String(value.to_string()), false, trig) {
            warn!(name = key, %err, "could not apply file value");
            return;
        }
        p.flags_mut().insert(PropFlags::FILE);
        return;
    }
    let idx = cfg.get_or_create_section(section, PropFlags::empty());
    let mut p = Property::new(key, Kind::String).with_flags(FILE_ONLY);
    if let Err(err) = p.set_value(Value::String(value.to_string()), false, trig) {
        warn!(name = key, %err, "could not apply file value");
        return;
    }
    if let Err(err) = cfg.add_property(idx, p, PropFlags::empty()) {
        warn!(name = key, %err, "could not register file-only property");
    }
}

/// Write the registry to the configured INI file.
///
/// Only properties carrying a value and marked dirty or file-sourced are
/// written; `NOSAVE` sections and properties are skipped, as are empty
/// strings. Default-section entries come before any header. Dirty marks are
/// cleared on success.
pub fn write(cfg: &mut Config) -> Result<(), ConfigError> {
    let Some(path) = cfg.filename().map(std::path::Path::to_path_buf) else {
        return Err(ConfigError::Io(std::io::Error::other("no filename set")));
    };

    let mut out = String::new();
    let mut order: Vec<usize> = (0..cfg.sections.len()).collect();
    // default section first
    order.sort_by_key(|&i| !cfg.sections[i].name().is_empty());

    for i in order {
        let s = &cfg.sections[i];
        if s.flags().contains(PropFlags::NOSAVE) {
            continue;
        }
        let mut wrote_header = s.name().is_empty();
        for p in s.items() {
            if !should_write(p) {
                continue;
            }
            let Some(text) = p.value_as_string() else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            if !wrote_header {
                let _ = writeln!(out, "[{}]", s.name());
                wrote_header = true;
            }
            let _ = writeln!(out, "{}={text}", p.name());
        }
    }

    fs::write(&path, out)?;
    debug!(path = %path.display(), "wrote ini config");
    // Settle exactly what went to the file; a skipped empty-string value
    // stays dirty and qualifies again once it has content.
    for s in &mut cfg.sections {
        if s.flags().contains(PropFlags::NOSAVE) {
            continue;
        }
        for p in s.items_mut() {
            if !should_write(p) {
                continue;
            }
            let emitted = p.value_as_string().is_some_and(|text| !text.is_empty());
            if emitted {
                p.clear_dirty();
                p.flags_mut().insert(PropFlags::FILE);
            }
        }
    }
    Ok(())
}

fn should_write(p: &Property) -> bool {
    if p.flags().contains(PropFlags::NOSAVE) {
        return false;
    }
    p.is_dirty() || p.flags().contains(PropFlags::FILE)
}
