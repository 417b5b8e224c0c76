// ABOUTME: Top-level Config registry: sections, functions, id map, persistence settings
// ABOUTME: Owns property registration/replacement semantics and the filtered JSON exporter
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Config Registry
//!
//! A [`Config`] owns an ordered list of [`Section`]s, a [`Function`]
//! registry, a monotonically increasing id counter with an on-demand id map,
//! and the persistence settings. Every module of the embedding agent
//! (transport sessions, drivers, the agent core) registers its property table
//! into a section of a shared `Config` at startup and reads or writes
//! properties by name or numeric id afterwards.
//!
//! The engine is single-threaded by contract: the embedding application
//! serializes access to a given `Config`. Reentrancy is possible only through
//! triggers and is bounded by the per-property guard flag.

use crate::errors::ConfigError;
use crate::persist::{self, Backend, FileFormat};
use crate::property::{PropFlags, Property};
use crate::request::Function;
use crate::section::Section;
use crate::value::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sparse id lookup over all registered properties.
///
/// Entries index into the section/item vectors and carry the structural
/// generation they were built against; a stale map is rebuilt, never
/// dereferenced, so deletes cannot leave dangling entries.
#[derive(Debug, Default)]
struct IdMap {
    entries: Vec<Option<(usize, usize)>>,
    built_at: u64,
}

/// The top-level configuration registry.
pub struct Config {
    pub(crate) sections: Vec<Section>,
    pub(crate) funcs: Vec<Function>,
    next_id: u32,
    id_map: IdMap,
    /// Bumped on every structural change (property add/delete, section add).
    generation: u64,
    pub(crate) filename: Option<PathBuf>,
    format: FileFormat,
    custom_backend: Option<Box<dyn Backend>>,
    pub(crate) triggers_enabled: bool,
    pub(crate) errmsg: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
            funcs: Vec::new(),
            // id 0 is reserved as "unset"
            next_id: 1,
            id_map: IdMap::default(),
            generation: 0,
            filename: None,
            format: FileFormat::Auto,
            custom_backend: None,
            triggers_enabled: true,
            errmsg: String::new(),
        }
    }
}

impl Config {
    /// Create a config and register a module's property and function tables
    /// into the named section.
    #[must_use]
    pub fn new(section_name: &str, props: Vec<Property>, funcs: Vec<Function>) -> Self {
        let mut cfg = Self::default();
        cfg.add_props(section_name, props, PropFlags::empty());
        cfg.add_funcs(funcs);
        cfg
    }

    /// Diagnostic message from the last failed operation.
    #[must_use]
    pub fn errmsg(&self) -> &str {
        &self.errmsg
    }

    pub(crate) fn fail(&mut self, err: ConfigError) -> ConfigError {
        self.errmsg = err.to_string();
        err
    }

    /// Whether triggers fire on writes routed through this config.
    #[must_use]
    pub const fn triggers_enabled(&self) -> bool {
        self.triggers_enabled
    }

    /// Globally enable or disable trigger invocation.
    pub fn set_triggers_enabled(&mut self, enabled: bool) {
        self.triggers_enabled = enabled;
    }

    /// Sections in registration order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Look up a section by case-insensitive name.
    #[must_use]
    pub fn get_section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Mutable section lookup.
    pub fn get_section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    fn section_index(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Create a section with the given flags, returning its index.
    pub fn create_section(&mut self, name: &str, flags: PropFlags) -> usize {
        self.sections.push(Section::new(name, flags));
        self.generation += 1;
        self.sections.len() - 1
    }

    pub(crate) fn get_or_create_section(&mut self, name: &str, flags: PropFlags) -> usize {
        self.section_index(name)
            .unwrap_or_else(|| self.create_section(name, flags))
    }

    /// Register a module's property table into the named section.
    ///
    /// `flags` are OR'd into every inserted property; `NOTRIG` applies to the
    /// registration-time default application only and is not persisted onto
    /// the properties.
    pub fn add_props(&mut self, section_name: &str, props: Vec<Property>, flags: PropFlags) {
        let idx = self.get_or_create_section(section_name, flags & PropFlags::NOSAVE);
        for p in props {
            if let Err(err) = self.add_property(idx, p, flags) {
                let msg = err.to_string();
                self.errmsg = msg;
            }
        }
    }

    /// Insert or replace one property in the section at `section_idx`.
    ///
    /// Replacement preserves live state: if the existing entry holds a value
    /// and the incoming one does not, the value is transplanted first. The
    /// replaced entry's flags (minus `FILEONLY`/`VALUE`/`NOPUB`) are inherited
    /// by the incoming property. Unless `NOID`, a fresh id is assigned; ids
    /// are never reused.
    pub fn add_property(
        &mut self,
        section_idx: usize,
        mut p: Property,
        mut flags: PropFlags,
    ) -> Result<(), ConfigError> {
        let trig = self.triggers_enabled && !flags.contains(PropFlags::NOTRIG);
        // Registration-time suppression only; not a property attribute.
        flags.remove(PropFlags::NOTRIG);

        let Some(section) = self.sections.get_mut(section_idx) else {
            return Err(ConfigError::NotFound(format!("section #{section_idx}")));
        };

        if let Some(pos) = section.position(p.name()) {
            let existing = &mut section.items_mut()[pos];
            if !existing
                .flags()
                .intersects(PropFlags::FILE | PropFlags::NOWARN)
            {
                warn!(name = existing.name(), "duplicate property, replacing");
            }
            if !existing.is_empty() && p.is_empty() {
                if let Some(v) = existing.take_value_for_transplant() {
                    // a value that no longer converts does not block the
                    // redeclaration itself
                    if let Err(err) = p.set_value(v, true, trig) {
                        warn!(name = p.name(), %err, "could not carry value across replacement");
                    }
                }
            }
            let mut inherited = existing.flags();
            inherited.remove(
                PropFlags::FILEONLY | PropFlags::VALUE | PropFlags::NOPUB | PropFlags::IN_TRIG,
            );
            flags |= inherited;
            section.items_mut().remove(pos);
        }

        *p.flags_mut() |= flags;

        if !p.flags().contains(PropFlags::VALUE)
            && p.default_value().is_some()
            && !p.flags().contains(PropFlags::NODEF)
        {
            let def = p.default_value().unwrap_or_default().to_string();
            // a bad default leaves the property registered but valueless
            if let Err(err) = p.set_value(Value::String(def), false, trig) {
                warn!(name = p.name(), %err, "could not apply default");
            }
            // the default is not an explicit assignment
            p.flags_mut().remove(PropFlags::VALUE);
        }

        if !p.flags().contains(PropFlags::NOID) && p.id().is_none() {
            p.assign_id(self.next_id);
            self.next_id += 1;
        }

        debug!(name = p.name(), id = ?p.id(), "property registered");
        // section borrow ended above; re-borrow to push
        self.sections[section_idx].items_mut().push(p);
        self.generation += 1;
        Ok(())
    }

    /// Remove a property by section and name. Its id is retired, never
    /// reused.
    pub fn delete_property(&mut self, section_name: &str, name: &str) -> Result<(), ConfigError> {
        let Some(section) = self.get_section_mut(section_name) else {
            let err = ConfigError::NotFound(format!("section {section_name}"));
            return Err(self.fail(err));
        };
        let Some(pos) = section.position(name) else {
            let err = ConfigError::NotFound(format!("property {name}"));
            return Err(self.fail(err));
        };
        section.items_mut().remove(pos);
        self.generation += 1;
        Ok(())
    }

    /// Look up a property by section and name.
    #[must_use]
    pub fn get_property(&self, section_name: &str, name: &str) -> Option<&Property> {
        self.get_section(section_name)?.get(name)
    }

    /// Mutable lookup by section and name.
    pub fn get_property_mut(&mut self, section_name: &str, name: &str) -> Option<&mut Property> {
        self.get_section_mut(section_name)?.get_mut(name)
    }

    /// Find a property by dotted `section.name` or by bare name across all
    /// sections.
    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&Property> {
        if let Some((sname, pname)) = name.split_once('.') {
            if let Some(p) = self.get_property(sname, pname) {
                return Some(p);
            }
        }
        self.sections.iter().find_map(|s| s.get(name))
    }

    /// Mutable variant of [`find_property`](Self::find_property).
    pub fn find_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        if let Some((sname, pname)) = name.split_once('.') {
            let dotted = self
                .section_index(sname)
                .and_then(|si| self.sections[si].position(pname).map(|pi| (si, pi)));
            if let Some((si, pi)) = dotted {
                return Some(&mut self.sections[si].items_mut()[pi]);
            }
        }
        self.sections.iter_mut().find_map(|s| s.get_mut(name))
    }

    /// Write a property by section and name, honoring the global trigger
    /// toggle.
    pub fn set_property(
        &mut self,
        section_name: &str,
        name: &str,
        value: Value,
    ) -> Result<(), ConfigError> {
        let trig = self.triggers_enabled;
        let Some(p) = self.get_property_mut(section_name, name) else {
            let err = ConfigError::NotFound(format!("property {name}"));
            return Err(self.fail(err));
        };
        let result = p.set_value(value, true, trig);
        result.map_err(|e| self.fail(e))
    }

    /// Rebuild the dense id map. Called automatically when a lookup detects a
    /// structural change.
    pub fn build_id_map(&mut self) {
        let mut entries: Vec<Option<(usize, usize)>> = vec![None; self.next_id as usize];
        for (si, s) in self.sections.iter().enumerate() {
            for (pi, p) in s.items().iter().enumerate() {
                if let Some(id) = p.id() {
                    if let Some(slot) = entries.get_mut(id as usize) {
                        *slot = Some((si, pi));
                    }
                }
            }
        }
        self.id_map = IdMap {
            entries,
            built_at: self.generation,
        };
        debug!(count = self.id_map.entries.len(), "id map rebuilt");
    }

    /// O(1) lookup by numeric id, with a linear scan as safety net.
    pub fn get_by_id(&mut self, id: u32) -> Option<&Property> {
        if self.id_map.built_at != self.generation {
            self.build_id_map();
        }
        if let Some(&Some((si, pi))) = self.id_map.entries.get(id as usize) {
            let hit = self
                .sections
                .get(si)
                .and_then(|s| s.items().get(pi))
                .is_some_and(|p| p.id() == Some(id));
            if hit {
                return self.sections[si].items().get(pi);
            }
        }
        self.sections
            .iter()
            .find_map(|s| s.items().iter().find(|p| p.id() == Some(id)))
    }

    /// Write a property by numeric id (the scripting-bridge hot path).
    pub fn set_property_by_id(&mut self, id: u32, value: Value) -> Result<(), ConfigError> {
        if self.id_map.built_at != self.generation {
            self.build_id_map();
        }
        let trig = self.triggers_enabled;
        let located = match self.id_map.entries.get(id as usize) {
            Some(&Some((si, pi)))
                if self.sections[si].items().get(pi).and_then(Property::id) == Some(id) =>
            {
                Some((si, pi))
            }
            _ => self.sections.iter().enumerate().find_map(|(si, s)| {
                s.items()
                    .iter()
                    .position(|p| p.id() == Some(id))
                    .map(|pi| (si, pi))
            }),
        };
        let Some((si, pi)) = located else {
            let err = ConfigError::NotFound(format!("property id {id}"));
            return Err(self.fail(err));
        };
        let result = self.sections[si].items_mut()[pi].set_value(value, true, trig);
        result.map_err(|e| self.fail(e))
    }

    /// Set the persistence target and format.
    pub fn set_filename(&mut self, path: impl Into<PathBuf>, format: FileFormat) {
        self.filename = Some(path.into());
        self.format = format;
    }

    /// Persistence target, if configured.
    #[must_use]
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Install a custom persistence backend and switch to the custom format.
    pub fn set_backend(&mut self, backend: Box<dyn Backend>) {
        self.custom_backend = Some(backend);
        self.format = FileFormat::Custom;
    }

    fn effective_format(&self) -> FileFormat {
        match self.format {
            FileFormat::Auto => {
                let json = self
                    .filename
                    .as_deref()
                    .and_then(Path::extension)
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if json {
                    FileFormat::Json
                } else {
                    FileFormat::Ini
                }
            }
            other => other,
        }
    }

    /// Load persisted values on top of the declared defaults.
    pub fn read(&mut self) -> Result<(), ConfigError> {
        let result = match self.effective_format() {
            FileFormat::Json => persist::json::read(self),
            FileFormat::Custom => self.run_custom(true),
            FileFormat::Auto | FileFormat::Ini => persist::ini::read(self),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Persist dirty or file-sourced properties.
    pub fn write(&mut self) -> Result<(), ConfigError> {
        let result = match self.effective_format() {
            FileFormat::Json => persist::json::write(self),
            FileFormat::Custom => self.run_custom(false),
            FileFormat::Auto | FileFormat::Ini => persist::ini::write(self),
        };
        result.map_err(|e| self.fail(e))
    }

    fn run_custom(&mut self, reading: bool) -> Result<(), ConfigError> {
        let Some(mut backend) = self.custom_backend.take() else {
            return Err(ConfigError::Io(std::io::Error::other(
                "no custom backend installed",
            )));
        };
        let result = if reading {
            backend.read(self)
        } else {
            backend.write(self)
        };
        self.custom_backend = Some(backend);
        result
    }

    /// Set the filename with automatic format detection and read it.
    pub fn read_file(&mut self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        self.set_filename(path, FileFormat::Auto);
        self.read()
    }

    /// Load and apply a JSON document (flat or sectioned), then rebuild the
    /// id map.
    pub fn load_json(&mut self, data: &str) -> Result<(), ConfigError> {
        let root: serde_json::Value = serde_json::from_str(data).map_err(|_| {
            ConfigError::MalformedRequest("error parsing JSON data".to_string())
        })?;
        let result = persist::json::parse_document(self, &root);
        result.map_err(|e| self.fail(e))
    }

    /// Export sections and properties as a JSON object.
    ///
    /// Sections and properties whose flags intersect `exclude` are skipped,
    /// as are properties without a value. With `dirty_only`, a property must
    /// be dirty or file-sourced to qualify. A property flagged `PUB` is
    /// exported whenever the exclusion mask contains `NOPUB`, overriding the
    /// other property-level filters.
    #[must_use]
    pub fn to_json(&self, exclude: PropFlags, dirty_only: bool) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for s in &self.sections {
            if s.flags().intersects(exclude) {
                continue;
            }
            let mut out = serde_json::Map::new();
            for p in s.items() {
                let publish_anyway =
                    exclude.contains(PropFlags::NOPUB) && p.flags().contains(PropFlags::PUB);
                if !publish_anyway {
                    if p.flags().intersects(exclude) {
                        continue;
                    }
                    if dirty_only && !p.is_dirty() && !p.flags().contains(PropFlags::FILE) {
                        continue;
                    }
                }
                let Some(v) = p.value() else { continue };
                out.insert(p.name().to_string(), v.to_json());
            }
            if out.is_empty() {
                continue;
            }
            root.insert(s.name().to_string(), serde_json::Value::Object(out));
        }
        serde_json::Value::Object(root)
    }

    /// Settle the dirty mark on every property a persistence pass with the
    /// given exclusion mask wrote: the dirty mark clears and the `FILE` flag
    /// is set, so the value stays in subsequent writes.
    pub(crate) fn mark_saved(&mut self, exclude: PropFlags) {
        for s in &mut self.sections {
            if s.flags().intersects(exclude) {
                continue;
            }
            for p in s.items_mut() {
                if p.flags().intersects(exclude) || p.is_empty() {
                    continue;
                }
                if p.is_dirty() || p.flags().contains(PropFlags::FILE) {
                    p.clear_dirty();
                    p.flags_mut().insert(PropFlags::FILE);
                }
            }
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("sections", &self.sections)
            .field("next_id", &self.next_id)
            .field("filename", &self.filename)
            .field("triggers_enabled", &self.triggers_enabled)
            .finish_non_exhaustive()
    }
}
