// ABOUTME: Section type: a named, ordered collection of unique properties
// ABOUTME: Names are case-insensitive; section flags gate persistence and export
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::property::{PropFlags, Property};

/// A named, ordered set of properties, unique by case-insensitive name.
///
/// The empty name is the "default" section. Section flags apply to the whole
/// group: `NOSAVE` excludes every contained property from persistence,
/// `NOINFO` from the schema export.
#[derive(Debug)]
pub struct Section {
    name: String,
    flags: PropFlags,
    items: Vec<Property>,
}

impl Section {
    pub(crate) fn new(name: impl Into<String>, flags: PropFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            items: Vec::new(),
        }
    }

    /// Section name; empty for the default section.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Section flags.
    #[must_use]
    pub const fn flags(&self) -> PropFlags {
        self.flags
    }

    /// Mutable access to the section flags.
    pub fn flags_mut(&mut self) -> &mut PropFlags {
        &mut self.flags
    }

    /// Contained properties in declaration order.
    #[must_use]
    pub fn items(&self) -> &[Property] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Property> {
        &mut self.items
    }

    /// Look up a property by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.items
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Mutable lookup by case-insensitive name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.items
            .iter_mut()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|p| p.name().eq_ignore_ascii_case(name))
    }
}
