// ABOUTME: Self-describing schema export for UI/controller discovery
// ABOUTME: Emits section layout, property descriptors, and the function table
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Schema Export
//!
//! [`Config::add_info`] describes the registry to a remote controller: which
//! sections exist, what properties they hold (name, type, size, default, UI
//! hints), and which functions are callable with what arity. Controllers
//! build their edit forms from this document without compiled-in knowledge of
//! the modules behind it.

use crate::config::Config;
use crate::property::{PropFlags, Property};
use serde_json::{json, Map, Value as Json};

impl Config {
    /// Add the `configuration` and `functions` schema arrays to `out`.
    ///
    /// Sections flagged `NOINFO` are omitted entirely; so are properties
    /// flagged `NOINFO` or `FILEONLY`. Builtin functions are registered first
    /// so they always appear in the function table.
    pub fn add_info(&mut self, out: &mut Map<String, Json>) {
        self.ensure_builtins();

        let mut sections = Vec::new();
        for s in &self.sections {
            if s.flags().contains(PropFlags::NOINFO) {
                continue;
            }
            let props: Vec<Json> = s
                .items()
                .iter()
                .filter(|p| {
                    !p.flags()
                        .intersects(PropFlags::NOINFO | PropFlags::FILEONLY)
                })
                .map(describe)
                .collect();
            sections.push(json!({ s.name(): props }));
        }
        out.insert("configuration".to_string(), Json::Array(sections));

        let funcs: Vec<Json> = self
            .funcs
            .iter()
            .map(|f| json!({ "name": f.name(), "nargs": f.nargs() }))
            .collect();
        out.insert("functions".to_string(), Json::Array(funcs));
    }

    /// The full schema document as a standalone object.
    pub fn info(&mut self) -> Json {
        let mut out = Map::new();
        self.add_info(&mut out);
        Json::Object(out)
    }
}

fn describe(p: &Property) -> Json {
    let mut d = Map::new();
    d.insert("name".to_string(), Json::from(p.name()));
    d.insert("type".to_string(), Json::from(p.kind().to_string()));
    if p.dsize() > 0 {
        d.insert("size".to_string(), Json::from(p.dsize()));
    }
    if let Some(def) = p.default_value() {
        d.insert("default".to_string(), Json::from(def));
    }
    if let Some(scope) = p.scope() {
        d.insert("scope".to_string(), Json::from(scope));
        if let Some(values) = p.values_hint() {
            d.insert("values".to_string(), Json::from(values));
        }
        if let Some(labels) = p.labels() {
            d.insert("labels".to_string(), Json::from(labels));
        }
    }
    if let Some(units) = p.units() {
        d.insert("units".to_string(), Json::from(units));
    }
    if p.scale() != 0.0 {
        d.insert("scale".to_string(), Json::from(f64::from(p.scale())));
    }
    if p.precision() != 0 {
        d.insert("precision".to_string(), Json::from(p.precision()));
    }
    Json::Object(d)
}
