// ABOUTME: Layered property-table merge with asymmetric storage adoption
// ABOUTME: Also merges function tables by concatenation
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Table Merge
//!
//! Modules layer property declarations: generic defaults, topped by
//! role-specific defaults, topped by instance overrides. [`combine_props`]
//! builds the derived table.
//!
//! The subtle part is storage adoption. When an override redeclares a
//! property without supplying its own storage, and the base declaration
//! writes through to a caller-owned shared slot, the merged entry must keep
//! writing through to that same slot. A naive "later wins" merge would
//! silently disconnect the property from the memory its module reads.

use crate::property::Property;
use crate::request::Function;

/// Merge two property tables; `over` entries take precedence by name.
///
/// Override entries come first in their original order, followed by base
/// entries not redeclared, in their original order. An override entry with
/// empty storage adopts the base entry's shared slot (and capacity) when the
/// base storage is caller-owned; engine-owned base storage is never adopted.
#[must_use]
pub fn combine_props(base: Vec<Property>, mut over: Vec<Property>) -> Vec<Property> {
    for entry in &mut over {
        if !entry.storage().is_empty() {
            continue;
        }
        let adopted = base
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(entry.name()))
            .and_then(|b| b.shared_slot().map(|slot| (slot.clone(), b.dsize())));
        if let Some((slot, dsize)) = adopted {
            entry.adopt_slot(slot, dsize);
        }
    }
    let mut merged = over;
    for b in base {
        if merged
            .iter()
            .all(|m| !m.name().eq_ignore_ascii_case(b.name()))
        {
            merged.push(b);
        }
    }
    merged
}

/// Merge two function tables by concatenation, first table first.
#[must_use]
pub fn combine_funcs(mut first: Vec<Function>, second: Vec<Function>) -> Vec<Function> {
    first.extend(second);
    first
}
