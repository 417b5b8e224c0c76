// ABOUTME: Property type: one named, typed, flagged value with trigger and metadata
// ABOUTME: Owns the set_value lifecycle, storage ownership model, and reentrancy guard
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Property Lifecycle
//!
//! A [`Property`] is one named, typed configuration value with flags,
//! optional default, presentation metadata, and an optional change trigger.
//!
//! [`Property::set_value`] is the single choke point for every value mutation
//! in the system: file loads, JSON loads, remote sets, and id-based writes all
//! funnel through it. No other path may touch the backing storage.
//!
//! ## Storage ownership
//!
//! Backing storage is either engine-owned ([`Storage::Owned`], produced only
//! by the engine's own write path) or a caller-owned [`SharedSlot`] with a
//! fixed byte capacity that the engine can fill but never free or replace.
//! Exceeding a shared slot's capacity fails with
//! [`ConfigError::StorageOverflow`] and leaves the previous value intact.

use crate::errors::ConfigError;
use crate::value::{convert, Kind, Value};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

bitflags! {
    /// Per-property (and per-section) behavior flags.
    ///
    /// Each flag is an independent boolean invariant; see the crate docs for
    /// the persistence and export rules they drive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PropFlags: u32 {
        /// Writes through the administrative `set` function are rejected.
        const READONLY = 0x0001;
        /// Excluded from persisted output.
        const NOSAVE   = 0x0002;
        /// Excluded from id-map assignment.
        const NOID     = 0x0004;
        /// Current value was sourced from persisted storage.
        const FILE     = 0x0008;
        /// Exists only in persisted storage; not declared by any module.
        const FILEONLY = 0x0010;
        /// Excluded from telemetry export.
        const NOPUB    = 0x0040;
        /// Suppress applying the default on registration.
        const NODEF    = 0x0080;
        /// Excluded from the self-describing schema export.
        const NOINFO   = 0x0200;
        /// Included in telemetry export even under a `NOPUB` exclusion mask.
        const PUB      = 0x0400;
        /// Suppress duplicate-registration warnings.
        const NOWARN   = 0x1000;
        /// Suppress trigger invocation.
        const NOTRIG   = 0x2000;
        /// At least one explicit value has been set.
        const VALUE    = 0x4000;
        /// Reentrancy guard; set for the duration of a trigger call.
        const IN_TRIG  = 0x8000;
    }
}

impl Default for PropFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Change-notification callback.
///
/// Invoked after a committed value change with the property and a snapshot of
/// the value immediately prior to the write. Returning `Err` surfaces
/// [`ConfigError::TriggerFailed`] to the writer; the write is not rolled back.
pub type Trigger = Box<dyn FnMut(&mut Property, Option<&Value>) -> Result<(), String> + Send>;

/// A caller-owned, capacity-bounded storage slot.
///
/// The registering module keeps a clone and observes every write the engine
/// makes. The engine can never free or replace the slot; it only fills it.
#[derive(Clone)]
pub struct SharedSlot {
    cell: Arc<RwLock<Option<Value>>>,
    capacity: usize,
}

impl SharedSlot {
    /// Create an empty slot able to hold `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cell: Arc::new(RwLock::new(None)),
            capacity,
        }
    }

    /// Create a slot holding an initial value.
    #[must_use]
    pub fn with_value(value: Value, capacity: usize) -> Self {
        Self {
            cell: Arc::new(RwLock::new(Some(value))),
            capacity,
        }
    }

    /// Read the current value out of the slot.
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Byte capacity of the slot.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether two handles refer to the same underlying slot.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    fn set(&self, value: Value) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

impl std::fmt::Debug for SharedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSlot")
            .field("capacity", &self.capacity)
            .field("value", &self.get())
            .finish()
    }
}

/// Backing storage for a property value.
#[derive(Debug, Default)]
pub enum Storage {
    /// No storage yet; the first write allocates engine-owned storage.
    #[default]
    Empty,
    /// Engine-owned storage. Only the engine's write path produces this.
    Owned(Value),
    /// Caller-owned shared slot with a fixed capacity.
    Shared(SharedSlot),
}

impl Storage {
    /// Current value, if any.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::Owned(v) => Some(v.clone()),
            Self::Shared(slot) => slot.get(),
        }
    }

    /// True when no storage has been attached yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The shared slot, when storage is caller-owned.
    #[must_use]
    pub const fn shared_slot(&self) -> Option<&SharedSlot> {
        match self {
            Self::Shared(slot) => Some(slot),
            _ => None,
        }
    }
}

/// One named, typed, flagged configuration value.
pub struct Property {
    name: String,
    kind: Kind,
    storage: Storage,
    /// Capacity of the backing storage in bytes. Fixed for shared slots,
    /// grows with writes for engine-owned storage.
    dsize: usize,
    /// Logically-used length of the current value.
    len: usize,
    def: Option<String>,
    flags: PropFlags,
    scope: Option<String>,
    values: Option<String>,
    labels: Option<String>,
    units: Option<String>,
    scale: f32,
    precision: i32,
    dirty: bool,
    id: Option<u32>,
    trigger: Option<Trigger>,
}

impl Property {
    /// Declare a property of the given kind with empty storage.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            storage: Storage::Empty,
            dsize: 0,
            len: 0,
            def: None,
            flags: PropFlags::empty(),
            scope: None,
            values: None,
            labels: None,
            units: None,
            scale: 0.0,
            precision: 0,
            dirty: false,
            id: None,
            trigger: None,
        }
    }

    /// Attach a caller-owned shared slot as backing storage.
    #[must_use]
    pub fn with_slot(mut self, slot: SharedSlot) -> Self {
        self.dsize = slot.capacity();
        self.storage = Storage::Shared(slot);
        self
    }

    /// Set the default value, applied on registration unless `NODEF`.
    #[must_use]
    pub fn with_default(mut self, def: impl Into<String>) -> Self {
        self.def = Some(def.into());
        self
    }

    /// Set behavior flags.
    #[must_use]
    pub fn with_flags(mut self, flags: PropFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Attach a change trigger.
    #[must_use]
    pub fn with_trigger(
        mut self,
        trigger: impl FnMut(&mut Self, Option<&Value>) -> Result<(), String> + Send + 'static,
    ) -> Self {
        self.trigger = Some(Box::new(trigger));
        self
    }

    /// Set the UI scope hint (select/range/etc), opaque to the engine.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the scope values hint.
    #[must_use]
    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = Some(values.into());
        self
    }

    /// Set the labels hint.
    #[must_use]
    pub fn with_labels(mut self, labels: impl Into<String>) -> Self {
        self.labels = Some(labels.into());
        self
    }

    /// Set the units hint.
    #[must_use]
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Set numeric display scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Set numeric display precision.
    #[must_use]
    pub const fn with_precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic kind.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// Behavior flags.
    #[must_use]
    pub const fn flags(&self) -> PropFlags {
        self.flags
    }

    /// Mutable access to the flags.
    pub fn flags_mut(&mut self) -> &mut PropFlags {
        &mut self.flags
    }

    /// Process-lifetime-stable numeric id, once assigned.
    #[must_use]
    pub const fn id(&self) -> Option<u32> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: u32) {
        self.id = Some(id);
    }

    /// Declared default value as text.
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.def.as_deref()
    }

    /// Changed since the last successful persistence pass.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Storage capacity in bytes.
    #[must_use]
    pub const fn dsize(&self) -> usize {
        self.dsize
    }

    /// Logically-used length of the current value.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.value().is_none()
    }

    /// Backing storage.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The caller-owned slot, when storage is shared.
    #[must_use]
    pub const fn shared_slot(&self) -> Option<&SharedSlot> {
        self.storage.shared_slot()
    }

    /// Current value, if any.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.storage.value()
    }

    /// Current value rendered as a string through the conversion primitive.
    #[must_use]
    pub fn value_as_string(&self) -> Option<String> {
        let v = self.storage.value()?;
        match convert(Kind::String, &v) {
            Ok(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// UI hints: scope, scope values, labels, units.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Scope values hint.
    #[must_use]
    pub fn values_hint(&self) -> Option<&str> {
        self.values.as_deref()
    }

    /// Labels hint.
    #[must_use]
    pub fn labels(&self) -> Option<&str> {
        self.labels.as_deref()
    }

    /// Units hint.
    #[must_use]
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Numeric display scale.
    #[must_use]
    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// Numeric display precision.
    #[must_use]
    pub const fn precision(&self) -> i32 {
        self.precision
    }

    pub(crate) fn adopt_slot(&mut self, slot: SharedSlot, dsize: usize) {
        self.dsize = dsize;
        self.storage = Storage::Shared(slot);
    }

    pub(crate) fn take_value_for_transplant(&self) -> Option<Value> {
        self.storage.value()
    }

    /// Write a value.
    ///
    /// The source is converted to this property's kind first; a conversion
    /// failure or a shared-slot capacity overflow leaves the previous value
    /// intact. On a committed write the `VALUE` flag is set, `dirty` takes the
    /// caller-supplied value, and the trigger (if any, and if enabled and not
    /// suppressed by `NOTRIG`) is invoked with a snapshot of the previous
    /// value.
    ///
    /// A trigger error ([`ConfigError::TriggerFailed`]) and a reentrant write
    /// from inside this property's own trigger
    /// ([`ConfigError::NestedTrigger`]) are surfaced to the caller, but the
    /// write itself is committed in both cases.
    pub fn set_value(
        &mut self,
        src: Value,
        dirty: bool,
        trigger_enabled: bool,
    ) -> Result<(), ConfigError> {
        let fire = trigger_enabled && !self.flags.contains(PropFlags::NOTRIG);
        // Inside our own trigger the callback is temporarily detached, so the
        // guard flag is the authority, not trigger presence.
        let nested = fire && self.flags.contains(PropFlags::IN_TRIG);
        let want_trigger = fire && !nested && self.trigger.is_some();

        // Snapshot before the write can shrink or replace the live value.
        let old = if want_trigger {
            self.storage.value()
        } else {
            None
        };

        let converted = convert(self.kind, &src)?;
        let needed = converted.required_capacity();

        match &mut self.storage {
            Storage::Shared(slot) => {
                // Caller-owned capacity is a hard ceiling.
                if needed > slot.capacity() {
                    return Err(ConfigError::StorageOverflow {
                        name: self.name.clone(),
                        needed,
                        capacity: slot.capacity(),
                    });
                }
                self.len = converted.logical_len();
                slot.set(converted);
            }
            Storage::Owned(v) => {
                if needed > self.dsize {
                    self.dsize = needed;
                }
                self.len = converted.logical_len();
                *v = converted;
            }
            slot @ Storage::Empty => {
                self.dsize = self.dsize.max(needed);
                self.len = converted.logical_len();
                *slot = Storage::Owned(converted);
            }
        }

        self.flags.insert(PropFlags::VALUE);
        self.dirty = dirty;

        if nested {
            return Err(ConfigError::NestedTrigger(self.name.clone()));
        }
        if want_trigger {
            self.flags.insert(PropFlags::IN_TRIG);
            let mut trigger = self.trigger.take();
            let result = trigger.as_mut().map(|f| f(self, old.as_ref()));
            self.trigger = trigger;
            self.flags.remove(PropFlags::IN_TRIG);
            if let Some(Err(message)) = result {
                return Err(ConfigError::TriggerFailed {
                    name: self.name.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    /// Reset to the declared default (or the kind's zero value when none is
    /// declared), clearing the `FILE`/`FILEONLY`/`VALUE` flags and the dirty
    /// mark. The trigger still fires with the old value.
    pub fn clear_to_default(&mut self, trigger_enabled: bool) -> Result<(), ConfigError> {
        let result = match self.def.clone() {
            Some(def) => self.set_value(Value::String(def), false, trigger_enabled),
            None => self.set_value(self.kind.zero_value(), false, trigger_enabled),
        };
        self.flags
            .remove(PropFlags::FILE | PropFlags::FILEONLY | PropFlags::VALUE);
        self.dirty = false;
        result
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &self.storage.value())
            .field("flags", &self.flags)
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn first_write_allocates_engine_owned_storage() {
        let mut p = Property::new("interval", Kind::Int);
        assert!(p.storage().is_empty());
        p.set_value(Value::Int(30), true, true).unwrap();
        assert!(matches!(p.storage(), Storage::Owned(_)));
        assert_eq!(p.value(), Some(Value::Int(30)));
        assert!(p.is_dirty());
        assert!(p.flags().contains(PropFlags::VALUE));
    }

    #[test]
    fn conversion_failure_leaves_previous_value() {
        let mut p = Property::new("interval", Kind::Int);
        p.set_value(Value::Int(30), false, true).unwrap();
        let err = p
            .set_value(Value::String("garbage".into()), true, true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConversionFailed(_)));
        assert_eq!(p.value(), Some(Value::Int(30)));
        assert!(!p.is_dirty());
    }

    #[test]
    fn shared_slot_overflow_is_rejected() {
        let slot = SharedSlot::new(8);
        let mut p = Property::new("name", Kind::String).with_slot(slot.clone());
        p.set_value(Value::String("short".into()), true, true).unwrap();
        let err = p
            .set_value(Value::String("definitely too long".into()), true, true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::StorageOverflow { .. }));
        assert_eq!(slot.get(), Some(Value::String("short".into())));
    }

    #[test]
    fn clear_resets_flags_and_applies_default() {
        let mut p = Property::new("mode", Kind::String).with_default("auto");
        p.set_value(Value::String("manual".into()), true, true).unwrap();
        p.flags_mut().insert(PropFlags::FILE);
        p.clear_to_default(true).unwrap();
        assert_eq!(p.value(), Some(Value::String("auto".into())));
        assert!(!p.flags().intersects(
            PropFlags::FILE | PropFlags::FILEONLY | PropFlags::VALUE
        ));
        assert!(!p.is_dirty());
    }

    #[test]
    fn clear_without_default_resets_to_kind_zero() {
        let mut p = Property::new("interval", Kind::Int);
        p.set_value(Value::Int(7), true, true).unwrap();
        p.clear_to_default(true).unwrap();
        assert_eq!(p.value(), Some(Value::Int(0)));
        assert!(!p.is_dirty());

        let mut b = Property::new("armed", Kind::Bool);
        b.set_value(Value::Bool(true), true, true).unwrap();
        b.clear_to_default(true).unwrap();
        assert_eq!(b.value(), Some(Value::Bool(false)));
    }
}
