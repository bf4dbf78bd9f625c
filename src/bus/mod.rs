//! The property bus: a registry mapping slash-separated string paths
//! (e.g. `velocities/vt-fps`) to scalar accessors shared by every module.
//!
//! Modules publish their outputs at bind time and hold [`PropertyId`]
//! handles for per-tick access; scripts, the input console, and the output
//! writer go through the string paths. The set of names is effectively
//! closed once binding completes.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("duplicate property path: {0}")]
    Duplicate(String),
    #[error("unknown property path: {0}")]
    NotFound(String),
    #[error("property is read-only: {0}")]
    ReadOnly(String),
    #[error("invalid value {value:?} for property {path}")]
    Parse { path: String, value: String },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Stable handle to a bus entry. Handles stay valid across unbinds; the
/// entry behind an unbound handle reads as 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug)]
struct Entry {
    path: String,
    value: f64,
    access: Access,
    owner: &'static str,
    bound: bool,
    /// Created by `touch` ahead of its producer; a later `publish` claims
    /// the node instead of reporting a duplicate.
    provisional: bool,
}

/// Snapshot row for catalog dumps.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub path: String,
    pub value: f64,
    pub writable: bool,
}

#[derive(Debug, Default)]
pub struct PropertyBus {
    index: HashMap<String, PropertyId>,
    entries: Vec<Entry>,
}

impl PropertyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property. Fails if the path already has a producer.
    pub fn publish(
        &mut self,
        owner: &'static str,
        path: &str,
        initial: f64,
        access: Access,
    ) -> Result<PropertyId> {
        if let Some(&id) = self.index.get(path) {
            let entry = &mut self.entries[id.0];
            if entry.bound && !entry.provisional {
                return Err(BusError::Duplicate(path.to_string()));
            }
            // Claim a provisional node, or revive a tombstoned one.
            entry.value = initial;
            entry.access = access;
            entry.owner = owner;
            entry.bound = true;
            entry.provisional = false;
            return Ok(id);
        }
        let id = PropertyId(self.entries.len());
        self.entries.push(Entry {
            path: path.to_string(),
            value: initial,
            access,
            owner,
            bound: true,
            provisional: false,
        });
        self.index.insert(path.to_string(), id);
        Ok(id)
    }

    /// Resolve an existing path to its handle.
    pub fn subscribe(&self, path: &str) -> Result<PropertyId> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| BusError::NotFound(path.to_string()))
    }

    /// Resolve a path, creating a provisional writable node if none exists
    /// yet. Control channels and coefficient functions may reference
    /// properties before their producer binds; the producer's later
    /// `publish` claims the node with its own access mode.
    pub fn touch(&mut self, owner: &'static str, path: &str) -> PropertyId {
        if let Some(&id) = self.index.get(path) {
            let entry = &mut self.entries[id.0];
            if !entry.bound {
                entry.bound = true;
                entry.provisional = true;
                entry.owner = owner;
            }
            return id;
        }
        let id = PropertyId(self.entries.len());
        self.entries.push(Entry {
            path: path.to_string(),
            value: 0.0,
            access: Access::ReadWrite,
            owner,
            bound: true,
            provisional: true,
        });
        self.index.insert(path.to_string(), id);
        id
    }

    #[inline]
    pub fn get(&self, id: PropertyId) -> f64 {
        self.entries[id.0].value
    }

    #[inline]
    pub fn set(&mut self, id: PropertyId, value: f64) {
        self.entries[id.0].value = value;
    }

    #[inline]
    pub fn get_bool(&self, id: PropertyId) -> bool {
        self.entries[id.0].value > 0.5
    }

    pub fn get_path(&self, path: &str) -> Result<f64> {
        self.subscribe(path).map(|id| self.get(id))
    }

    /// Write through the string interface. This is the external surface
    /// (scripts, console); it honors the access mode.
    pub fn set_path(&mut self, path: &str, value: f64) -> Result<()> {
        let id = self.subscribe(path)?;
        let entry = &mut self.entries[id.0];
        if entry.access == Access::ReadOnly {
            return Err(BusError::ReadOnly(path.to_string()));
        }
        entry.value = value;
        Ok(())
    }

    /// Remove every property a module published. Handles held elsewhere stay
    /// valid but read 0.0 until the path is published again.
    pub fn unbind(&mut self, owner: &'static str) {
        for entry in &mut self.entries {
            if entry.owner == owner && entry.bound {
                entry.bound = false;
                entry.value = 0.0;
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index
            .get(path)
            .map(|id| self.entries[id.0].bound)
            .unwrap_or(false)
    }

    /// All bound properties in publication order.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.bound)
            .map(|e| CatalogEntry {
                path: e.path.clone(),
                value: e.value,
                writable: e.access == Access::ReadWrite,
            })
            .collect()
    }

    pub fn catalog_json(&self) -> String {
        serde_json::to_string_pretty(&self.catalog()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_read_back() {
        let mut bus = PropertyBus::new();
        let id = bus
            .publish("test", "velocities/vt-fps", 120.0, Access::ReadOnly)
            .unwrap();
        assert_eq!(bus.get(id), 120.0);
        assert_eq!(bus.get_path("velocities/vt-fps").unwrap(), 120.0);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut bus = PropertyBus::new();
        bus.publish("a", "aero/alpha-rad", 0.0, Access::ReadOnly)
            .unwrap();
        let err = bus
            .publish("b", "aero/alpha-rad", 0.0, Access::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, BusError::Duplicate(_)));
    }

    #[test]
    fn external_write_honors_access() {
        let mut bus = PropertyBus::new();
        bus.publish("fcs", "fcs/elevator-cmd-norm", 0.0, Access::ReadWrite)
            .unwrap();
        bus.publish("aux", "velocities/mach", 0.0, Access::ReadOnly)
            .unwrap();
        bus.set_path("fcs/elevator-cmd-norm", -0.25).unwrap();
        assert_eq!(bus.get_path("fcs/elevator-cmd-norm").unwrap(), -0.25);
        assert!(matches!(
            bus.set_path("velocities/mach", 0.5),
            Err(BusError::ReadOnly(_))
        ));
    }

    #[test]
    fn unbind_tombstones_and_revives() {
        let mut bus = PropertyBus::new();
        let id = bus
            .publish("gear", "gear/unit-pos-norm", 1.0, Access::ReadOnly)
            .unwrap();
        bus.unbind("gear");
        assert!(!bus.contains("gear/unit-pos-norm"));
        assert_eq!(bus.get(id), 0.0);
        let id2 = bus
            .publish("gear", "gear/unit-pos-norm", 0.5, Access::ReadOnly)
            .unwrap();
        assert_eq!(id, id2);
        assert_eq!(bus.get(id), 0.5);
    }

    #[test]
    fn touch_creates_missing_node() {
        let mut bus = PropertyBus::new();
        let id = bus.touch("script", "ap/heading_setpoint");
        bus.set(id, 200.0);
        assert_eq!(bus.get_path("ap/heading_setpoint").unwrap(), 200.0);
    }

    #[test]
    fn producer_claims_touched_node() {
        let mut bus = PropertyBus::new();
        // A consumer references the property before its producer binds.
        let consumer_id = bus.touch("aero-function", "aero/alpha-rad");
        let producer_id = bus
            .publish("aux", "aero/alpha-rad", 0.1, Access::ReadOnly)
            .unwrap();
        assert_eq!(consumer_id, producer_id);
        assert_eq!(bus.get(consumer_id), 0.1);
        // A second producer is still a duplicate.
        assert!(matches!(
            bus.publish("other", "aero/alpha-rad", 0.0, Access::ReadOnly),
            Err(BusError::Duplicate(_))
        ));
    }
}
