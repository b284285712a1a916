//! Control table: raw control identity to logical element
//!
//! Raw controls that have no entry are not part of the mixer's surface and
//! are ignored by the dispatcher.

use crate::domain::control::{ControlId, Interface};
use crate::domain::element::{ElementClass, ElementId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lookup key of a raw control: name, index and interface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlKey {
    pub name: String,
    pub index: u32,
    pub interface: Interface,
}

impl ControlKey {
    pub fn new(name: impl Into<String>, index: u32, interface: Interface) -> Self {
        Self {
            name: name.into(),
            index,
            interface,
        }
    }

    /// Mixer-interface key, the common case
    pub fn mixer(name: impl Into<String>, index: u32) -> Self {
        Self::new(name, index, Interface::Mixer)
    }
}

impl From<&ControlId> for ControlKey {
    fn from(id: &ControlId) -> Self {
        Self::new(id.name.clone(), id.index, id.interface)
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}//{}", self.name, self.index, self.interface)
    }
}

/// Which logical element a raw control belongs to, and how to build it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub element: ElementId,
    pub weight: u32,
    pub class: ElementClass,
}

impl ElementDescriptor {
    pub fn new(name: impl Into<String>, index: u32, weight: u32, class: ElementClass) -> Self {
        Self {
            element: ElementId::new(name, index),
            weight,
            class,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlTable {
    entries: HashMap<ControlKey, ElementDescriptor>,
}

impl ControlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping, returning the one it replaced
    pub fn insert(
        &mut self,
        key: ControlKey,
        descriptor: ElementDescriptor,
    ) -> Option<ElementDescriptor> {
        self.entries.insert(key, descriptor)
    }

    /// Builder-style insert
    pub fn with(mut self, key: ControlKey, descriptor: ElementDescriptor) -> Self {
        self.insert(key, descriptor);
        self
    }

    pub fn lookup(&self, key: &ControlKey) -> Option<&ElementDescriptor> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ControlKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlKey, &ElementDescriptor)> {
        self.entries.iter()
    }
}
