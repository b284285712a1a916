//! Mixer element registry and notification dispatcher
//!
//! The [`Mixer`] owns every logical element, maps newly discovered raw
//! controls onto elements through the [`ControlTable`], and routes value
//! notifications to the element a control is bound to. Processing is
//! single-threaded: notifications are handled one at a time, in order.

pub mod table;

use crate::domain::control::{ControlEvent, ControlId, Direction, EventMask, RawControl, Result};
use crate::domain::element::{Capabilities, ElementId, MixerElement};
use crate::domain::range::ValueRange;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

pub use table::{ControlKey, ControlTable, ElementDescriptor};

/// Observer notification for UI refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerEvent {
    /// A new logical element was created
    Added(ElementId),
    /// Element metadata changed (a sub-control attached)
    Info(ElementId),
    /// Element values changed (hardware notification applied)
    Value(ElementId),
}

pub struct Mixer {
    table: ControlTable,
    elements: Vec<MixerElement>,
    by_id: HashMap<ElementId, usize>,
    /// Raw control numid to owning element position
    bindings: HashMap<u32, usize>,
    subscribers: Vec<Sender<MixerEvent>>,
    default_range: [Option<ValueRange>; 2],
}

impl Mixer {
    pub fn new(table: ControlTable) -> Self {
        Self {
            table,
            elements: Vec::new(),
            by_id: HashMap::new(),
            bindings: HashMap::new(),
            subscribers: Vec::new(),
            default_range: [None, None],
        }
    }

    /// Normalized range applied to every element's volume in `dir` after
    /// attach, instead of the hardware-seeded one
    pub fn with_default_range(mut self, dir: Direction, range: ValueRange) -> Self {
        self.default_range[dir.index()] = Some(range);
        self
    }

    pub fn table(&self) -> &ControlTable {
        &self.table
    }

    /// Receive element events from now on
    pub fn subscribe(&mut self) -> Receiver<MixerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: MixerEvent) {
        trace!(?event, "Emitting mixer event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Map a newly discovered raw control onto its element.
    ///
    /// Returns the element position, or `None` when the control is not in
    /// the table or does not fit the element.
    pub fn control_discovered(&mut self, control: Arc<dyn RawControl>) -> Result<Option<usize>> {
        let key = ControlKey::from(control.id());
        let Some(descriptor) = self.table.lookup(&key).cloned() else {
            trace!(%key, "Control not in table, ignoring");
            return Ok(None);
        };

        let numid = control.id().numid;
        let (pos, filled) = match self.by_id.get(&descriptor.element) {
            Some(&pos) => match self.elements[pos].attach(control)? {
                Some(filled) => (pos, filled),
                None => return Ok(None),
            },
            None => {
                // Register only once the first control is attached, so a failed
                // attach leaves no empty element behind
                let mut element = MixerElement::new(
                    descriptor.element.clone(),
                    descriptor.weight,
                    descriptor.class,
                );
                let Some(filled) = element.attach(control)? else {
                    return Ok(None);
                };
                let pos = self.elements.len();
                self.elements.push(element);
                self.by_id.insert(descriptor.element.clone(), pos);
                debug!(
                    element = %descriptor.element,
                    weight = descriptor.weight,
                    class = ?descriptor.class,
                    "Created mixer element"
                );
                self.emit(MixerEvent::Added(descriptor.element.clone()));
                (pos, filled)
            }
        };

        // The configured range replaces the hardware seed of a freshly attached volume
        let element = &mut self.elements[pos];
        for dir in Direction::ALL {
            if let Some(range) = self.default_range[dir.index()] {
                if filled.contains(Capabilities::volume(dir)) {
                    element.set_range(dir, range.min, range.max)?;
                }
            }
        }
        self.bindings.insert(numid, pos);
        self.emit(MixerEvent::Info(descriptor.element));
        Ok(Some(pos))
    }

    /// Handle one control notification
    pub fn handle_event(&mut self, event: &ControlEvent) -> Result<()> {
        let mask = event.mask;
        if mask.is_remove() {
            // Elements are kept for the lifetime of the session
            debug!(control = %event.control.id(), "Ignoring control removal");
            return Ok(());
        }
        if mask.contains(EventMask::ADD) {
            self.control_discovered(event.control.clone())?;
        }
        if mask.contains(EventMask::VALUE) {
            self.control_changed(event.control.id())?;
        }
        Ok(())
    }

    /// Apply a value notification to the bound element, if any
    pub fn control_changed(&mut self, control: &ControlId) -> Result<bool> {
        let Some(&pos) = self.bindings.get(&control.numid) else {
            trace!(%control, "Value change on unbound control");
            return Ok(false);
        };
        let element = &mut self.elements[pos];
        if !element.update(control)? {
            return Ok(false);
        }
        let id = element.id().clone();
        self.emit(MixerEvent::Value(id));
        Ok(true)
    }

    /// Elements in creation order
    pub fn elements(&self) -> impl Iterator<Item = &MixerElement> {
        self.elements.iter()
    }

    /// Elements ordered by weight, then name, then index
    pub fn sorted_elements(&self) -> Vec<&MixerElement> {
        let mut sorted: Vec<_> = self.elements.iter().collect();
        sorted.sort_by(|a, b| {
            a.weight()
                .cmp(&b.weight())
                .then_with(|| a.name().cmp(b.name()))
                .then_with(|| a.index().cmp(&b.index()))
        });
        sorted
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: &ElementId) -> Option<&MixerElement> {
        self.by_id.get(id).map(|&pos| &self.elements[pos])
    }

    pub fn element_mut(&mut self, id: &ElementId) -> Option<&mut MixerElement> {
        self.by_id.get(id).map(|&pos| &mut self.elements[pos])
    }

    pub fn find(&self, name: &str, index: u32) -> Option<&MixerElement> {
        self.element(&ElementId::new(name, index))
    }

    pub fn find_mut(&mut self, name: &str, index: u32) -> Option<&mut MixerElement> {
        self.element_mut(&ElementId::new(name, index))
    }

    /// Element a raw control is attached to
    pub fn bound_element(&self, control: &ControlId) -> Option<&MixerElement> {
        self.bindings
            .get(&control.numid)
            .map(|&pos| &self.elements[pos])
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(ControlTable::default())
    }
}
