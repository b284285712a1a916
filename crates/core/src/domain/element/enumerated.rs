//! Enumerated selector element

use super::{AttachedControl, Capabilities, ElementState};
use crate::domain::control::{ControlId, Direction, MixerError, RawControl, Result};
use std::sync::Arc;
use tracing::debug;

/// Element backed by a single enumerated control.
///
/// `enum_caps` restricts which directions report enumeration: both for the
/// generic selector, one for the playback/capture specializations.
#[derive(Debug)]
pub struct EnumElement {
    enum_caps: Capabilities,
    control: Option<AttachedControl>,
}

impl EnumElement {
    pub fn new(enum_caps: Capabilities) -> Self {
        Self {
            enum_caps,
            control: None,
        }
    }

    pub fn is_attached_any(&self) -> bool {
        self.control.is_some()
    }

    pub fn attach(
        &mut self,
        state: &mut ElementState,
        control: Arc<dyn RawControl>,
    ) -> Result<Option<Capabilities>> {
        let attached = AttachedControl::attach(control)?;
        debug!(
            element = %state.id,
            control = %attached.id(),
            items = attached.info().item_count(),
            count = attached.count(),
            "Attaching enumerated control"
        );
        state.channels = attached.count();
        state.caps.insert(self.enum_caps);
        self.control = Some(attached);
        Ok(Some(self.enum_caps))
    }

    pub fn update(&mut self, control: &ControlId) -> Result<bool> {
        match self.control.as_mut() {
            Some(attached) if attached.is(control) => {
                attached.refresh()?;
                debug!(control = %control, values = ?attached.values(), "Refreshed cached items");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn is_attached(&self, control: &ControlId) -> bool {
        self.control.as_ref().is_some_and(|attached| attached.is(control))
    }

    /// Only an attached selector counts as enumerated
    pub fn is_enumerated(&self, dir: Option<Direction>) -> bool {
        if self.control.is_none() {
            return false;
        }
        match dir {
            None => true,
            Some(dir) => self.enum_caps.contains(Capabilities::enumerated(dir)),
        }
    }

    fn items(&self) -> &[String] {
        self.control
            .as_ref()
            .map(|attached| attached.info().items.as_slice())
            .unwrap_or(&[])
    }

    /// Number of selectable items, the same for every direction
    pub fn item_count(&self) -> usize {
        self.items().len()
    }

    pub fn item_name(&self, item: usize) -> Result<&str> {
        let items = self.items();
        items
            .get(item)
            .map(String::as_str)
            .ok_or(MixerError::ItemOutOfRange {
                item,
                items: items.len(),
            })
    }

    pub fn get_item(&self, state: &ElementState, chn: usize) -> Result<usize> {
        state.check_channel(chn)?;
        let attached = self.control.as_ref().ok_or_else(|| state.unsupported("enum"))?;
        Ok(attached.value(chn)?.max(0) as usize)
    }

    pub fn set_item(&mut self, state: &ElementState, chn: usize, item: usize) -> Result<()> {
        state.check_channel(chn)?;
        let attached = self.control.as_mut().ok_or_else(|| state.unsupported("enum"))?;
        let items = attached.info().item_count();
        if item >= items {
            return Err(MixerError::ItemOutOfRange { item, items });
        }
        if attached.replace(chn, item as i64)? {
            debug!(element = %state.id, channel = chn, item, "Item written");
        }
        Ok(())
    }
}
