//! Logical mixer elements
//!
//! A mixer element groups one or more raw hardware controls (volume and
//! switch per direction, or an enumerated selector) under one name/index
//! and exposes a uniform get/set surface in a normalized value range.

pub mod enumerated;
pub mod standard;

use crate::domain::control::{ControlId, ControlInfo, Direction, MixerError, RawControl, Result};
use crate::domain::range::ValueRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

pub use enumerated::EnumElement;
pub use standard::StandardElement;

/// Identity of a logical element
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    pub name: String,
    pub index: u32,
}

impl ElementId {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}',{}", self.name, self.index)
    }
}

/// Sub-controls an element has acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const PLAYBACK_VOLUME: Capabilities = Capabilities(1 << 0);
    pub const CAPTURE_VOLUME: Capabilities = Capabilities(1 << 1);
    pub const PLAYBACK_SWITCH: Capabilities = Capabilities(1 << 2);
    pub const CAPTURE_SWITCH: Capabilities = Capabilities(1 << 3);
    pub const PLAYBACK_ENUM: Capabilities = Capabilities(1 << 4);
    pub const CAPTURE_ENUM: Capabilities = Capabilities(1 << 5);

    const NAMES: [(Capabilities, &'static str); 6] = [
        (Self::PLAYBACK_VOLUME, "pvolume"),
        (Self::CAPTURE_VOLUME, "cvolume"),
        (Self::PLAYBACK_SWITCH, "pswitch"),
        (Self::CAPTURE_SWITCH, "cswitch"),
        (Self::PLAYBACK_ENUM, "penum"),
        (Self::CAPTURE_ENUM, "cenum"),
    ];

    pub fn volume(dir: Direction) -> Self {
        match dir {
            Direction::Playback => Self::PLAYBACK_VOLUME,
            Direction::Capture => Self::CAPTURE_VOLUME,
        }
    }

    pub fn switch(dir: Direction) -> Self {
        match dir {
            Direction::Playback => Self::PLAYBACK_SWITCH,
            Direction::Capture => Self::CAPTURE_SWITCH,
        }
    }

    pub fn enumerated(dir: Direction) -> Self {
        match dir {
            Direction::Playback => Self::PLAYBACK_ENUM,
            Direction::Capture => Self::CAPTURE_ENUM,
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Capabilities) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Short names of the set bits, in bit order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(cap, _)| self.contains(*cap))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

/// Constructor variant a control table entry selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementClass {
    /// Volume and switch per direction
    Standard,
    /// Enumerated selector, enumerated in both directions
    Enum,
    /// Enumerated selector reported as playback-only
    EnumPlayback,
    /// Enumerated selector reported as capture-only
    EnumCapture,
}

/// A raw control attached to an element, with its info snapshot and cached tuple
pub struct AttachedControl {
    control: Arc<dyn RawControl>,
    info: ControlInfo,
    values: Vec<i64>,
}

impl AttachedControl {
    /// Snapshot the control's info and read its current tuple
    pub fn attach(control: Arc<dyn RawControl>) -> Result<Self> {
        let info = control.info()?;
        let values = control.read_values(info.value_type, info.count)?;
        Ok(Self {
            control,
            info,
            values,
        })
    }

    pub fn id(&self) -> &ControlId {
        self.control.id()
    }

    pub fn info(&self) -> &ControlInfo {
        &self.info
    }

    pub fn hw_range(&self) -> ValueRange {
        ValueRange::new(self.info.min, self.info.max)
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn count(&self) -> usize {
        self.info.count
    }

    pub fn is(&self, id: &ControlId) -> bool {
        self.control.id() == id
    }

    /// Tuple slot backing `chn`; mono controls serve every channel from slot 0
    fn slot(&self, chn: usize) -> Result<usize> {
        let slot = if self.values.len() == 1 { 0 } else { chn };
        if slot < self.values.len() {
            Ok(slot)
        } else {
            Err(MixerError::ChannelOutOfRange {
                channel: chn,
                channels: self.values.len(),
            })
        }
    }

    pub fn value(&self, chn: usize) -> Result<i64> {
        Ok(self.values[self.slot(chn)?])
    }

    /// Replace one channel and write the whole tuple.
    ///
    /// Returns `Ok(false)` without touching the hardware when the cached
    /// value already matches. The cache is only replaced once the write
    /// succeeded.
    pub fn replace(&mut self, chn: usize, value: i64) -> Result<bool> {
        let slot = self.slot(chn)?;
        if self.values[slot] == value {
            trace!(control = %self.id(), channel = chn, value, "Value unchanged, skipping write");
            return Ok(false);
        }
        let mut values = self.values.clone();
        values[slot] = value;
        self.control.write_values(self.info.value_type, &values)?;
        self.values = values;
        Ok(true)
    }

    /// Set every slot and write the whole tuple once
    pub fn replace_all(&mut self, value: i64) -> Result<bool> {
        if self.values.iter().all(|v| *v == value) {
            return Ok(false);
        }
        let values = vec![value; self.values.len()];
        self.control.write_values(self.info.value_type, &values)?;
        self.values = values;
        Ok(true)
    }

    /// Re-read the tuple from hardware
    pub fn refresh(&mut self) -> Result<()> {
        self.values = self
            .control
            .read_values(self.info.value_type, self.info.count)?;
        Ok(())
    }
}

impl fmt::Debug for AttachedControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedControl")
            .field("id", self.id())
            .field("info", &self.info)
            .field("values", &self.values)
            .finish()
    }
}

/// State shared by every element variant
#[derive(Debug, Clone)]
pub struct ElementState {
    pub id: ElementId,
    pub weight: u32,
    pub channels: usize,
    pub caps: Capabilities,
    range: [ValueRange; 2],
}

impl ElementState {
    pub fn new(id: ElementId, weight: u32) -> Self {
        Self {
            id,
            weight,
            channels: 0,
            caps: Capabilities::NONE,
            range: [ValueRange::new(0, 0); 2],
        }
    }

    pub fn is_channel(&self, _dir: Direction, chn: usize) -> bool {
        chn < self.channels
    }

    pub fn check_channel(&self, chn: usize) -> Result<()> {
        if chn < self.channels {
            Ok(())
        } else {
            Err(MixerError::ChannelOutOfRange {
                channel: chn,
                channels: self.channels,
            })
        }
    }

    pub fn range(&self, dir: Direction) -> ValueRange {
        self.range[dir.index()]
    }

    /// Overwrite the normalized range; does not touch the hardware
    pub fn set_range(&mut self, dir: Direction, min: i64, max: i64) -> Result<()> {
        if min > max {
            return Err(MixerError::InvalidRange { min, max });
        }
        self.range[dir.index()] = ValueRange::new(min, max);
        Ok(())
    }

    pub fn unsupported(&self, operation: &'static str) -> MixerError {
        MixerError::Unsupported {
            element: self.id.to_string(),
            operation,
        }
    }
}

#[derive(Debug)]
enum ElementKind {
    Standard(StandardElement),
    Enumerated(EnumElement),
}

/// A logical mixer element
#[derive(Debug)]
pub struct MixerElement {
    state: ElementState,
    class: ElementClass,
    kind: ElementKind,
}

impl MixerElement {
    /// Construct an element of the given class with no sub-controls attached
    pub fn new(id: ElementId, weight: u32, class: ElementClass) -> Self {
        let kind = match class {
            ElementClass::Standard => ElementKind::Standard(StandardElement::new()),
            ElementClass::Enum => ElementKind::Enumerated(EnumElement::new(
                Capabilities::PLAYBACK_ENUM | Capabilities::CAPTURE_ENUM,
            )),
            ElementClass::EnumPlayback => {
                ElementKind::Enumerated(EnumElement::new(Capabilities::PLAYBACK_ENUM))
            }
            ElementClass::EnumCapture => {
                ElementKind::Enumerated(EnumElement::new(Capabilities::CAPTURE_ENUM))
            }
        };
        let mut state = ElementState::new(id, weight);
        if class == ElementClass::Standard {
            state.channels = 1;
        }
        Self { state, class, kind }
    }

    pub fn id(&self) -> &ElementId {
        &self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.id.name
    }

    pub fn index(&self) -> u32 {
        self.state.id.index
    }

    pub fn weight(&self) -> u32 {
        self.state.weight
    }

    pub fn class(&self) -> ElementClass {
        self.class
    }

    pub fn channels(&self) -> usize {
        self.state.channels
    }

    pub fn capabilities(&self) -> Capabilities {
        self.state.caps
    }

    /// Attach a raw control and return the capability it filled, or `None`
    /// when the control does not fit any sub-control slot of this element.
    pub fn attach(&mut self, control: Arc<dyn RawControl>) -> Result<Option<Capabilities>> {
        match &mut self.kind {
            ElementKind::Standard(s) => s.attach(&mut self.state, control),
            ElementKind::Enumerated(e) => e.attach(&mut self.state, control),
        }
    }

    /// Re-read the tuple of an attached control after a value notification.
    /// Returns `Ok(false)` when the control is not attached here.
    pub fn update(&mut self, control: &ControlId) -> Result<bool> {
        match &mut self.kind {
            ElementKind::Standard(s) => s.update(control),
            ElementKind::Enumerated(e) => e.update(control),
        }
    }

    /// Whether `control` is one of this element's sub-controls
    pub fn is_attached(&self, control: &ControlId) -> bool {
        match &self.kind {
            ElementKind::Standard(s) => s.is_attached(control),
            ElementKind::Enumerated(e) => e.is_attached(control),
        }
    }

    pub fn is_channel(&self, dir: Direction, chn: usize) -> bool {
        self.state.is_channel(dir, chn)
    }

    pub fn get_range(&self, dir: Direction) -> ValueRange {
        self.state.range(dir)
    }

    pub fn set_range(&mut self, dir: Direction, min: i64, max: i64) -> Result<()> {
        self.state.set_range(dir, min, max)
    }

    pub fn has_volume(&self, dir: Direction) -> bool {
        self.state.caps.contains(Capabilities::volume(dir))
    }

    pub fn has_switch(&self, dir: Direction) -> bool {
        self.state.caps.contains(Capabilities::switch(dir))
    }

    fn standard(&self, cap: Capabilities, operation: &'static str) -> Result<&StandardElement> {
        match &self.kind {
            ElementKind::Standard(s) if self.state.caps.contains(cap) => Ok(s),
            _ => Err(self.state.unsupported(operation)),
        }
    }

    fn standard_mut(
        &mut self,
        cap: Capabilities,
        operation: &'static str,
    ) -> Result<(&mut StandardElement, &ElementState)> {
        match &mut self.kind {
            ElementKind::Standard(s) if self.state.caps.contains(cap) => Ok((s, &self.state)),
            _ => Err(self.state.unsupported(operation)),
        }
    }

    fn enumerated(&self, operation: &'static str) -> Result<&EnumElement> {
        match &self.kind {
            ElementKind::Enumerated(e) if e.is_attached_any() => Ok(e),
            _ => Err(self.state.unsupported(operation)),
        }
    }

    pub fn get_volume(&self, dir: Direction, chn: usize) -> Result<i64> {
        self.standard(Capabilities::volume(dir), "volume")?
            .get_volume(&self.state, dir, chn)
    }

    pub fn set_volume(&mut self, dir: Direction, chn: usize, value: i64) -> Result<()> {
        let (s, state) = self.standard_mut(Capabilities::volume(dir), "volume")?;
        s.set_volume(state, dir, chn, value)
    }

    /// Set the volume of every channel in one direction
    pub fn set_volume_all(&mut self, dir: Direction, value: i64) -> Result<()> {
        let (s, state) = self.standard_mut(Capabilities::volume(dir), "volume")?;
        s.set_volume_all(state, dir, value)
    }

    pub fn get_switch(&self, dir: Direction, chn: usize) -> Result<bool> {
        self.standard(Capabilities::switch(dir), "switch")?
            .get_switch(&self.state, dir, chn)
    }

    pub fn set_switch(&mut self, dir: Direction, chn: usize, on: bool) -> Result<()> {
        let (s, state) = self.standard_mut(Capabilities::switch(dir), "switch")?;
        s.set_switch(state, dir, chn, on)
    }

    /// Set the switch of every channel in one direction
    pub fn set_switch_all(&mut self, dir: Direction, on: bool) -> Result<()> {
        let (s, state) = self.standard_mut(Capabilities::switch(dir), "switch")?;
        s.set_switch_all(state, dir, on)
    }

    /// `None` asks whether the element is enumerated at all
    pub fn is_enumerated(&self, dir: Option<Direction>) -> bool {
        match &self.kind {
            ElementKind::Enumerated(e) => e.is_enumerated(dir),
            ElementKind::Standard(_) => false,
        }
    }

    pub fn item_count(&self, _dir: Direction) -> Result<usize> {
        Ok(self.enumerated("enum")?.item_count())
    }

    pub fn item_name(&self, item: usize) -> Result<&str> {
        self.enumerated("enum")?.item_name(item)
    }

    pub fn get_item(&self, chn: usize) -> Result<usize> {
        self.enumerated("enum")?.get_item(&self.state, chn)
    }

    pub fn set_item(&mut self, chn: usize, item: usize) -> Result<()> {
        match &mut self.kind {
            ElementKind::Enumerated(e) if e.is_attached_any() => e.set_item(&self.state, chn, item),
            _ => Err(self.state.unsupported("enum")),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory raw control for element tests

    use super::*;
    use crate::domain::control::{Interface, ValueType};
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    static NEXT_NUMID: AtomicU32 = AtomicU32::new(1);

    pub struct FakeControl {
        id: ControlId,
        info: ControlInfo,
        values: Mutex<Vec<i64>>,
        pub writes: AtomicUsize,
        broken: AtomicBool,
    }

    impl FakeControl {
        pub fn new(
            name: &str,
            value_type: ValueType,
            min: i64,
            max: i64,
            values: Vec<i64>,
        ) -> Arc<Self> {
            Arc::new(Self {
                id: ControlId {
                    numid: NEXT_NUMID.fetch_add(1, Ordering::Relaxed),
                    name: name.to_string(),
                    index: 0,
                    interface: Interface::Mixer,
                },
                info: ControlInfo {
                    value_type,
                    count: values.len(),
                    min,
                    max,
                    items: Vec::new(),
                },
                values: Mutex::new(values),
                writes: AtomicUsize::new(0),
                broken: AtomicBool::new(false),
            })
        }

        pub fn volume(name: &str, min: i64, max: i64, values: Vec<i64>) -> Arc<Self> {
            Self::new(name, ValueType::Integer, min, max, values)
        }

        pub fn switch(name: &str, values: Vec<i64>) -> Arc<Self> {
            Self::new(name, ValueType::Boolean, 0, 1, values)
        }

        pub fn enumerated(name: &str, items: &[&str], values: Vec<i64>) -> Arc<Self> {
            let mut control = Self::new(
                name,
                ValueType::Enumerated,
                0,
                items.len() as i64 - 1,
                values,
            );
            if let Some(c) = Arc::get_mut(&mut control) {
                c.info.items = items.iter().map(|s| s.to_string()).collect();
            }
            control
        }

        /// Simulate a hardware-side change
        pub fn hw_set(&self, values: Vec<i64>) {
            *self.values.lock().unwrap() = values;
        }

        pub fn hw_values(&self) -> Vec<i64> {
            self.values.lock().unwrap().clone()
        }

        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::Relaxed)
        }

        /// Make info queries fail as if the device went away
        pub fn set_broken(&self, broken: bool) {
            self.broken.store(broken, Ordering::Relaxed);
        }
    }

    impl RawControl for FakeControl {
        fn id(&self) -> &ControlId {
            &self.id
        }

        fn info(&self) -> Result<ControlInfo> {
            if self.broken.load(Ordering::Relaxed) {
                return Err(MixerError::Transport(format!("{}: info failed", self.id)));
            }
            Ok(self.info.clone())
        }

        fn read_values(&self, _value_type: ValueType, count: usize) -> Result<Vec<i64>> {
            let values = self.values.lock().unwrap();
            Ok(values.iter().copied().take(count).collect())
        }

        fn write_values(&self, _value_type: ValueType, values: &[i64]) -> Result<()> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            *self.values.lock().unwrap() = values.to_vec();
            Ok(())
        }
    }
}
