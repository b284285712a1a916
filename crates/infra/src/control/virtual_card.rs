//! In-memory control device
//!
//! `VirtualCard` behaves like a sound card's control interface: it owns a
//! set of raw controls, hands out shared handles to them and queues change
//! notifications for subscribers. Hardware-side activity (controls
//! appearing, disappearing, or changing value on their own) is simulated
//! through explicit calls.

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use smixer_core::domain::control::{
    ControlDevice, ControlEvent, ControlId, ControlInfo, EventMask, Interface, MixerError,
    RawControl, Result, ValueType,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Errors building a virtual card from a description
#[derive(Debug, Error)]
pub enum CardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid control '{name}': {reason}")]
    InvalidControl { name: String, reason: String },
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Description of one raw control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub name: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default = "default_interface")]
    pub interface: Interface,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
    /// Initial tuple; its length is the control's count
    pub values: Vec<i64>,
    #[serde(default)]
    pub items: Vec<String>,
}

fn default_interface() -> Interface {
    Interface::Mixer
}

impl ControlSpec {
    pub fn integer(name: &str, min: i64, max: i64, values: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            index: 0,
            interface: Interface::Mixer,
            value_type: ValueType::Integer,
            min,
            max,
            values,
            items: Vec::new(),
        }
    }

    pub fn boolean(name: &str, values: Vec<i64>) -> Self {
        Self {
            value_type: ValueType::Boolean,
            ..Self::integer(name, 0, 1, values)
        }
    }

    pub fn enumerated(name: &str, items: &[&str], values: Vec<i64>) -> Self {
        Self {
            value_type: ValueType::Enumerated,
            items: items.iter().map(|s| s.to_string()).collect(),
            ..Self::integer(name, 0, items.len().saturating_sub(1) as i64, values)
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    fn validate(&self) -> std::result::Result<(), CardError> {
        let invalid = |reason: &str| CardError::InvalidControl {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.values.is_empty() {
            return Err(invalid("no values"));
        }
        if self.min > self.max {
            return Err(invalid("min above max"));
        }
        if self.value_type == ValueType::Enumerated && self.items.is_empty() {
            return Err(invalid("enumerated control without items"));
        }
        Ok(())
    }
}

/// Description of a whole card, loadable from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSpec {
    pub name: String,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

impl CardSpec {
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, CardError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, CardError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// A small codec-like card
    pub fn demo() -> Self {
        Self {
            name: "Virtual AC97".to_string(),
            controls: vec![
                ControlSpec::integer("Master Playback Volume", 0, 31, vec![24, 24]),
                ControlSpec::boolean("Master Playback Switch", vec![1, 1]),
                ControlSpec::integer("Headphone Playback Volume", 0, 31, vec![20, 20]),
                ControlSpec::boolean("Headphone Playback Switch", vec![1, 1]),
                ControlSpec::integer("PCM Playback Volume", 0, 31, vec![23, 23]),
                ControlSpec::boolean("PCM Playback Switch", vec![1, 1]),
                ControlSpec::integer("Line Playback Volume", 0, 31, vec![0, 0]),
                ControlSpec::boolean("Line Playback Switch", vec![0, 0]),
                ControlSpec::integer("Mic Playback Volume", 0, 31, vec![0]),
                ControlSpec::boolean("Mic Playback Switch", vec![0]),
                ControlSpec::integer("Capture Volume", 0, 15, vec![8, 8]),
                ControlSpec::boolean("Capture Switch", vec![1, 1]),
                ControlSpec::enumerated(
                    "Capture Source",
                    &["Mic", "CD", "Video", "Aux", "Line", "Mix", "Mix Mono", "Phone"],
                    vec![0, 0],
                ),
                ControlSpec::boolean("Mic Boost (+20dB)", vec![0]),
            ],
        }
    }
}

struct CardInner {
    name: String,
    controls: Mutex<Vec<Arc<VirtualControl>>>,
    subscribers: Mutex<Vec<Sender<ControlEvent>>>,
    next_numid: AtomicU32,
}

impl CardInner {
    fn notify(&self, mask: EventMask, control: Arc<dyn RawControl>) {
        trace!(control = %control.id(), mask = mask.bits(), "Queueing control event");
        let event = ControlEvent { mask, control };
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// One raw control living on a [`VirtualCard`]
pub struct VirtualControl {
    id: ControlId,
    info: ControlInfo,
    values: Mutex<Vec<i64>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    card: Weak<CardInner>,
    me: Weak<VirtualControl>,
}

impl VirtualControl {
    /// Current hardware tuple
    pub fn values(&self) -> Vec<i64> {
        lock(&self.values).clone()
    }

    /// Number of writes received through the control handle
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail as if the device went away
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hardware-side change (another client, a volume knob); queues a value event
    pub fn hw_write(&self, values: Vec<i64>) {
        *lock(&self.values) = values;
        self.notify_value();
    }

    fn notify_value(&self) {
        if let (Some(card), Some(me)) = (self.card.upgrade(), self.me.upgrade()) {
            card.notify(EventMask::VALUE, me);
        }
    }

    /// Inclusive bounds a written value must fall in
    fn bounds(&self) -> (i64, i64) {
        match self.info.value_type {
            ValueType::Enumerated => (0, self.info.item_count() as i64 - 1),
            _ => (self.info.min, self.info.max),
        }
    }

    fn check_type(&self, value_type: ValueType) -> Result<()> {
        if value_type == self.info.value_type {
            Ok(())
        } else {
            Err(MixerError::Transport(format!(
                "{}: type {:?} does not match {:?}",
                self.id, value_type, self.info.value_type
            )))
        }
    }
}

impl RawControl for VirtualControl {
    fn id(&self) -> &ControlId {
        &self.id
    }

    fn info(&self) -> Result<ControlInfo> {
        Ok(self.info.clone())
    }

    fn read_values(&self, value_type: ValueType, count: usize) -> Result<Vec<i64>> {
        self.check_type(value_type)?;
        let values = lock(&self.values);
        if count != values.len() {
            return Err(MixerError::Transport(format!(
                "{}: read of {} values, control has {}",
                self.id,
                count,
                values.len()
            )));
        }
        Ok(values.clone())
    }

    fn write_values(&self, value_type: ValueType, values: &[i64]) -> Result<()> {
        self.check_type(value_type)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MixerError::Transport(format!("{}: write failed", self.id)));
        }
        {
            let mut current = lock(&self.values);
            if values.len() != current.len() {
                return Err(MixerError::Transport(format!(
                    "{}: write of {} values, control has {}",
                    self.id,
                    values.len(),
                    current.len()
                )));
            }
            let (min, max) = self.bounds();
            if let Some(bad) = values.iter().find(|v| !(min..=max).contains(*v)) {
                return Err(MixerError::Transport(format!(
                    "{}: value {} outside {}..={}",
                    self.id, bad, min, max
                )));
            }
            current.copy_from_slice(values);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        // The device echoes committed writes back as value events
        self.notify_value();
        Ok(())
    }
}

/// In-memory control device
#[derive(Clone)]
pub struct VirtualCard {
    inner: Arc<CardInner>,
}

impl VirtualCard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(CardInner {
                name: name.into(),
                controls: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                next_numid: AtomicU32::new(1),
            }),
        }
    }

    /// Build a card with every control from `spec`
    pub fn from_spec(spec: &CardSpec) -> std::result::Result<Self, CardError> {
        let card = Self::new(spec.name.clone());
        for control in &spec.controls {
            card.add_control(control.clone())?;
        }
        info!(card = %spec.name, controls = spec.controls.len(), "Virtual card created");
        Ok(card)
    }

    /// Add a control; subscribers see an add event
    pub fn add_control(
        &self,
        spec: ControlSpec,
    ) -> std::result::Result<Arc<VirtualControl>, CardError> {
        spec.validate()?;
        let numid = self.inner.next_numid.fetch_add(1, Ordering::SeqCst);
        let id = ControlId {
            numid,
            name: spec.name,
            index: spec.index,
            interface: spec.interface,
        };
        let info = ControlInfo {
            value_type: spec.value_type,
            count: spec.values.len(),
            min: spec.min,
            max: spec.max,
            items: spec.items,
        };
        let card = Arc::downgrade(&self.inner);
        let control = Arc::new_cyclic(|me| VirtualControl {
            id,
            info,
            values: Mutex::new(spec.values),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            card,
            me: me.clone(),
        });

        debug!(control = %control.id, "Control added");
        lock(&self.inner.controls).push(control.clone());
        self.inner.notify(EventMask::ADD, control.clone());
        Ok(control)
    }

    /// Remove a control; subscribers see a remove event
    pub fn remove_control(&self, id: &ControlId) -> bool {
        let removed = {
            let mut controls = lock(&self.inner.controls);
            let pos = controls.iter().position(|c| &c.id == id);
            pos.map(|pos| controls.remove(pos))
        };
        match removed {
            Some(control) => {
                debug!(control = %control.id, "Control removed");
                self.inner.notify(EventMask::REMOVE, control);
                true
            }
            None => false,
        }
    }

    pub fn control(&self, name: &str, index: u32) -> Option<Arc<VirtualControl>> {
        lock(&self.inner.controls)
            .iter()
            .find(|c| c.id.name == name && c.id.index == index)
            .cloned()
    }

    /// Total writes across all controls
    pub fn write_count(&self) -> usize {
        lock(&self.inner.controls)
            .iter()
            .map(|c| c.write_count())
            .sum()
    }
}

impl ControlDevice for VirtualCard {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn subscribe(&self) -> Result<Receiver<ControlEvent>> {
        let (tx, rx) = unbounded();
        lock(&self.inner.subscribers).push(tx);
        Ok(rx)
    }

    fn controls(&self) -> Result<Vec<Arc<dyn RawControl>>> {
        Ok(lock(&self.inner.controls)
            .iter()
            .map(|c| c.clone() as Arc<dyn RawControl>)
            .collect())
    }
}
