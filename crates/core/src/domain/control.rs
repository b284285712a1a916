//! Hardware control abstractions and domain errors
//!
//! This module defines the interface the mixer needs from a sound device's
//! control transport: raw control handles with a value range and a value
//! tuple, and a device that enumerates them and delivers change
//! notifications. Implementations (the virtual card, real drivers) live in
//! the `infra` crate.

use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in the mixer subsystem
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixerError {
    /// Channel index is not below the element's channel count
    #[error("Channel {channel} out of range (element has {channels} channels)")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Enumerated item index is not below the item count
    #[error("Item {item} out of range (element has {items} items)")]
    ItemOutOfRange { item: usize, items: usize },

    /// The element has no sub-control for this operation
    #[error("Element {element} does not support {operation}")]
    Unsupported {
        element: String,
        operation: &'static str,
    },

    /// Normalized range with min above max
    #[error("Invalid range: min {min} > max {max}")]
    InvalidRange { min: i64, max: i64 },

    /// Hardware read or write failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Opening, attaching or registering the control session failed
    #[error("Session failed: {0}")]
    SessionFailed(String),
}

pub type Result<T> = std::result::Result<T, MixerError>;

/// Value plane of a mixer element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Playback,
    Capture,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Playback, Direction::Capture];

    /// Slot in direction-indexed arrays (playback = 0, capture = 1)
    pub fn index(self) -> usize {
        match self {
            Direction::Playback => 0,
            Direction::Capture => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Playback => write!(f, "playback"),
            Direction::Capture => write!(f, "capture"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "playback" | "p" => Ok(Direction::Playback),
            "capture" | "c" => Ok(Direction::Capture),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Control interface a raw control belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Card,
    Hwdep,
    Mixer,
    Pcm,
    Rawmidi,
    Timer,
    Sequencer,
}

impl Interface {
    /// Numeric interface tag as used by the control protocol
    pub fn tag(self) -> u32 {
        match self {
            Interface::Card => 0,
            Interface::Hwdep => 1,
            Interface::Mixer => 2,
            Interface::Pcm => 3,
            Interface::Rawmidi => 4,
            Interface::Timer => 5,
            Interface::Sequencer => 6,
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Type of the values a raw control carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Integer64,
    Enumerated,
}

/// Identity of one raw control on a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlId {
    /// Device-unique numeric id
    pub numid: u32,
    pub name: String,
    pub index: u32,
    pub interface: Interface,
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} '{}',{}", self.numid, self.name, self.index)
    }
}

/// Range, type and shape of a raw control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub value_type: ValueType,
    /// Number of values in the tuple (one per channel)
    pub count: usize,
    pub min: i64,
    pub max: i64,
    /// Item names, only populated for enumerated controls
    #[serde(default)]
    pub items: Vec<String>,
}

impl ControlInfo {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Event mask carried by a control notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const VALUE: EventMask = EventMask(1 << 0);
    pub const INFO: EventMask = EventMask(1 << 1);
    pub const ADD: EventMask = EventMask(1 << 2);
    pub const TLV: EventMask = EventMask(1 << 3);
    /// Removal is signalled with every bit set
    pub const REMOVE: EventMask = EventMask(!0);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_remove(self) -> bool {
        self == Self::REMOVE
    }

    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// One hardware control primitive
///
/// Handles are shared (`Arc`) between the device and the mixer elements
/// that attached them; identity is the [`ControlId`].
pub trait RawControl: Send + Sync {
    /// Identity of this control
    fn id(&self) -> &ControlId;

    /// Current range/type/count description
    fn info(&self) -> Result<ControlInfo>;

    /// Read the full value tuple
    fn read_values(&self, value_type: ValueType, count: usize) -> Result<Vec<i64>>;

    /// Write and commit the full value tuple
    fn write_values(&self, value_type: ValueType, values: &[i64]) -> Result<()>;
}

/// Notification delivered by a control device
#[derive(Clone)]
pub struct ControlEvent {
    pub mask: EventMask,
    pub control: Arc<dyn RawControl>,
}

impl fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlEvent")
            .field("mask", &self.mask)
            .field("control", self.control.id())
            .finish()
    }
}

/// A sound device's control interface
pub trait ControlDevice: Send + Sync {
    /// Device identifier this session is bound to
    fn name(&self) -> &str;

    /// Open the notification stream; events are delivered serially in order
    fn subscribe(&self) -> Result<Receiver<ControlEvent>>;

    /// Enumerate the controls currently present
    fn controls(&self) -> Result<Vec<Arc<dyn RawControl>>>;
}
