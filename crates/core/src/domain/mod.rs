//! Domain entities and business rules

pub mod config;
pub mod control;
pub mod element;
pub mod mixer;
pub mod range;

// Re-export specific items to avoid ambiguous glob imports
pub use config::{ConfigError, ConfigManager, ControlMapping, SmixerConfig};
pub use control::{
    ControlDevice, ControlEvent, ControlId, ControlInfo, Direction, EventMask, Interface,
    MixerError, RawControl, Result, ValueType,
};
pub use element::{Capabilities, ElementClass, ElementId, MixerElement};
pub use mixer::{ControlKey, ControlTable, ElementDescriptor, Mixer, MixerEvent};
pub use range::ValueRange;
