//! smixer core: logical mixer elements over raw hardware audio controls
//!
//! Raw controls (volume faders, mute switches, enumerated selectors) are
//! grouped into logical elements with a uniform get/set surface and a
//! normalized value range, and kept in sync with hardware notifications.

pub mod domain;
