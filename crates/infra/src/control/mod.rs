//! Control device implementations
//!
//! The virtual card models a sound card's control interface in memory:
//! typed value tuples, write echoes and add/remove notifications.

pub mod session;
pub mod virtual_card;

pub use session::MixerSession;
pub use virtual_card::{CardError, CardSpec, ControlSpec, VirtualCard, VirtualControl};
