//! smixer infrastructure: control devices and the session pump
//!
//! Provides an in-process virtual sound card implementing the control
//! device contract, and the session that binds a device to a mixer.

pub mod control;
