//! Control session bootstrap and notification pump
//!
//! A [`MixerSession`] binds a control device to a [`Mixer`]: it subscribes
//! to the device's notifications, replays an add notification for every
//! control already present, and then feeds queued notifications to the
//! mixer one at a time.

use crossbeam::channel::{Receiver, TryRecvError};
use smixer_core::domain::control::{
    ControlDevice, ControlEvent, EventMask, MixerError, RawControl, Result,
};
use smixer_core::domain::mixer::Mixer;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct MixerSession {
    device: Arc<dyn ControlDevice>,
    mixer: Mixer,
    events: Receiver<ControlEvent>,
}

impl MixerSession {
    /// Open the control session and register the mixer.
    ///
    /// Any failure here is fatal for the caller: without a live session
    /// there is nothing to mix.
    #[instrument(skip_all, fields(device = device.name()))]
    pub fn open(device: Arc<dyn ControlDevice>, mut mixer: Mixer) -> Result<Self> {
        let events = device
            .subscribe()
            .map_err(|e| MixerError::SessionFailed(format!("subscribe: {}", e)))?;
        let controls = device
            .controls()
            .map_err(|e| MixerError::SessionFailed(format!("enumerate: {}", e)))?;

        info!(controls = controls.len(), "Control session opened");
        for control in controls {
            let event = ControlEvent {
                mask: EventMask::ADD,
                control,
            };
            if let Err(e) = mixer.handle_event(&event) {
                warn!(control = %event.control.id(), error = %e, "Failed to attach control");
            }
        }
        info!(elements = mixer.len(), "Mixer registered");

        Ok(Self {
            device,
            mixer,
            events,
        })
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    fn dispatch(&mut self, event: ControlEvent) {
        if let Err(e) = self.mixer.handle_event(&event) {
            warn!(
                control = %event.control.id(),
                mask = event.mask.bits(),
                error = %e,
                "Failed to handle control event"
            );
        }
    }

    /// Handle every queued notification without blocking.
    ///
    /// Returns the number of notifications processed.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.dispatch(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Control device disconnected");
                    break;
                }
            }
        }
        handled
    }

    /// Block and handle notifications until the device goes away
    pub fn run(&mut self) {
        while let Ok(event) = self.events.recv() {
            self.dispatch(event);
        }
        info!(device = self.device.name(), "Control session closed");
    }
}
