//! Volume + switch element
//!
//! Collects up to one volume and one switch control per direction. The
//! direction and purpose of a raw control are taken from its name suffix.

use super::{AttachedControl, Capabilities, ElementState};
use crate::domain::control::{ControlId, Direction, RawControl, Result};
use crate::domain::range;
use std::sync::Arc;
use tracing::{debug, warn};

/// Purpose of a raw control attached to a standard element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Volume,
    Switch,
}

const SUFFIXES: [(&str, Purpose, Direction); 4] = [
    ("Playback Volume", Purpose::Volume, Direction::Playback),
    ("Capture Volume", Purpose::Volume, Direction::Capture),
    ("Playback Switch", Purpose::Switch, Direction::Playback),
    ("Capture Switch", Purpose::Switch, Direction::Capture),
];

fn classify(name: &str) -> Option<(Purpose, Direction)> {
    SUFFIXES
        .iter()
        .find(|(suffix, _, _)| name.ends_with(suffix))
        .map(|(_, purpose, dir)| (*purpose, *dir))
}

#[derive(Debug, Default)]
pub struct StandardElement {
    volume: [Option<AttachedControl>; 2],
    switch: [Option<AttachedControl>; 2],
}

impl StandardElement {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach_volume(
        &mut self,
        state: &mut ElementState,
        attached: AttachedControl,
        dir: Direction,
    ) -> Result<()> {
        let hw = attached.hw_range();
        state.set_range(dir, hw.min, hw.max)?;
        self.volume[dir.index()] = Some(attached);
        Ok(())
    }

    fn attach_switch(&mut self, attached: AttachedControl, dir: Direction) {
        self.switch[dir.index()] = Some(attached);
    }

    /// Channel count is the widest tuple among the attached controls
    fn decide_channels(&self) -> usize {
        self.volume
            .iter()
            .chain(self.switch.iter())
            .flatten()
            .map(AttachedControl::count)
            .max()
            .unwrap_or(0)
    }

    pub fn attach(
        &mut self,
        state: &mut ElementState,
        control: Arc<dyn RawControl>,
    ) -> Result<Option<Capabilities>> {
        let Some((purpose, dir)) = classify(&control.id().name) else {
            warn!(
                element = %state.id,
                control = %control.id(),
                "Control name has no volume/switch suffix, not attaching"
            );
            return Ok(None);
        };

        let attached = AttachedControl::attach(control)?;
        debug!(
            element = %state.id,
            control = %attached.id(),
            ?purpose,
            %dir,
            count = attached.count(),
            "Attaching control"
        );

        let filled = match purpose {
            Purpose::Volume => {
                self.attach_volume(state, attached, dir)?;
                Capabilities::volume(dir)
            }
            Purpose::Switch => {
                self.attach_switch(attached, dir);
                Capabilities::switch(dir)
            }
        };
        state.caps.insert(filled);
        state.channels = self.decide_channels();
        Ok(Some(filled))
    }

    pub fn update(&mut self, control: &ControlId) -> Result<bool> {
        let slot = self
            .volume
            .iter_mut()
            .chain(self.switch.iter_mut())
            .flatten()
            .find(|attached| attached.is(control));

        match slot {
            Some(attached) => {
                attached.refresh()?;
                debug!(control = %control, values = ?attached.values(), "Refreshed cached values");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_attached(&self, control: &ControlId) -> bool {
        self.volume
            .iter()
            .chain(self.switch.iter())
            .flatten()
            .any(|attached| attached.is(control))
    }

    fn volume_slot(&self, state: &ElementState, dir: Direction) -> Result<&AttachedControl> {
        self.volume[dir.index()]
            .as_ref()
            .ok_or_else(|| state.unsupported("volume"))
    }

    fn switch_slot(&self, state: &ElementState, dir: Direction) -> Result<&AttachedControl> {
        self.switch[dir.index()]
            .as_ref()
            .ok_or_else(|| state.unsupported("switch"))
    }

    pub fn get_volume(&self, state: &ElementState, dir: Direction, chn: usize) -> Result<i64> {
        state.check_channel(chn)?;
        let volume = self.volume_slot(state, dir)?;
        Ok(range::to_user(volume.hw_range(), state.range(dir), volume.value(chn)?))
    }

    pub fn set_volume(
        &mut self,
        state: &ElementState,
        dir: Direction,
        chn: usize,
        value: i64,
    ) -> Result<()> {
        state.check_channel(chn)?;
        let volume = self.volume[dir.index()]
            .as_mut()
            .ok_or_else(|| state.unsupported("volume"))?;
        let raw = range::from_user(volume.hw_range(), state.range(dir), value);
        if volume.replace(chn, raw)? {
            debug!(element = %state.id, %dir, channel = chn, value, raw, "Volume written");
        }
        Ok(())
    }

    pub fn set_volume_all(
        &mut self,
        state: &ElementState,
        dir: Direction,
        value: i64,
    ) -> Result<()> {
        let volume = self.volume[dir.index()]
            .as_mut()
            .ok_or_else(|| state.unsupported("volume"))?;
        let raw = range::from_user(volume.hw_range(), state.range(dir), value);
        if volume.replace_all(raw)? {
            debug!(element = %state.id, %dir, value, raw, "Volume written on all channels");
        }
        Ok(())
    }

    pub fn get_switch(&self, state: &ElementState, dir: Direction, chn: usize) -> Result<bool> {
        state.check_channel(chn)?;
        Ok(self.switch_slot(state, dir)?.value(chn)? != 0)
    }

    pub fn set_switch(
        &mut self,
        state: &ElementState,
        dir: Direction,
        chn: usize,
        on: bool,
    ) -> Result<()> {
        state.check_channel(chn)?;
        let switch = self.switch[dir.index()]
            .as_mut()
            .ok_or_else(|| state.unsupported("switch"))?;
        // Any non-zero raw value counts as on
        if (switch.value(chn)? != 0) == on {
            return Ok(());
        }
        if switch.replace(chn, i64::from(on))? {
            debug!(element = %state.id, %dir, channel = chn, on, "Switch written");
        }
        Ok(())
    }

    pub fn set_switch_all(&mut self, state: &ElementState, dir: Direction, on: bool) -> Result<()> {
        let switch = self.switch[dir.index()]
            .as_mut()
            .ok_or_else(|| state.unsupported("switch"))?;
        if switch.values().iter().all(|v| (*v != 0) == on) {
            return Ok(());
        }
        if switch.replace_all(i64::from(on))? {
            debug!(element = %state.id, %dir, on, "Switch written on all channels");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeControl;
    use super::super::{ElementClass, ElementId, MixerElement};
    use super::*;
    use crate::domain::control::MixerError;
    use crate::domain::range::ValueRange;

    fn master() -> MixerElement {
        MixerElement::new(ElementId::new("Master", 0), 1, ElementClass::Standard)
    }

    #[test]
    fn test_classify_suffix() {
        assert_eq!(
            classify("Master Playback Volume"),
            Some((Purpose::Volume, Direction::Playback))
        );
        assert_eq!(
            classify("Mic Capture Switch"),
            Some((Purpose::Switch, Direction::Capture))
        );
        assert_eq!(classify("Mic Boost"), None);
    }

    #[test]
    fn test_attach_seeds_range_from_hardware() {
        let mut element = master();
        element
            .attach(FakeControl::volume("Master Playback Volume", 0, 100, vec![30, 40]))
            .unwrap();

        assert_eq!(element.get_range(Direction::Playback), ValueRange::new(0, 100));
        assert_eq!(element.channels(), 2);
        assert!(element.capabilities().contains(Capabilities::PLAYBACK_VOLUME));
        assert_eq!(element.get_volume(Direction::Playback, 1).unwrap(), 40);
    }

    #[test]
    fn test_channels_follow_widest_control() {
        let mut element = master();
        element
            .attach(FakeControl::volume("Master Playback Volume", 0, 31, vec![0, 0]))
            .unwrap();
        element
            .attach(FakeControl::switch("Master Capture Switch", vec![1, 1, 1, 1]))
            .unwrap();

        assert_eq!(element.channels(), 4);
        let caps = element.capabilities();
        assert!(caps.contains(Capabilities::PLAYBACK_VOLUME | Capabilities::CAPTURE_SWITCH));
        assert!(!caps.intersects(Capabilities::CAPTURE_VOLUME | Capabilities::PLAYBACK_SWITCH));
    }

    #[test]
    fn test_unknown_suffix_is_not_attached() {
        let mut element = master();
        let filled = element
            .attach(FakeControl::volume("Master Boost", 0, 3, vec![0]))
            .unwrap();
        assert!(filled.is_none());
        assert!(element.capabilities().is_empty());
    }

    #[test]
    fn test_set_volume_maps_through_user_range() {
        let control = FakeControl::volume("PCM Playback Volume", 0, 31, vec![0, 0]);
        let mut element = master();
        element.attach(control.clone()).unwrap();
        element.set_range(Direction::Playback, 0, 100).unwrap();

        element.set_volume(Direction::Playback, 0, 50).unwrap();
        assert_eq!(control.hw_values(), vec![16, 0]);
        assert_eq!(element.get_volume(Direction::Playback, 0).unwrap(), 52);
        assert_eq!(control.write_count(), 1);
    }

    #[test]
    fn test_set_volume_saturates_outside_user_range() {
        let control = FakeControl::volume("Master Playback Volume", 0, 100, vec![50, 50]);
        let mut element = master();
        element.attach(control.clone()).unwrap();

        element.set_range(Direction::Playback, -100, 0).unwrap();
        element.set_volume(Direction::Playback, 0, i64::MAX).unwrap();
        element.set_volume(Direction::Playback, 1, i64::MIN).unwrap();
        assert_eq!(control.hw_values(), vec![100, 0]);

        element.set_range(Direction::Playback, 0, 1).unwrap();
        element.set_volume_all(Direction::Playback, i64::MAX / 2).unwrap();
        assert_eq!(control.hw_values(), vec![100, 100]);
        assert_eq!(element.get_volume(Direction::Playback, 0).unwrap(), 1);
    }

    #[test]
    fn test_set_volume_unchanged_skips_write() {
        let control = FakeControl::volume("Master Playback Volume", 0, 100, vec![50, 50]);
        let mut element = master();
        element.attach(control.clone()).unwrap();

        element.set_volume(Direction::Playback, 0, 50).unwrap();
        element.set_volume_all(Direction::Playback, 50).unwrap();
        assert_eq!(control.write_count(), 0);

        element.set_volume_all(Direction::Playback, 70).unwrap();
        assert_eq!(control.hw_values(), vec![70, 70]);
        assert_eq!(control.write_count(), 1);
    }

    #[test]
    fn test_set_switch_unchanged_skips_write() {
        let control = FakeControl::switch("Master Playback Switch", vec![1, 0]);
        let mut element = master();
        element.attach(control.clone()).unwrap();

        // already on / already off
        element.set_switch(Direction::Playback, 0, true).unwrap();
        element.set_switch(Direction::Playback, 1, false).unwrap();
        assert_eq!(control.write_count(), 0);

        element.set_switch(Direction::Playback, 1, true).unwrap();
        assert_eq!(control.hw_values(), vec![1, 1]);
        assert!(element.get_switch(Direction::Playback, 1).unwrap());
        assert_eq!(control.write_count(), 1);

        element.set_switch_all(Direction::Playback, true).unwrap();
        assert_eq!(control.write_count(), 1);
    }

    #[test]
    fn test_out_of_range_channel() {
        let mut element = master();
        element
            .attach(FakeControl::volume("Master Playback Volume", 0, 100, vec![1, 2]))
            .unwrap();
        element
            .attach(FakeControl::switch("Master Playback Switch", vec![1, 1]))
            .unwrap();

        let expected = MixerError::ChannelOutOfRange {
            channel: 2,
            channels: 2,
        };
        assert_eq!(element.get_volume(Direction::Playback, 2).unwrap_err(), expected);
        assert_eq!(element.get_switch(Direction::Playback, 2).unwrap_err(), expected);
        assert_eq!(
            element.set_volume(Direction::Playback, 2, 10).unwrap_err(),
            expected
        );
    }

    #[test]
    fn test_update_refreshes_only_matching_control() {
        let volume = FakeControl::volume("Master Playback Volume", 0, 100, vec![10, 10]);
        let switch = FakeControl::switch("Master Playback Switch", vec![1, 1]);
        let stranger = FakeControl::volume("PCM Playback Volume", 0, 100, vec![0]);
        let mut element = master();
        element.attach(volume.clone()).unwrap();
        element.attach(switch.clone()).unwrap();

        volume.hw_set(vec![80, 80]);
        switch.hw_set(vec![0, 0]);
        assert!(element.update(volume.id()).unwrap());

        assert_eq!(element.get_volume(Direction::Playback, 0).unwrap(), 80);
        // switch was not re-read
        assert!(element.get_switch(Direction::Playback, 0).unwrap());

        assert!(!element.update(stranger.id()).unwrap());
    }
}
