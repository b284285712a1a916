//! Integration tests for the mixer over a virtual card
//!
//! These tests drive the whole path: card controls, session bootstrap,
//! control table dispatch, element operations and hardware notifications.

use smixer_core::domain::{
    ConfigManager, ControlKey, ControlTable, Direction, ElementClass, ElementDescriptor, Mixer,
    MixerError, MixerEvent, RawControl, SmixerConfig, ValueRange,
};
use smixer_infra::control::{CardSpec, ControlSpec, MixerSession, VirtualCard};
use std::sync::Arc;
use tempfile::TempDir;

fn master_table() -> ControlTable {
    ControlTable::new()
        .with(
            ControlKey::mixer("Master Playback Volume", 0),
            ElementDescriptor::new("Master", 0, 1, ElementClass::Standard),
        )
        .with(
            ControlKey::mixer("Master Playback Switch", 0),
            ElementDescriptor::new("Master", 0, 1, ElementClass::Standard),
        )
}

fn capture_source_table() -> ControlTable {
    ControlTable::new().with(
        ControlKey::mixer("Capture Source", 0),
        ElementDescriptor::new("Capture Source", 0, 110, ElementClass::EnumCapture),
    )
}

// ============================================================================
// STANDARD ELEMENTS
// ============================================================================

#[test]
fn test_master_volume_follows_hardware() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![0, 0]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    assert_eq!(master.channels(), 2);
    master.set_volume(Direction::Playback, 0, 50).unwrap();
    assert_eq!(master.get_volume(Direction::Playback, 0).unwrap(), 50);
    assert_eq!(volume.values(), vec![50, 0]);

    volume.hw_write(vec![80, 80]);
    session.dispatch_pending();

    let master = session.mixer().find("Master", 0).unwrap();
    assert_eq!(master.get_volume(Direction::Playback, 0).unwrap(), 80);
    assert_eq!(master.get_volume(Direction::Playback, 1).unwrap(), 80);
}

#[test]
fn test_unchanged_values_are_not_written() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![30, 30]))
        .unwrap();
    let switch = card
        .add_control(ControlSpec::boolean("Master Playback Switch", vec![1, 1]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    master.set_volume(Direction::Playback, 1, 30).unwrap();
    master.set_switch(Direction::Playback, 0, true).unwrap();
    assert_eq!(volume.write_count(), 0);
    assert_eq!(switch.write_count(), 0);

    master.set_switch_all(Direction::Playback, false).unwrap();
    assert_eq!(switch.write_count(), 1);
    assert_eq!(switch.values(), vec![0, 0]);
}

#[test]
fn test_normalized_range_scales_writes() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 31, vec![0, 0]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    master.set_range(Direction::Playback, 0, 100).unwrap();
    master.set_volume_all(Direction::Playback, 100).unwrap();
    assert_eq!(volume.values(), vec![31, 31]);

    master.set_volume(Direction::Playback, 0, 50).unwrap();
    assert_eq!(volume.values(), vec![16, 31]);
    assert_eq!(master.get_volume(Direction::Playback, 0).unwrap(), 52);
}

#[test]
fn test_extreme_volume_saturates_at_hardware_bounds() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![50, 50]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    master.set_range(Direction::Playback, -100, 0).unwrap();
    master.set_volume(Direction::Playback, 0, i64::MAX).unwrap();
    master.set_volume(Direction::Playback, 1, i64::MIN).unwrap();
    assert_eq!(volume.values(), vec![100, 0]);
    assert_eq!(master.get_volume(Direction::Playback, 0).unwrap(), 0);
    assert_eq!(master.get_volume(Direction::Playback, 1).unwrap(), -100);
}

#[test]
fn test_failed_write_keeps_cache() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![10, 10]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    volume.set_fail_writes(true);
    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    let result = master.set_volume(Direction::Playback, 0, 90);
    assert!(matches!(result, Err(MixerError::Transport(_))));
    assert_eq!(master.get_volume(Direction::Playback, 0).unwrap(), 10);
    assert_eq!(volume.values(), vec![10, 10]);
}

#[test]
fn test_channel_out_of_range() {
    let card = VirtualCard::new("test");
    card.add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![10, 10]))
        .unwrap();
    let mut session = MixerSession::open(Arc::new(card), Mixer::new(master_table())).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    assert!(matches!(
        master.set_volume(Direction::Playback, 2, 10),
        Err(MixerError::ChannelOutOfRange { channel: 2, .. })
    ));
    assert!(matches!(
        master.get_volume(Direction::Capture, 0),
        Err(MixerError::Unsupported { .. })
    ));
}

// ============================================================================
// ENUMERATED ELEMENTS
// ============================================================================

#[test]
fn test_capture_source_selection() {
    let card = VirtualCard::new("test");
    let source = card
        .add_control(ControlSpec::enumerated(
            "Capture Source",
            &["Mic", "Line", "CD"],
            vec![0, 0],
        ))
        .unwrap();
    let mut session =
        MixerSession::open(Arc::new(card), Mixer::new(capture_source_table())).unwrap();

    let element = session.mixer_mut().find_mut("Capture Source", 0).unwrap();
    assert!(element.is_enumerated(Some(Direction::Capture)));
    assert!(!element.is_enumerated(Some(Direction::Playback)));
    assert_eq!(element.item_count(Direction::Capture).unwrap(), 3);
    assert_eq!(element.item_name(1).unwrap(), "Line");

    element.set_item(1, 2).unwrap();
    assert_eq!(element.get_item(1).unwrap(), 2);
    assert_eq!(source.values(), vec![0, 2]);

    assert!(matches!(
        element.set_item(0, 3),
        Err(MixerError::ItemOutOfRange { item: 3, items: 3 })
    ));
    assert!(matches!(
        element.set_volume(Direction::Capture, 0, 1),
        Err(MixerError::Unsupported { .. })
    ));
}

#[test]
fn test_capture_source_hardware_change() {
    let card = VirtualCard::new("test");
    let source = card
        .add_control(ControlSpec::enumerated("Capture Source", &["Mic", "Line"], vec![0, 0]))
        .unwrap();
    let mut session =
        MixerSession::open(Arc::new(card), Mixer::new(capture_source_table())).unwrap();
    let events = session.mixer_mut().subscribe();

    source.hw_write(vec![1, 1]);
    assert_eq!(session.dispatch_pending(), 1);

    let element = session.mixer().find("Capture Source", 0).unwrap();
    assert_eq!(element.get_item(0).unwrap(), 1);
    assert!(matches!(events.try_recv(), Ok(MixerEvent::Value(_))));
}

// ============================================================================
// HOT-PLUG AND NOTIFICATIONS
// ============================================================================

#[test]
fn test_controls_merge_into_one_element() {
    let card = VirtualCard::new("test");
    let mut session =
        MixerSession::open(Arc::new(card.clone()), Mixer::new(master_table())).unwrap();
    let events = session.mixer_mut().subscribe();

    card.add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![5, 5]))
        .unwrap();
    card.add_control(ControlSpec::boolean("Master Playback Switch", vec![1, 1]))
        .unwrap();
    card.add_control(ControlSpec::boolean("Unmapped Switch", vec![0]))
        .unwrap();
    assert_eq!(session.dispatch_pending(), 3);

    assert_eq!(session.mixer().len(), 1);
    let master = session.mixer().find("Master", 0).unwrap();
    assert!(master.has_volume(Direction::Playback));
    assert!(master.has_switch(Direction::Playback));
    assert!(!master.has_volume(Direction::Capture));

    let received: Vec<MixerEvent> = events.try_iter().collect();
    let added = received
        .iter()
        .filter(|e| matches!(e, MixerEvent::Added(_)))
        .count();
    let info = received
        .iter()
        .filter(|e| matches!(e, MixerEvent::Info(_)))
        .count();
    assert_eq!(added, 1);
    assert_eq!(info, 2);
}

#[test]
fn test_removed_control_is_ignored() {
    let card = VirtualCard::new("test");
    let volume = card
        .add_control(ControlSpec::integer("Master Playback Volume", 0, 100, vec![5, 5]))
        .unwrap();
    let mut session =
        MixerSession::open(Arc::new(card.clone()), Mixer::new(master_table())).unwrap();

    assert!(card.remove_control(volume.id()));
    assert_eq!(session.dispatch_pending(), 1);
    assert_eq!(session.mixer().len(), 1);
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_demo_card_with_factory_default() {
    let config = SmixerConfig::factory_default();
    let card = VirtualCard::from_spec(&CardSpec::demo()).unwrap();
    let session = MixerSession::open(Arc::new(card), config.build_mixer().unwrap()).unwrap();

    let names: Vec<&str> = session
        .mixer()
        .sorted_elements()
        .into_iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(
        names,
        vec!["Master", "Headphone", "PCM", "Line", "Mic", "Capture", "Capture Source"]
    );

    let capture = session.mixer().find("Capture", 0).unwrap();
    assert!(capture.has_volume(Direction::Capture));
    assert!(capture.has_switch(Direction::Capture));
}

#[tokio::test]
async fn test_saved_config_drives_mixer() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path().join("config.toml"));

    let mut config = SmixerConfig::factory_default();
    config.app.range.playback = Some(ValueRange::new(0, 100));
    manager.save(&config).await.unwrap();

    let loaded = manager.load().await;
    assert_eq!(loaded, config);

    let card = VirtualCard::from_spec(&CardSpec::demo()).unwrap();
    let master_volume = card.control("Master Playback Volume", 0).unwrap();
    let mut session = MixerSession::open(Arc::new(card), loaded.build_mixer().unwrap()).unwrap();

    let master = session.mixer_mut().find_mut("Master", 0).unwrap();
    assert_eq!(master.get_range(Direction::Playback).max, 100);
    master.set_volume_all(Direction::Playback, 100).unwrap();
    assert_eq!(master_volume.values(), vec![31, 31]);
}
