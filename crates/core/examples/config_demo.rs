//! Example walking through the control table configuration
//!
//! Run with: cargo run --package smixer-core --example config_demo

use smixer_core::domain::{ConfigManager, Direction, SmixerConfig, ValueRange};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("smixer_core=debug,info")
        .init();

    println!("=== smixer Configuration Demo ===\n");

    println!("1. Creating factory default configuration...");
    let mut config = SmixerConfig::factory_default();
    config.app.range.playback = Some(ValueRange::new(0, 100));
    println!("   Mapped {} raw controls", config.controls.len());

    let dir = tempfile::tempdir()?;
    let manager = ConfigManager::new(dir.path().join("config.toml"));

    println!("\n2. Saving to {}...", manager.config_path().display());
    manager.save(&config).await?;

    println!("\n3. Loading it back...");
    let loaded = manager.load().await;
    println!("   Round trip equal: {}", loaded == config);

    println!("\n4. Control table:");
    let mut entries: Vec<_> = loaded
        .controls
        .iter()
        .map(|m| (m.weight, m.control.as_str(), m.element.as_str(), m.class))
        .collect();
    entries.sort_by_key(|&(weight, control, _, _)| (weight, control));
    for (weight, control, element, class) in entries {
        println!("   {:>4}  {:<28} -> {} ({:?})", weight, control, element, class);
    }

    println!("\n5. Building the mixer...");
    let mixer = loaded.build_mixer()?;
    println!(
        "   Table has {} entries, elements appear as controls are discovered",
        mixer.table().len()
    );
    if let Some(range) = loaded.app.range.playback {
        println!("   {} volumes normalized to {}..{}", Direction::Playback, range.min, range.max);
    }

    Ok(())
}
