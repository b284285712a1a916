//! smixer CLI
//!
//! Opens a control session on a virtual card, registers the mixer built
//! from the config's control table, and inspects or changes elements.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use smixer_core::domain::{
    ConfigManager, Direction, ElementClass, MixerElement, SmixerConfig, ValueRange,
};
use smixer_infra::control::{CardSpec, MixerSession, VirtualCard};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smixer")]
#[command(about = "A simple mixer over raw sound card controls", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to $SMIXER_CONFIG, then ~/.config/smixer/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Virtual card description in TOML (defaults to the built-in demo card)
    #[arg(long, global = true)]
    card: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List elements ordered by weight
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one element
    Show {
        name: String,
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Set a volume in the element's normalized range
    SetVolume {
        name: String,
        direction: Direction,
        value: i64,
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Only this channel; all channels when omitted
        #[arg(long)]
        channel: Option<usize>,
    },
    /// Turn a switch on or off
    SetSwitch {
        name: String,
        direction: Direction,
        #[arg(value_parser = parse_switch)]
        state: bool,
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[arg(long)]
        channel: Option<usize>,
    },
    /// Select an enumerated item
    SetItem {
        name: String,
        item: usize,
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[arg(long, default_value_t = 0)]
        channel: usize,
    },
    /// Print the effective configuration as TOML
    DumpConfig,
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

#[derive(Serialize)]
struct DirectionView {
    range: ValueRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    switch: Option<Vec<bool>>,
}

#[derive(Serialize)]
struct ElementView {
    name: String,
    index: u32,
    weight: u32,
    class: ElementClass,
    channels: usize,
    capabilities: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    playback: Option<DirectionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capture: Option<DirectionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<Vec<usize>>,
}

impl ElementView {
    fn capture(element: &MixerElement) -> anyhow::Result<Self> {
        let channels = element.channels();
        let direction = |dir: Direction| -> anyhow::Result<Option<DirectionView>> {
            let has_volume = element.has_volume(dir);
            let has_switch = element.has_switch(dir);
            if !has_volume && !has_switch {
                return Ok(None);
            }
            let volume = if has_volume {
                Some(
                    (0..channels)
                        .map(|chn| element.get_volume(dir, chn))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            } else {
                None
            };
            let switch = if has_switch {
                Some(
                    (0..channels)
                        .map(|chn| element.get_switch(dir, chn))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            } else {
                None
            };
            Ok(Some(DirectionView {
                range: element.get_range(dir),
                volume,
                switch,
            }))
        };

        let (items, selected) = match enum_direction(element) {
            Some(dir) => {
                let items = (0..element.item_count(dir)?)
                    .map(|item| element.item_name(item).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?;
                let selected = (0..channels)
                    .map(|chn| element.get_item(chn))
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(items), Some(selected))
            }
            None => (None, None),
        };

        Ok(Self {
            name: element.name().to_string(),
            index: element.index(),
            weight: element.weight(),
            class: element.class(),
            channels,
            capabilities: element.capabilities().names(),
            playback: direction(Direction::Playback)?,
            capture: direction(Direction::Capture)?,
            items,
            selected,
        })
    }

    fn print(&self) {
        println!(
            "'{}',{} weight {} [{}]",
            self.name,
            self.index,
            self.weight,
            self.capabilities.join(" ")
        );
        for (dir, view) in [("Playback", &self.playback), ("Capture", &self.capture)] {
            let Some(view) = view else { continue };
            let mut line = format!("  {} {}..{}:", dir, view.range.min, view.range.max);
            for chn in 0..self.channels {
                if let Some(volume) = &view.volume {
                    line.push_str(&format!(" {}", volume[chn]));
                }
                if let Some(switch) = &view.switch {
                    line.push_str(if switch[chn] { " [on]" } else { " [off]" });
                }
            }
            println!("{}", line);
        }
        if let (Some(items), Some(selected)) = (&self.items, &self.selected) {
            let names: Vec<&str> = selected
                .iter()
                .map(|&i| items.get(i).map_or("?", String::as_str))
                .collect();
            println!("  Items: {}", items.join(", "));
            println!("  Item: {}", names.join(", "));
        }
    }
}

fn enum_direction(element: &MixerElement) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|&dir| element.is_enumerated(Some(dir)))
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<SmixerConfig> {
    match path {
        Some(path) => SmixerConfig::load_from_file(&path)
            .await
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ConfigManager::from_env()?.load().await),
    }
}

fn open_session(config: &SmixerConfig, card: Option<PathBuf>) -> anyhow::Result<MixerSession> {
    let spec = match card {
        Some(path) => CardSpec::from_file(&path)
            .with_context(|| format!("loading card {}", path.display()))?,
        None => CardSpec::demo(),
    };
    let card = VirtualCard::from_spec(&spec)?;
    let mixer = config.build_mixer()?;
    Ok(MixerSession::open(Arc::new(card), mixer)?)
}

fn element_mut<'a>(
    session: &'a mut MixerSession,
    name: &str,
    index: u32,
) -> anyhow::Result<&'a mut MixerElement> {
    session
        .mixer_mut()
        .find_mut(name, index)
        .ok_or_else(|| anyhow!("no element '{}',{}", name, index))
}

fn show(session: &MixerSession, name: &str, index: u32) -> anyhow::Result<()> {
    let element = session
        .mixer()
        .find(name, index)
        .ok_or_else(|| anyhow!("no element '{}',{}", name, index))?;
    ElementView::capture(element)?.print();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config).await?;
    let mut session = match cli.command {
        Command::DumpConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => open_session(&config, cli.card)?,
    };
    tracing::info!(
        device = session.device_name(),
        elements = session.mixer().len(),
        "Mixer ready"
    );

    match cli.command {
        Command::List { json } => {
            let views = session
                .mixer()
                .sorted_elements()
                .into_iter()
                .map(ElementView::capture)
                .collect::<anyhow::Result<Vec<_>>>()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                for view in &views {
                    view.print();
                }
            }
        }
        Command::Show { name, index } => show(&session, &name, index)?,
        Command::SetVolume {
            name,
            direction,
            value,
            index,
            channel,
        } => {
            let element = element_mut(&mut session, &name, index)?;
            match channel {
                Some(chn) => element.set_volume(direction, chn, value)?,
                None => element.set_volume_all(direction, value)?,
            }
            session.dispatch_pending();
            show(&session, &name, index)?;
        }
        Command::SetSwitch {
            name,
            direction,
            state,
            index,
            channel,
        } => {
            let element = element_mut(&mut session, &name, index)?;
            match channel {
                Some(chn) => element.set_switch(direction, chn, state)?,
                None => element.set_switch_all(direction, state)?,
            }
            session.dispatch_pending();
            show(&session, &name, index)?;
        }
        Command::SetItem {
            name,
            item,
            index,
            channel,
        } => {
            element_mut(&mut session, &name, index)?.set_item(channel, item)?;
            session.dispatch_pending();
            show(&session, &name, index)?;
        }
        Command::DumpConfig => {}
    }

    Ok(())
}
