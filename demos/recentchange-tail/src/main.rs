//! Recent changes tail
//!
//! Prints changes from the Wikimedia `recentchange` feed as they happen,
//! until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package recentchange-tail -- --wiki enwiki --type edit --bot false
//! cargo run --package recentchange-tail -- --since 2024-05-01T00:00:00Z --config ./wikistream.toml
//! ```
//!
//! Connection, reconnect and logging settings come from `wikistream.toml`
//! and `WIKISTREAM_*` variables; see `wikistream::runtime::config`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use wikistream::core::{DecodeError, RECENTCHANGE};
use wikistream::prelude::*;
use wikistream::runtime::config::validate_config;

#[derive(Debug, Parser)]
#[command(about = "Tail a wiki's recent changes feed")]
struct Args {
    /// Only show changes on this wiki (database name, e.g. `enwiki`).
    #[arg(long)]
    wiki: Option<String>,

    /// Only show this kind of change (`edit`, `new`, `log`, `categorize`, `external`).
    #[arg(long = "type")]
    change_type: Option<String>,

    /// Only show changes made (`true`) or not made (`false`) by bots.
    #[arg(long)]
    bot: Option<bool>,

    /// Replay changes from this point in time.
    #[arg(long)]
    since: Option<String>,

    /// Identifying User-Agent, overriding the configured one.
    #[arg(long)]
    user_agent: Option<String>,

    /// Configuration file to load instead of searching the default locations.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn filter(&self) -> Filter {
        let mut filter = Filter::any();
        if let Some(wiki) = &self.wiki {
            filter = filter.and("wiki", wiki.as_str());
        }
        if let Some(kind) = &self.change_type {
            filter = filter.and("type", kind.as_str());
        }
        if let Some(bot) = self.bot {
            filter = filter.and("bot", bot);
        }
        filter
    }
}

fn print_change(record: &EventRecord) -> Result<(), DecodeError> {
    let change: RecentChange = record.deserialize()?;

    let delta = change
        .size_delta()
        .map(|d| format!(" ({d:+})"))
        .unwrap_or_default();
    let bot = if change.bot { " [bot]" } else { "" };
    println!(
        "{:<12} {:<10} {}{} by {}{}",
        change.wiki,
        change.change_type.as_str(),
        change.title,
        delta,
        change.user,
        bot
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConfigLoader::new().file(path).load()?,
        None => load_config()?,
    };
    validate_config(&config)?;
    init_from_config(&config.logging);

    let mut options = StreamOptions::from_config(&config);
    if let Some(user_agent) = &args.user_agent {
        options = options.with_user_agent(user_agent.as_str());
    }
    if let Some(since) = &args.since {
        options = options.with_since_str(since)?;
    }

    let stream = EventStream::new(RECENTCHANGE, options)?;
    stream.add_listener(print_change, args.filter());
    info!(url = %stream.endpoint(), "Tailing recent changes, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    stream.close();

    Ok(())
}
