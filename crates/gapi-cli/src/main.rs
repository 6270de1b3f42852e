//! gapi CLI
//!
//! Inspect the effective economy tunables and run scripted player journeys
//! against in-memory collaborators.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use gapi_core::clock::ManualClock;
use gapi_core::types::{GameResult, PackId, UserId};
use gapi_node::config::LoggingConfig;
use gapi_node::{EconomyNode, LocalPayments, NodeConfig, PackDraft};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gapi")]
#[command(version)]
#[command(about = "gapi - play-to-earn game economy engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "gapi.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective tunables as JSON
    Tunables,

    /// Run a scripted player journey and print the final state
    Simulate {
        /// Sessions to play
        #[arg(short, long, default_value = "6")]
        games: u32,

        /// Starting wallet balance
        #[arg(short, long, default_value = "100")]
        funds: f64,

        /// Seed for NFT draws, overrides `service.rng_seed`
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default configuration as TOML
    DefaultConfig,

    /// Version information
    Version,
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (text, json) = if logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json)
        .init();
}

/// One played session in the simulation report
#[derive(Serialize)]
struct GameLine {
    complexity: u8,
    result: GameResult,
    rewards: f64,
    electricity_cost: f64,
    energy_left: i32,
}

#[derive(Serialize)]
struct Report {
    user_id: UserId,
    games: Vec<GameLine>,
    crafted: Option<String>,
    claimed: f64,
    electricity_paid: f64,
    wallet: f64,
    status: gapi_node::PlayerStatus,
}

async fn simulate(
    mut config: NodeConfig,
    games: u32,
    funds: f64,
    seed: Option<u64>,
) -> anyhow::Result<Report> {
    if seed.is_some() {
        config.service.rng_seed = seed;
    }

    let payments = Arc::new(LocalPayments::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let node = EconomyNode::start_with_clock(config, payments.clone(), clock.clone()).await?;
    let service = node.service();

    let cheapest = service
        .list_packs()
        .await?
        .into_iter()
        .min_by(|a, b| a.price.total_cmp(&b.price));
    let pack = match cheapest {
        Some(pack) => pack.id,
        None => starter_pack(&node).await?,
    };

    let user = UserId::new();
    payments.fund(&user, funds);
    service.get_player_info(&user).await?;
    service
        .buy_nft_pack(&user, &pack)
        .await
        .context("buying the first pack")?;

    let mut lines = Vec::with_capacity(games as usize);
    let mut electricity_paid = 0.0;
    for round in 0..games {
        let info = service.get_player_info(&user).await?;
        if info.electricity_spent >= info.electricity_max_games {
            electricity_paid += service.pay_for_electricity(&user).await?.amount;
        }
        if info.energy_points <= 0 {
            let wait = info.next_energy_in_secs.unwrap_or_default();
            clock.advance(chrono::Duration::seconds(wait as i64));
            tracing::info!(waited_secs = wait, "waiting for energy");
        }

        let selected = service
            .list_nfts(&user)
            .await?
            .into_iter()
            .find(|n| Some(&n.id) == info.selected_nft_id.as_ref())
            .context("selected nft missing")?;
        let complexity = 1 + (round % u32::from(selected.max_level)) as u8;
        let result = if round % 3 == 2 { GameResult::Lose } else { GameResult::Win };

        service.start_game(&user, i32::from(complexity), false).await?;
        let finished = service
            .finish_game(&user, result.code(), 10 * i32::from(complexity))
            .await?;
        lines.push(GameLine {
            complexity,
            result,
            rewards: finished.rewards.rewards_amount,
            electricity_cost: finished.electricity_cost,
            energy_left: service.get_player_info(&user).await?.energy_points,
        });
    }

    // second pack, then try to merge the two
    let mut crafted = None;
    match service.buy_nft_pack(&user, &pack).await {
        Ok(_) => {
            let ids: Vec<_> = service
                .list_nfts(&user)
                .await?
                .into_iter()
                .map(|n| n.id)
                .take(2)
                .collect();
            match service.craft_nft(&user, &ids).await {
                Ok(nft) => crafted = Some(format!("{} ({})", nft.id, nft.nft_type)),
                Err(e) => tracing::warn!(error = %e, "craft skipped"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "second pack skipped"),
    }

    let mut claimed = 0.0;
    let claimable = service.rewards_balance(&user).await?.claimable;
    if claimable >= service.tunables().min_rewards_to_claim().await {
        claimed = service.claim_rewards(&user, claimable).await?.amount;
    }

    let remaining = service.get_player_info(&user).await?;
    if remaining.electricity_costs > 0.0 {
        match service.pay_for_electricity(&user).await {
            Ok(paid) => electricity_paid += paid.amount,
            Err(e) => tracing::warn!(error = %e, "electricity left unpaid"),
        }
    }

    Ok(Report {
        user_id: user,
        games: lines,
        crafted,
        claimed,
        electricity_paid,
        wallet: payments.balance_of(&user.to_string()),
        status: service.get_player_status(&user).await?,
    })
}

/// Free pack used when the config seeds none
async fn starter_pack(node: &EconomyNode) -> anyhow::Result<PackId> {
    let draft = PackDraft {
        name: "starter".to_string(),
        price: 0.0,
        drop_chances: gapi_core::types::DropChances {
            common: 70.0,
            rare: 20.0,
            super_rare: 7.0,
            epic: 2.5,
            legend: 0.5,
        },
    };
    Ok(node.admin().create_pack(draft).await?.id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(Some(cli.config.as_path()))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Tunables => {
            let node = EconomyNode::start(config, Arc::new(LocalPayments::new())).await?;
            let snapshot = node.service().tunables().snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }

        Commands::Simulate { games, funds, seed } => {
            let report = simulate(config, games, funds, seed).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::DefaultConfig => {
            println!("{}", NodeConfig::default().to_toml_string()?);
        }

        Commands::Version => {
            println!("gapi v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Economy:");
            println!("  - Energy with lazy regeneration");
            println!("  - Viewer-based session rewards");
            println!("  - Electricity tax per session");
            println!("  - NFT packs and crafting");
        }
    }

    Ok(())
}
