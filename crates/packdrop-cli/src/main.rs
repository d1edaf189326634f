// ============================================================================
// packdrop-admin - Admin tool for the PackDrop store
// ============================================================================
// Usage:
//   packdrop-admin seed [--file catalog.json]        Load the item catalog
//   packdrop-admin items                             List catalog items
//   packdrop-admin set-item ID [--drop-rate N] [--threshold N]
//   packdrop-admin users                             List users
//   packdrop-admin user ID                           Show one user's collection
//   packdrop-admin set-user ID [--scans N] [--count item=N ...]
//   packdrop-admin delete-voucher USER KEY           Remove a voucher
//   packdrop-admin stats                             Dashboard totals
//   packdrop-admin export --format json              Dump everything as JSON
//   packdrop-admin create-user NAME EMAIL            Sign up a user
//   packdrop-admin scan --user ID [--times N]        Record scans
//   packdrop-admin claim --user ID --item ID         Claim a reward
//   packdrop-admin simulate --user ID                Run a scripted scan session
// ============================================================================

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use packdrop_core::{
    Catalog, ItemStats, MarkerEvent, PackDropConfig, PackDropDb, Pose, ScanService, ScanSession,
    SessionEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// PackDrop admin tool
#[derive(Parser)]
#[command(name = "packdrop-admin", version, about = "Manage the PackDrop catalog, users and vouchers")]
struct Cli {
    /// Path to the database file (default: ~/.packdrop/packdrop.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the default catalog, or one from a JSON file
    Seed {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// List catalog items with their drop chance
    Items,

    /// Edit an item's drop rate and reward threshold
    SetItem {
        id: String,
        #[arg(long)]
        drop_rate: Option<u32>,
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// List users
    Users,

    /// Show a user's collection, claims and vouchers
    User { id: String },

    /// Overwrite a user's scan total or item counts
    SetUser {
        id: String,
        #[arg(long)]
        scans: Option<u64>,
        /// item=N, repeatable
        #[arg(long = "count")]
        counts: Vec<String>,
    },

    /// Delete one voucher by its key
    DeleteVoucher { user: String, key: String },

    /// Show dashboard totals (users, scans, vouchers)
    Stats,

    /// Export full database contents as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Create a user with an empty collection
    CreateUser { username: String, email: String },

    /// Record scans for a user through the scan service
    Scan {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "1")]
        times: u32,
    },

    /// Claim an unlocked reward
    Claim {
        #[arg(long)]
        user: String,
        #[arg(long)]
        item: String,
    },

    /// Drive a scan session with a steady marker and periodic taps
    Simulate {
        #[arg(long)]
        user: String,
        /// Length of the run in seconds
        #[arg(long, default_value = "10")]
        seconds: u64,
        /// Tap every N milliseconds
        #[arg(long, default_value = "500")]
        tap_every: u64,
    },
}

/// Parse `item=N`
fn parse_count(raw: &str) -> Result<(String, u32)> {
    let Some((item, count)) = raw.split_once('=') else {
        bail!("Expected item=N, got '{}'", raw);
    };
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("Count for '{}' is not a number: '{}'", item, count))?;
    Ok((item.trim().to_string(), count))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_optional(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(format_timestamp).unwrap_or_else(|| "never".into())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Logs go to stderr so export output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("packdrop_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PackDropConfig::from_env();
    let db_path = cli.db_path.or_else(|| config.db_path.clone());
    let db = Arc::new(PackDropDb::open(db_path.as_deref())?);

    match cli.command {
        Commands::Seed { file } => cmd_seed(&db, file),
        Commands::Items => cmd_items(&db),
        Commands::SetItem { id, drop_rate, threshold } => cmd_set_item(&db, &id, drop_rate, threshold),
        Commands::Users => cmd_users(&db),
        Commands::User { id } => cmd_user(&db, &id),
        Commands::SetUser { id, scans, counts } => cmd_set_user(&db, &id, scans, &counts),
        Commands::DeleteVoucher { user, key } => cmd_delete_voucher(&db, &user, &key),
        Commands::Stats => cmd_stats(&db),
        Commands::Export { format } => cmd_export(&db, &format),
        Commands::CreateUser { username, email } => cmd_create_user(db, &config, &username, &email).await,
        Commands::Scan { user, times } => cmd_scan(db, &config, &user, times).await,
        Commands::Claim { user, item } => cmd_claim(db, &config, &user, &item).await,
        Commands::Simulate { user, seconds, tap_every } => {
            cmd_simulate(db, config, &user, seconds, tap_every).await
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

fn cmd_seed(db: &PackDropDb, file: Option<PathBuf>) -> Result<()> {
    let catalog = match file {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            Catalog::from_json(&json)?
        }
        None => Catalog::default_catalog(),
    };

    let written = db.seed_catalog(&catalog)?;
    println!("Seeded {} items into {}", written, db.path().display());
    Ok(())
}

fn cmd_items(db: &PackDropDb) -> Result<()> {
    let items = db.list_items()?;
    if items.is_empty() {
        println!("No items found. Run `packdrop-admin seed` first.");
        return Ok(());
    }

    let total: u64 = items.iter().map(|i| i.drop_rate as u64).sum();

    println!(
        "{:<14}  {:<14}  {:<10}  {:>5}  {:>7}  {:>9}  {}",
        "ITEM ID", "NAME", "RARITY", "RATE", "CHANCE", "THRESHOLD", "REWARD"
    );
    println!("{}", "-".repeat(90));

    for item in &items {
        let chance = if total == 0 {
            0.0
        } else {
            item.drop_rate as f64 / total as f64 * 100.0
        };
        println!(
            "{:<14}  {:<14}  {:<10}  {:>5}  {:>6.1}%  {:>9}  {}",
            item.id,
            item.name,
            item.rarity.display_name(),
            item.drop_rate,
            chance,
            item.reward_threshold,
            item.reward_description
        );
    }

    println!("\nTotal: {} items, weight {}", items.len(), total);
    Ok(())
}

fn cmd_set_item(db: &PackDropDb, id: &str, drop_rate: Option<u32>, threshold: Option<u32>) -> Result<()> {
    if drop_rate.is_none() && threshold.is_none() {
        bail!("Nothing to change: pass --drop-rate and/or --threshold");
    }
    let Some(item) = db.get_item(id)? else {
        bail!("Item not found: {}", id);
    };

    let stats = ItemStats {
        drop_rate: drop_rate.unwrap_or(item.drop_rate),
        reward_threshold: threshold.unwrap_or(item.reward_threshold),
    };
    db.set_item_stats(id, stats)?;

    println!(
        "{}: drop rate {} -> {}, threshold {} -> {}",
        id, item.drop_rate, stats.drop_rate, item.reward_threshold, stats.reward_threshold
    );
    Ok(())
}

// ============================================================================
// Users
// ============================================================================

fn cmd_users(db: &PackDropDb) -> Result<()> {
    let users = db.list_users()?;
    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!(
        "{:<32}  {:<16}  {:<24}  {:>6}  {}",
        "USER ID", "USERNAME", "EMAIL", "SCANS", "LAST SCAN"
    );
    println!("{}", "-".repeat(110));

    for user in &users {
        println!(
            "{:<32}  {:<16}  {:<24}  {:>6}  {}",
            user.user_id,
            user.username,
            user.email,
            user.total_scans,
            format_optional(user.last_scan_at.as_ref())
        );
    }

    println!("\nTotal: {} users", users.len());
    Ok(())
}

fn cmd_user(db: &PackDropDb, id: &str) -> Result<()> {
    let Some(snapshot) = db.user_snapshot(id)? else {
        bail!("User not found: {}", id);
    };
    let catalog = db.load_catalog()?;
    let profile = &snapshot.profile;

    println!("=== {} ({}) ===", profile.username, profile.user_id);
    println!("Email:      {}", profile.email);
    println!("Joined:     {}", format_timestamp(&profile.created_at));
    println!("Scans:      {}", profile.total_scans);
    println!("Last scan:  {}", format_optional(profile.last_scan_at.as_ref()));

    println!("\nCollection:");
    for (item_id, count) in &snapshot.collected_items {
        let threshold = catalog
            .get(item_id)
            .map(|i| i.reward_threshold.to_string())
            .unwrap_or_else(|| "?".into());
        let claimed = snapshot
            .claimed_rewards
            .get(&packdrop_core::reward_key(item_id))
            .copied()
            .unwrap_or(false);
        println!(
            "  {:<14} {:>4}/{:<4} {}",
            item_id,
            count,
            threshold,
            if claimed { "claimed" } else { "" }
        );
    }

    println!("\nVouchers:");
    if snapshot.vouchers.is_empty() {
        println!("  (none)");
    }
    for entry in &snapshot.vouchers {
        println!(
            "  {}  {:<16}  {}  key {}",
            entry.voucher.code,
            entry.voucher.description,
            entry.voucher.issue_date(),
            entry.key
        );
    }

    Ok(())
}

fn cmd_set_user(db: &PackDropDb, id: &str, scans: Option<u64>, counts: &[String]) -> Result<()> {
    if scans.is_none() && counts.is_empty() {
        bail!("Nothing to change: pass --scans and/or --count item=N");
    }
    let counts = counts.iter().map(|c| parse_count(c)).collect::<Result<Vec<_>>>()?;

    if let Some(total) = scans {
        db.set_total_scans(id, total)?;
        println!("{}: total scans = {}", id, total);
    }
    for (item, count) in counts {
        db.set_item_count(id, &item, count)?;
        println!("{}: {} = {}", id, item, count);
    }
    Ok(())
}

fn cmd_delete_voucher(db: &PackDropDb, user: &str, key: &str) -> Result<()> {
    if db.delete_voucher(user, key)? {
        println!("Deleted voucher {} for {}", key, user);
    } else {
        println!("No voucher {} for {}", key, user);
    }
    Ok(())
}

fn cmd_stats(db: &PackDropDb) -> Result<()> {
    let stats = db.stats()?;

    println!("=== PackDrop Database Stats ===");
    println!("Database: {}", db.path().display());
    println!();
    println!("Items:    {}", stats.total_items);
    println!("Users:    {}", stats.total_users);
    println!("Scans:    {}", stats.total_scans);
    println!("Vouchers: {}", stats.total_vouchers);

    Ok(())
}

fn cmd_export(db: &PackDropDb, format: &str) -> Result<()> {
    if format != "json" {
        bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let items = db.list_items()?;
    let stats = db.stats()?;
    let mut users = Vec::new();
    for profile in db.list_users()? {
        if let Some(snapshot) = db.user_snapshot(&profile.user_id)? {
            users.push(snapshot);
        }
    }

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": stats,
        "items": items,
        "users": users,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

// ============================================================================
// Scan path
// ============================================================================

/// Scan service over the store, with the stored catalog
fn open_service(db: Arc<PackDropDb>, config: &PackDropConfig) -> Result<ScanService> {
    let catalog = db.load_catalog()?;
    if catalog.is_empty() {
        bail!("Catalog is empty. Run `packdrop-admin seed` first.");
    }
    Ok(ScanService::from_config(db, catalog, config))
}

async fn signed_in(db: Arc<PackDropDb>, config: &PackDropConfig, user: &str) -> Result<ScanService> {
    let service = open_service(db, config)?;
    service.sign_in(user).await?;
    Ok(service)
}

async fn cmd_create_user(db: Arc<PackDropDb>, config: &PackDropConfig, username: &str, email: &str) -> Result<()> {
    let service = open_service(db, config)?;
    let user_id = service.sign_up(username, email).await?;
    println!("Created user {} ({})", username, user_id);
    Ok(())
}

async fn cmd_scan(db: Arc<PackDropDb>, config: &PackDropConfig, user: &str, times: u32) -> Result<()> {
    let service = signed_in(db, config, user).await?;

    for _ in 0..times {
        let result = service.record_scan().await?;
        let message = match service.item(&result.item_id).await {
            Some(item) => result.congrats_message(&item),
            None => format!("You got {}!", result.item_name),
        };
        println!("{}", message);
        if let Some(voucher) = &result.voucher {
            println!("Voucher: {} ({})", voucher.code, voucher.description);
        }
        println!("{}", "-".repeat(40));
    }
    Ok(())
}

async fn cmd_claim(db: Arc<PackDropDb>, config: &PackDropConfig, user: &str, item: &str) -> Result<()> {
    let service = signed_in(db, config, user).await?;
    let entry = service.claim_reward(item).await?;
    println!(
        "Claimed {}: {} ({}), issued {}",
        item,
        entry.voucher.code,
        entry.voucher.description,
        entry.voucher.issue_date()
    );
    Ok(())
}

async fn cmd_simulate(
    db: Arc<PackDropDb>,
    config: PackDropConfig,
    user: &str,
    seconds: u64,
    tap_every: u64,
) -> Result<()> {
    const FRAME_MS: u64 = 100;

    let service = Arc::new(signed_in(db, &config, user).await?);
    let marker = config.marker_name.clone();
    let mut session = ScanSession::new(service, config, Duration::ZERO);
    let tap_every = (tap_every / FRAME_MS).max(1) * FRAME_MS;

    info!("Simulating {}s of scanning for {}", seconds, user);

    let mut now_ms = 0;
    while now_ms <= seconds * 1000 {
        let now = Duration::from_millis(now_ms);
        let event = MarkerEvent::tracking(&marker, Pose::default());

        let mut events = session.on_marker(&event, now);
        // The store is local, so results are ready by the next frame
        session.settle().await;
        events.extend(session.tick(now));
        if now_ms > 0 && now_ms % tap_every == 0 {
            events.extend(session.tap(now));
        }

        for event in &events {
            print_event(now, event);
        }
        now_ms += FRAME_MS;
    }

    // Let running animations and waits finish before leaving the screen
    let mut end = Duration::from_millis(now_ms);
    while let Some(deadline) = session.next_deadline() {
        end = end.max(deadline);
        for event in &session.tick(end) {
            print_event(end, event);
        }
    }

    session.reset(end);
    Ok(())
}

fn print_event(now: Duration, event: &SessionEvent) {
    let t = now.as_secs_f32();
    match event {
        SessionEvent::PackSpawned { pack, marker, .. } => println!("[{:5.1}s] pack {} spawned on {}", t, pack, marker),
        SessionEvent::PackMoved { .. } => {}
        SessionEvent::ResultReady { pack, result } => {
            println!("[{:5.1}s] pack {} holds {} (count {})", t, pack, result.item_id, result.new_count)
        }
        SessionEvent::NetworkLag { pack } => println!("[{:5.1}s] pack {} network lag", t, pack),
        SessionEvent::CollectibleSpawned { pack, message, .. } => {
            println!("[{:5.1}s] pack {} opened", t, pack);
            for line in message.lines() {
                println!("          {}", line);
            }
        }
        SessionEvent::CollectStarted { pack } => println!("[{:5.1}s] pack {} collected", t, pack),
        SessionEvent::PackDestroyed { pack } => println!("[{:5.1}s] pack {} destroyed", t, pack),
        SessionEvent::Prompt(prompt) => println!("[{:5.1}s] {}", t, prompt.message().replace('\n', " ")),
        SessionEvent::ConnectionError { pack, message } => println!("[{:5.1}s] pack {}: {}", t, pack, message),
    }
}
