//! # Seed Data Generator
//!
//! Populates an embedded snapshot with demo assets and a little movement
//! history, for development and screenshots.
//!
//! ## Usage
//! ```bash
//! # Seed ./data/inventrack.db (default)
//! cargo run -p inventrack-db --bin seed
//!
//! # Specify snapshot path
//! cargo run -p inventrack-db --bin seed -- --db ./tmp/demo.db
//! ```
//!
//! Movements go through the ledger, so stock levels and history agree.

use std::env;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inventrack_core::{AssetFilter, NewAsset, DEFAULT_ADMIN_USERNAME};
use inventrack_db::{Actor, Database, DbConfig, LedgerService};

/// (name, category, location, quantity, condition)
const ASSETS: &[(&str, &str, &str, i64, &str)] = &[
    ("Laptop Lenovo ThinkPad", "Elektronik", "Gudang A", 12, "Baru"),
    ("Proyektor Epson", "Elektronik", "Ruang Rapat", 4, "Baik"),
    ("Kabel HDMI 2m", "Aksesoris", "Gudang A", 40, "Baru"),
    ("Kursi Kantor", "Furnitur", "Gudang B", 25, "Baik"),
    ("Meja Lipat", "Furnitur", "Gudang B", 3, "Rusak Ringan"),
    ("Printer HP LaserJet", "Elektronik", "Ruang TU", 2, "Baik"),
    ("Spidol Whiteboard", "ATK", "Lemari ATK", 120, "Baru"),
    ("Kertas A4 (rim)", "ATK", "Lemari ATK", 60, "Baru"),
];

/// (asset index, type, quantity, note)
const MOVEMENTS: &[(usize, &str, i64, &str)] = &[
    (0, "check-out", 3, "Dipinjam tim lapangan"),
    (2, "check-out", 10, "Ruang kelas"),
    (6, "check-out", 24, ""),
    (0, "check-in", 1, "Dikembalikan"),
    (7, "check-in", 20, "Pengadaan bulanan"),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("info,sqlx=warn"))
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./data/inventrack.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if let Some(path) = args.get(i + 1) {
                    db_path = path.clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("InvenTrack Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Snapshot file path (default: ./data/inventrack.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding snapshot");

    let db = Database::connect(DbConfig::embedded(&db_path).flush_interval(None))
        .await
        .context("failed to open snapshot")?;

    let existing = db.assets().list(&AssetFilter::default()).await?;
    if !existing.is_empty() {
        warn!(count = existing.len(), "Snapshot already has assets, skipping seed");
        db.shutdown().await?;
        return Ok(());
    }

    let admin = db
        .users()
        .get_by_username(DEFAULT_ADMIN_USERNAME)
        .await?
        .context("default admin missing after startup")?;
    let actor = Actor::from(&admin);

    let mut ids = Vec::with_capacity(ASSETS.len());
    for (index, (name, category, location, quantity, condition)) in ASSETS.iter().enumerate() {
        let asset = db
            .assets()
            .create(NewAsset {
                name: name.to_string(),
                category: category.to_string(),
                // Generated SKUs only have millisecond resolution.
                sku: Some(format!("DEMO-{:03}", index + 1)),
                quantity: *quantity,
                condition: Some(condition.to_string()),
                location: location.to_string(),
            })
            .await
            .with_context(|| format!("failed to create {name}"))?;
        ids.push(asset.id);
    }
    info!(count = ids.len(), "Assets created");

    let ledger = LedgerService::new(db.clone());
    for (index, kind, quantity, note) in MOVEMENTS {
        let note = (!note.is_empty()).then(|| note.to_string());
        ledger
            .record_movement(&ids[*index], kind, *quantity, &actor, note)
            .await
            .with_context(|| format!("failed to record {kind} of {quantity}"))?;
    }
    info!(count = MOVEMENTS.len(), "Movements recorded");

    db.shutdown().await?;
    info!("Seed complete");
    Ok(())
}
