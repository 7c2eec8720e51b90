//! Derived Table Example
//!
//! Demonstrates:
//! - Creating tables in an in-memory store
//! - Deriving a table of addresses from a table of network devices
//! - Running the derivation as a lifecycle-managed job
//! - Deletions on the input propagating to the output
//!
//! Run with: cargo run --example derive_devices

use statemill::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
struct Device {
    name: String,
    address: Option<String>,
    up: bool,
}

#[derive(Debug, Clone)]
struct Address {
    device: String,
    address: String,
}

fn device(name: &str, address: Option<&str>, up: bool) -> Device {
    Device {
        name: name.to_string(),
        address: address.map(str::to_string),
        up,
    }
}

// Devices that are up and have an address get an entry; everything else
// drops its entry.
fn to_address(d: Device, deleted: bool) -> (Address, DeriveResult) {
    let effect = match (&d.address, d.up, deleted) {
        (Some(_), true, false) => DeriveResult::Insert,
        _ => DeriveResult::Delete,
    };
    let address = Address {
        device: d.name,
        address: d.address.unwrap_or_default(),
    };
    (address, effect)
}

async fn write(
    db: &MemDb,
    devices: &MemTable<Device, String>,
    upserts: Vec<Device>,
    deletes: &[&str],
) -> Result<()> {
    let mut txn = db.write_txn(&["devices"]).await?;
    for d in upserts {
        devices.insert(&mut txn, d)?;
    }
    for name in deletes {
        devices.delete(&mut txn, &device(name, None, false))?;
    }
    txn.commit()?;
    Ok(())
}

fn print_addresses(addresses: &MemTable<Address, String>) {
    for a in addresses.list() {
        println!("   {} -> {}", a.device, a.address);
    }
    if addresses.is_empty() {
        println!("   (none)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("statemill=debug,statemill_derive=debug,statemill_job=info")
        .init();

    println!("=== Derived Table Example ===\n");

    let db = Arc::new(MemDb::new(MemDbConfig::new().with_lock_timeout_ms(1000)));
    let devices = db
        .table("devices", PrimaryIndexer::new("name", |d: &Device| d.name.clone()))
        .create()?;
    let addresses = db
        .table("addresses", PrimaryIndexer::new("device", |a: &Address| a.device.clone()))
        .create()?;

    println!("1. Writing initial devices...");
    write(
        &db,
        &devices,
        vec![
            device("eth0", Some("10.0.0.1/24"), true),
            device("eth1", Some("10.0.1.1/24"), false),
            device("lo", Some("127.0.0.1/8"), true),
        ],
        &[],
    )
    .await?;

    println!("2. Starting derivation...");
    let jobs = JobRegistry::new(JobConfig::default());
    let mut lifecycle = Lifecycle::new();
    let config = DeriveConfig::from_json(r#"{ "commit_on_error": true }"#)?;
    let progress = derive("device-addresses", to_address)(
        DeriveParams {
            jobs: jobs.clone(),
            scope: "devices".into(),
            db: db.clone(),
            in_table: devices.clone(),
            out_table: addresses.clone(),
            config,
        },
        &mut lifecycle,
    )?;
    lifecycle.start().await?;

    progress.wait_for(devices.committed_revision()).await;
    println!("   Addresses:");
    print_addresses(&addresses);

    println!("\n3. Bringing eth1 up and removing lo...");
    write(&db, &devices, vec![device("eth1", Some("10.0.1.1/24"), true)], &["lo"]).await?;
    progress.wait_for(devices.committed_revision()).await;
    println!("   Addresses:");
    print_addresses(&addresses);

    println!("\n4. Job health:");
    for (id, report) in jobs.health().all() {
        println!("   {}: {:?} ({})", id, report.level, report.message);
    }

    println!("\n5. Shutting down...");
    tokio::time::timeout(Duration::from_secs(5), lifecycle.stop()).await??;
    println!("   Cursor stopped at revision {}", progress.current());

    println!("\n=== Example Complete ===");
    Ok(())
}
