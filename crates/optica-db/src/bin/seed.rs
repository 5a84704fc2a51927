//! # Seed Data Generator
//!
//! Populates a database with demo clients, examinations and sales.
//!
//! ## Usage
//! ```bash
//! cargo run -p optica-db --bin seed
//! cargo run -p optica-db --bin seed -- --count 200 --db ./data/optica.db
//! ```
//!
//! Every client is registered and examined; every third client also gets a
//! sale, alternating lab jobs and ready stock.

use chrono::Utc;
use std::env;

use optica_core::{EyeMeasurement, NewClient, NewPrescription, NewSale};
use optica_db::{Database, DbConfig};

const FIRST_NAMES: &[&str] = &[
    "Amani", "Baraka", "Chebet", "Dalila", "Esther", "Faraji", "Gathoni", "Hamisi", "Imani", "Jabari",
];

const LAST_NAMES: &[&str] = &["Wanjiru", "Otieno", "Mwangi", "Kiprop", "Achieng", "Mutua"];

const FRAMES: &[(&str, &str, i64)] = &[
    ("Ray-Ban", "RB5154 Clubmaster", 18500),
    ("Oakley", "OX8156 Holbrook", 16000),
    ("Silhouette", "Momentum 5529", 24000),
    ("Vogue", "VO5286", 9500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 50;
    let mut db_path = String::from("./optica_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--count" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of clients to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./optica_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Optica seed data generator");
    println!("Database: {}", db_path);
    println!("Clients:  {}", count);

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let today = Utc::now().date_naive();

    let existing = db.reports().summary().await?.total_clients;
    if existing > 0 {
        println!("Database already has {} clients, skipping.", existing);
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut sales = 0;

    for n in 0..count {
        let client = db
            .clients()
            .register(
                NewClient {
                    first_name: FIRST_NAMES[n % FIRST_NAMES.len()].to_string(),
                    last_name: LAST_NAMES[n % LAST_NAMES.len()].to_string(),
                    phone: format!("07{:08}", 10_000_000 + n),
                    ..Default::default()
                },
                today,
            )
            .await?
            .record;

        let power = -0.25 * (n % 12) as f64;
        db.prescriptions()
            .record(
                NewPrescription {
                    client_id: client.registration_number.clone(),
                    right: EyeMeasurement {
                        sphere: Some(power),
                        ..Default::default()
                    },
                    left: EyeMeasurement {
                        sphere: Some(power - 0.25),
                        ..Default::default()
                    },
                    pupillary_distance: Some(60.0 + (n % 8) as f64),
                    examined_by: "Dr. Seed".to_string(),
                    ..Default::default()
                },
                today,
            )
            .await?;

        if n % 3 == 0 {
            let (brand, model, price) = FRAMES[n % FRAMES.len()];
            db.sales()
                .create(
                    NewSale {
                        client_id: client.registration_number.clone(),
                        brand: brand.to_string(),
                        model: model.to_string(),
                        amount_cents: price,
                        quantity: 1,
                        advance_cents: price / 2,
                        requires_job: n % 2 == 0,
                        ..Default::default()
                    },
                    today,
                )
                .await?;
            sales += 1;
        }
    }

    println!(
        "Generated {} clients and {} sales in {:?}",
        count,
        sales,
        start.elapsed()
    );
    Ok(())
}
