//! Basic record store example
//!
//! This example demonstrates:
//! - Opening a shared handle from a connection URL
//! - Inserting records while the table grows its own columns
//! - Upserting, updating and deleting by field
//! - Filtered, ordered and paginated reads
//!
//! Run with: cargo run --example basic_usage

use schemaless_sql::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== schemaless_sql - Basic Usage Example ===\n");

    let path = std::env::temp_dir().join("schemaless_sql_demo.db");
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite:///{}", path.display());

    println!("1. Connecting to {}...", url);
    let users = get_table(&url, "users").await?;
    println!("   ✓ Connected (table exists: {})\n", users.exists());

    println!("2. Inserting records...");
    let id = users
        .insert(&record! { "username" => "alice", "age" => 30 })
        .await?;
    println!("   ✓ alice got id {:?}", id);

    let written = users
        .insert_many(&[
            record! { "username" => "bob", "age" => 25, "email" => "bob@example.com" },
            record! { "username" => "charlie", "age" => 35, "balance" => 980.25 },
            record! { "username" => "diana", "age" => 28, "active" => false },
        ])
        .await?;
    println!("   ✓ {} more records", written);
    println!("   Columns now: {:?}\n", users.columns());

    println!("3. Upserting by username...");
    users
        .upsert(&record! { "username" => "bob", "age" => 26 }, &["username"])
        .await?;
    users
        .upsert(&record! { "username" => "eve", "age" => 41 }, &["username"])
        .await?;
    println!("   ✓ {} records\n", users.count(&Query::new()).await?);

    println!("4. Two oldest users:");
    for row in users.find(&Query::new().order_by("-age").limit(2)).await? {
        println!("   - {} ({})", row["username"].as_string(), row["age"].as_string());
    }

    println!("\n5. Updating and deleting...");
    let updated = users
        .update(&record! { "username" => "diana", "active" => true }, &["username"])
        .await?;
    let deleted = users.delete(&record! { "username" => "eve" }).await?;
    println!("   ✓ updated {}, deleted {}\n", updated, deleted);

    println!("6. Table definition:");
    if let Some(sql) = users.create_table_sql().await? {
        println!("   {}", sql);
    }

    close(&url);
    println!("\n=== Example completed successfully ===");
    Ok(())
}
