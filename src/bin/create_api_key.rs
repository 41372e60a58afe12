//! CLI tool to mint an API key and store its hash in DynamoDB
//!
//! Usage:
//!   cargo run --bin create_api_key -- --user-id dev-user --name "Development Key" --service-id agent-1
//!
//! The plaintext key is printed exactly once; only its SHA-256 digest is
//! persisted, so a lost key cannot be recovered.

use agent_key_gateway::db::models::{ApiKeyRecord, KeyStatus, DEFAULT_RATE_LIMIT};
use agent_key_gateway::services::{KeyValidator, KEY_PREFIX};
use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use rand::RngCore;
use uuid::Uuid;

/// Create a new API key in DynamoDB
#[derive(Parser, Debug)]
#[command(name = "create_api_key")]
#[command(about = "Mint a new API key and store its hash in DynamoDB")]
struct Args {
    /// User ID that owns the key
    #[arg(short, long)]
    user_id: String,

    /// Human-readable name for the key
    #[arg(short, long)]
    name: String,

    /// Service instance the key authorizes
    #[arg(short, long)]
    service_id: String,

    /// Organization the key belongs to (optional)
    #[arg(long)]
    organization_id: Option<String>,

    /// Rate limit (requests per minute)
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT)]
    rate_limit: u32,

    /// Days until the key expires (omit for a non-expiring key)
    #[arg(long)]
    expires_in_days: Option<i64>,

    /// DynamoDB table name
    #[arg(long, default_value = "agent-gateway-api-keys")]
    table_name: String,

    /// DynamoDB endpoint URL (for local development)
    #[arg(long)]
    endpoint_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let plaintext = generate_key();
    let now = Utc::now();

    let record = ApiKeyRecord {
        id: format!("key_{}", Uuid::new_v4().simple()),
        key_hash: KeyValidator::hash_key(&plaintext),
        service_id: args.service_id.clone(),
        status: KeyStatus::Active,
        created_by: args.user_id.clone(),
        organization_id: args.organization_id.clone(),
        name: args.name.clone(),
        rate_limit: args.rate_limit,
        expires_at: args.expires_in_days.map(|days| now + Duration::days(days)),
        total_calls: 0,
        last_used: None,
        created_at: now,
    };

    // Configure AWS SDK
    let mut config_builder = aws_config::from_env();

    // Check for endpoint URL from args or environment
    let endpoint_url = args
        .endpoint_url
        .or_else(|| std::env::var("DYNAMODB_ENDPOINT_URL").ok());

    if let Some(ref url) = endpoint_url {
        config_builder = config_builder.endpoint_url(url);
    }

    let aws_config = config_builder.load().await;
    let client = aws_sdk_dynamodb::Client::new(&aws_config);

    client
        .put_item()
        .table_name(&args.table_name)
        .set_item(Some(record.to_dynamodb()))
        .send()
        .await?;

    println!("\n✅ API Key created successfully!\n");
    println!("API Key: {}", plaintext);
    println!("Key ID: {}", record.id);
    println!("Service ID: {}", record.service_id);
    println!("User ID: {}", record.created_by);
    println!("Name: {}", record.name);
    println!("Rate Limit: {} requests/minute", record.rate_limit);
    if let Some(expires_at) = record.expires_at {
        println!("Expires At: {}", expires_at.to_rfc3339());
    }
    println!("\n⚠️  Store this key now. Only its hash is saved; it cannot be shown again.");
    println!("\nUse this key with:");
    println!("  curl -H \"Authorization: Bearer {}\" ...", plaintext);

    Ok(())
}

/// Generate a fresh key: `ak_` followed by 64 hex chars (32 random bytes)
fn generate_key() -> String {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    format!("{}{}", KEY_PREFIX, hex::encode(secret))
}
