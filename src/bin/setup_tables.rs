//! CLI tool to create the gateway's DynamoDB tables
//!
//! Usage:
//!   cargo run --bin setup_tables
//!
//! For local development with DynamoDB Local:
//!   DYNAMODB_ENDPOINT_URL=http://localhost:8001 cargo run --bin setup_tables

use anyhow::Result;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
};
use clap::Parser;

/// Create DynamoDB tables for the agent key gateway
#[derive(Parser, Debug)]
#[command(name = "setup_tables")]
#[command(about = "Create DynamoDB tables for the agent key gateway")]
struct Args {
    /// DynamoDB endpoint URL (for local development)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Table name prefix
    #[arg(long, default_value = "agent-gateway")]
    prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Configure AWS SDK
    let mut config_builder = aws_config::from_env();

    // Check for endpoint URL from args or environment
    let endpoint_url = args
        .endpoint_url
        .or_else(|| std::env::var("DYNAMODB_ENDPOINT_URL").ok());

    if let Some(ref url) = endpoint_url {
        config_builder = config_builder.endpoint_url(url);
        println!("Using DynamoDB endpoint: {}", url);
    }

    let aws_config = config_builder.load().await;
    let client = aws_sdk_dynamodb::Client::new(&aws_config);

    println!("\n🚀 Setting up DynamoDB tables...\n");

    // api-keys: simple partition key on the record id
    let api_keys = format!("{}-api-keys", args.prefix);
    report(&api_keys, create_table(&client, &api_keys, "id").await);

    // usage-logs: partition key per API key, sort key on timestamp
    let usage_logs = format!("{}-usage-logs", args.prefix);
    report(
        &usage_logs,
        create_table_with_sort_key(&client, &usage_logs, "key_id", "timestamp").await,
    );

    // usage-summary: one aggregate row per service
    let usage_summary = format!("{}-usage-summary", args.prefix);
    report(
        &usage_summary,
        create_table(&client, &usage_summary, "service_id").await,
    );

    println!("\n✅ Table setup complete!\n");

    Ok(())
}

fn report(table_name: &str, result: Result<bool>) {
    match result {
        Ok(true) => println!("✅ Created table: {}", table_name),
        Ok(false) => println!("⏭️  Table already exists: {}", table_name),
        Err(e) => println!("❌ Failed to create table {}: {}", table_name, e),
    }
}

async fn table_exists(client: &aws_sdk_dynamodb::Client, table_name: &str) -> Result<bool> {
    let tables = client.list_tables().send().await?;
    Ok(tables.table_names().contains(&table_name.to_string()))
}

async fn create_table(
    client: &aws_sdk_dynamodb::Client,
    table_name: &str,
    pk_name: &str,
) -> Result<bool> {
    if table_exists(client, table_name).await? {
        return Ok(false);
    }

    client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(pk_name)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(pk_name)
                .key_type(KeyType::Hash)
                .build()?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await?;

    Ok(true)
}

async fn create_table_with_sort_key(
    client: &aws_sdk_dynamodb::Client,
    table_name: &str,
    pk_name: &str,
    sk_name: &str,
) -> Result<bool> {
    if table_exists(client, table_name).await? {
        return Ok(false);
    }

    client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(pk_name)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(sk_name)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(pk_name)
                .key_type(KeyType::Hash)
                .build()?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(sk_name)
                .key_type(KeyType::Range)
                .build()?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await?;

    Ok(true)
}
