//! Provisions a verified demo journalist and prints an operator key with
//! the argon2 hash to configure as `admin.api_key_hash`.
//!
//! ```text
//! seed [journalist-name] [twitter-handle]
//! ```
//!
//! `NEWSROOM_SEED_ADMIN_KEY` fixes the operator key; otherwise one is drawn.

use anyhow::Context;
use auth_adapters::{hash_admin_key, RandomCredentialIssuer};
use configs::Settings;
use domains::error::DomainError;
use domains::models::NewJournalist;
use domains::ports::{CredentialIssuer, JournalistRepository};
use storage_adapters::{PgStore, PoolOptions};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let settings = Settings::load().context("failed to load configuration")?;
    let mut args = std::env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "Demo_Journalist".to_string());
    let handle = args.next().unwrap_or_else(|| "newsroom_demo".to_string());

    let options = PoolOptions {
        max_connections: 2,
        min_connections: 1,
        ..PoolOptions::default()
    };
    let store = PgStore::connect(settings.database_url()?, &options)
        .await
        .context("failed to connect to postgres")?;
    store.migrate().await.context("failed to run migrations")?;

    let issuer = RandomCredentialIssuer::new();
    let key = issuer.issue_api_key()?;
    let journalist = match store
        .insert(NewJournalist {
            id: Uuid::new_v4(),
            name: name.clone(),
            api_key_hash: key.hash,
            verification_code: issuer.issue_claim_code()?,
        })
        .await
    {
        Ok(j) => j,
        Err(DomainError::DuplicateName(_)) => {
            anyhow::bail!("journalist {name} already exists; pick another name")
        }
        Err(e) => return Err(e.into()),
    };
    let journalist = store.mark_verified(journalist.id, &handle).await?;

    let admin_key = match std::env::var("NEWSROOM_SEED_ADMIN_KEY") {
        Ok(k) if !k.is_empty() => k,
        _ => issuer.issue_api_key()?.raw,
    };
    let admin_hash =
        hash_admin_key(&admin_key).map_err(|e| anyhow::anyhow!("failed to hash admin key: {e}"))?;

    println!("journalist id:   {}", journalist.id);
    println!("journalist name: {}", journalist.name);
    println!("twitter handle:  @{handle}");
    println!("api key:         {}", key.raw);
    println!();
    println!("admin key:       {admin_key}");
    println!("NEWSROOM__ADMIN__API_KEY_HASH='{admin_hash}'");
    Ok(())
}
