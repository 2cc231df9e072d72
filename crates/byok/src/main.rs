// SPDX-FileCopyrightText: 2026 BYOK Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! byok - operator CLI for the BYOK credential vault.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use byok_config::ByokConfig;
use byok_core::{ByokError, Credential, CredentialFilter, MetadataValue, Provider};
use byok_crypto::{get_master_secret, get_new_master_secret, mask_secret};
use byok_vault::CredentialVault;
use clap::{Parser, Subcommand};
use tracing::info;

/// byok - multi-tenant credential vault.
#[derive(Parser, Debug)]
#[command(name = "byok", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the configuration.
    CheckConfig,
    /// Run one housekeeping pass: expiry and retention cleanup.
    Housekeeping,
    /// List a tenant's credentials. Secrets are never printed.
    List {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        provider: Option<Provider>,
        #[arg(long)]
        include_expired: bool,
    },
    /// Probe a credential against its provider and update its health.
    Validate { credential_id: String },
    /// Re-encrypt every credential under a new master secret.
    RotateMaster,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => byok_config::load_and_validate_path(path),
        None => byok_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            byok_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("byok: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ByokConfig) -> Result<(), ByokError> {
    match command {
        Commands::CheckConfig => {
            println!(
                "byok: config ok (database={}, kdf_iterations={})",
                config.storage.database_path, config.vault.kdf_iterations
            );
        }
        Commands::Housekeeping => {
            let vault = open_vault(&config).await?;
            let report = vault.run_housekeeping().await?;
            println!(
                "expired {} credentials, deleted {} usage records and {} audit entries",
                report.expired.len(),
                report.usage_deleted,
                report.audit_deleted
            );
        }
        Commands::List {
            tenant,
            provider,
            include_expired,
        } => {
            let vault = open_vault(&config).await?;
            let filter = CredentialFilter {
                provider,
                include_expired,
                ..Default::default()
            };
            let credentials = vault.list_credentials(&tenant, &filter).await?;
            if credentials.is_empty() {
                println!("no credentials for tenant {tenant}");
            }
            for credential in &credentials {
                println!("{}", describe(credential));
            }
        }
        Commands::Validate { credential_id } => {
            let vault = open_vault(&config).await?;
            let result = vault.validate_credential(&credential_id).await?;
            let stored = vault.get_credential(&credential_id).await?;
            println!(
                "{}: {:?} ({}); status={} health={}",
                credential_id, result.outcome, result.message, stored.status, stored.health_score
            );
        }
        Commands::RotateMaster => {
            let vault = open_vault(&config).await?;
            let new_master = get_new_master_secret()?;
            let report = vault.rotate_master_secret(new_master).await?;
            println!(
                "rotated {} credentials; update BYOK_MASTER_SECRET before the next start",
                report.rotated
            );
        }
    }
    Ok(())
}

async fn open_vault(config: &ByokConfig) -> Result<CredentialVault, ByokError> {
    let master = get_master_secret(&config.vault)?;
    let vault = CredentialVault::open(config, master).await?;
    info!("vault ready");
    Ok(vault)
}

/// One line per credential with text metadata masked.
fn describe(credential: &Credential) -> String {
    let metadata = credential
        .metadata
        .iter()
        .map(|(key, value)| match value {
            MetadataValue::Text(text) => format!("{key}={}", mask_secret(text)),
            MetadataValue::Number(n) => format!("{key}={n}"),
            MetadataValue::Flag(b) => format!("{key}={b}"),
        })
        .collect::<Vec<_>>()
        .join(",");
    let expires = credential
        .expires_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{id}  {provider}/{env}  {alias:<20} status={status} health={health} key={key} expires={expires} [{metadata}]",
        id = credential.id,
        provider = credential.provider,
        env = credential.environment,
        alias = credential.alias,
        status = credential.status,
        health = credential.health_score,
        key = mask_secret(&credential.key_hash),
    )
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("byok={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use byok_core::types::{CredentialStatus, EncryptedBundle};
    use byok_core::{Environment, Metadata};
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_parses_provider_and_flags() {
        let cli = Cli::try_parse_from([
            "byok",
            "list",
            "--tenant",
            "t1",
            "--provider",
            "elevenlabs",
            "--include-expired",
        ])
        .unwrap();
        match cli.command {
            Commands::List {
                tenant,
                provider,
                include_expired,
            } => {
                assert_eq!(tenant, "t1");
                assert_eq!(provider, Some(Provider::ElevenLabs));
                assert!(include_expired);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["byok", "list", "--tenant", "t1", "--provider", "acme"]).is_err());
    }

    #[test]
    fn describe_never_shows_raw_values() {
        let now = chrono::Utc::now();
        let metadata: Metadata = [
            ("organization".to_string(), MetadataValue::Text("org-secretive-123".into())),
            ("cost_per_request".to_string(), MetadataValue::Number(0.25)),
        ]
        .into_iter()
        .collect();
        let credential = Credential {
            id: "c1".into(),
            tenant_id: "t1".into(),
            provider: Provider::OpenAi,
            environment: Environment::Production,
            alias: "primary".into(),
            description: None,
            capabilities: Default::default(),
            metadata,
            bundle: EncryptedBundle {
                ciphertext: vec![9; 8],
                salt: vec![0; 16],
                nonce: vec![0; 12],
                auth_tag: vec![0; 16],
            },
            key_hash: "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".into(),
            status: CredentialStatus::Active,
            health_score: 87,
            validation_failures: 0,
            last_validated_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let line = describe(&credential);
        assert!(line.contains("openai/production"));
        assert!(line.contains("health=87"));
        assert!(line.contains("organization=org-...-123"));
        assert!(line.contains("cost_per_request=0.25"));
        assert!(line.contains("key=ba78...15ad"));
        assert!(!line.contains("org-secretive-123"));
    }
}
