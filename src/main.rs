use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use vault_bootstrap::bootstrap::{BootstrapOptions, Bootstrapper};
use vault_bootstrap::config::Settings;
use vault_bootstrap::secrets::AwsSecretsManager;
use vault_bootstrap::vault::{VaultClient, VaultClientOptions};
use vault_bootstrap::{Args, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;
    logging::init_tracing(&settings.log_level)?;
    info!("Starting up...");
    log_settings(&settings);

    let options = match BootstrapOptions::from_settings(&settings) {
        Ok(options) => options,
        Err(err) => {
            error!("Startup failed: {err}");
            std::process::exit(1);
        }
    };
    let vault = VaultClient::with_options(
        &settings.vault.addr,
        &VaultClientOptions {
            ca_cert: settings.vault.ca_cert.as_deref(),
            skip_verify: settings.vault.skip_verify,
            timeout: Some(settings.vault.timeout),
        },
    )
    .context("Create vault API client")?;
    let store = AwsSecretsManager::from_env(settings.aws.region.as_deref()).await;
    let bootstrapper = Bootstrapper::new(vault, store, options);

    if let Err(err) = bootstrapper.verify_secret_access().await {
        error!("Secret access check failed: {err}");
        std::process::exit(1);
    }

    if args.oneshot {
        match bootstrapper.check_status().await {
            Ok(report) => info!("Check completed: {report:?}"),
            Err(err) => {
                error!("Checking vault failed: {err}");
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = wait_for_shutdown().await {
            error!("Shutdown signal handler error: {err}");
        }
        let _ = shutdown_tx.send(true);
    });

    if let Err(err) = bootstrapper.run(shutdown_rx).await {
        error!("Bootstrap loop stopped: {err}");
        std::process::exit(1);
    }
    Ok(())
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::new(args.config.clone()).context("Load settings")?;
    settings.merge_with_args(args);
    settings.validate()?;
    Ok(settings)
}

fn log_settings(settings: &Settings) {
    info!("Secret ID: {}", settings.secret_id);
    info!("Vault address: {}", settings.vault.addr);
    info!("Hostname: {}", settings.hostname);
    info!("Check interval: {:?}", settings.check_interval);
    info!(
        "Key shares: {}, threshold: {}",
        settings.init.secret_shares, settings.init.secret_threshold
    );
    if settings.vault.skip_verify {
        info!("TLS verification towards Vault is disabled.");
    }
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to install SIGTERM handler: {e}"))?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| anyhow::anyhow!("Failed to listen for Ctrl+C: {e}"))?;
            }
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to listen for Ctrl+C: {e}"))?;
    }

    Ok(())
}
