//! `epp-probe`: connectivity check for a registry EPP endpoint.
//!
//! Connects with the given registry config, prints the greeting and the
//! negotiated extensions, optionally checks some domain names, then logs out.
//!
//! ```text
//! epp-probe <config.toml> [domain ...]
//! EPP_PROBE_CONFIG=nominet.toml epp-probe example.co.uk
//! ```
//!
//! Set `RUST_LOG=registrar_orchestrator_epp::trace=debug` (with `debug = true`
//! in the config) to see the redacted XML of every exchange.

use std::process::ExitCode;

use anyhow::Context;
use registrar_orchestrator_epp::{RegistryConfig, create_client, supported_registries};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_ENV: &str = "EPP_PROBE_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the probe report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (config_path, domains): (String, Vec<String>) = match std::env::var(CONFIG_ENV) {
        Ok(path) => (path, args.collect()),
        Err(_) => {
            let Some(path) = args.next() else {
                print_usage();
                anyhow::bail!("no config given (pass a path or set {CONFIG_ENV})");
            };
            (path, args.collect())
        }
    };

    let config = RegistryConfig::from_file(&config_path)
        .with_context(|| format!("loading {config_path}"))?;
    tracing::info!(
        "Probing {} at {}:{}",
        config.registry,
        config.hostname,
        config.port
    );

    let client = create_client(&config)?;
    let mut session = client.connect(&config).await?;

    if let Some(greeting) = session.greeting() {
        println!("server:     {}", greeting.server_id);
        if let Some(date) = greeting.server_date {
            println!("date:       {}", date.to_rfc3339());
        }
        println!("objects:    {}", greeting.object_uris.join(", "));
    }
    println!("extensions: {}", session.negotiated_extensions().join(", "));

    let outcome = if domains.is_empty() {
        Ok(())
    } else {
        check(&mut session, &domains).await
    };

    client.disconnect(&mut session).await;
    outcome
}

async fn check(
    session: &mut registrar_orchestrator_epp::EppSession,
    domains: &[String],
) -> anyhow::Result<()> {
    let results = session
        .check_domains(domains.iter().cloned())
        .await
        .context("domain check failed")?;
    for result in results {
        let state = if result.available { "available" } else { "taken" };
        match result.reason {
            Some(reason) => println!("{:<40} {state} ({reason})", result.name),
            None => println!("{:<40} {state}", result.name),
        }
    }
    Ok(())
}

fn print_usage() {
    let registries: Vec<&str> = supported_registries()
        .into_iter()
        .map(|m| m.kind.as_str())
        .collect();
    eprintln!("usage: epp-probe <config.toml> [domain ...]");
    eprintln!("registries: {}", registries.join(", "));
}
