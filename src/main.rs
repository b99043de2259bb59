use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use privateurl::cli::{self, Commands};
use privateurl::config::{self, Config};
use privateurl::hooks::HookRegistry;
use privateurl::jobs;
use privateurl::service::{CreatePrivateUrl, PrivateUrls};
use privateurl::store::{MemoryStore, PgStore, PrivateUrlStore};
use privateurl::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export only when an endpoint is configured
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "privateurl"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "privateurl=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port, in_memory }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, in_memory).await
        }
        Some(command) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let urls = PrivateUrls::new(Arc::new(db));
            handle_command(command, &urls, &cfg).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn PrivateUrlStore> = if in_memory {
        tracing::warn!("Using in-memory store; urls are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        tracing::info!("Connecting to database...");
        let db = PgStore::connect(&cfg.database_url).await?;

        tracing::info!("Running migrations...");
        db.migrate().await?;
        Arc::new(db)
    };

    let urls = PrivateUrls::new(store);

    if cfg.cleanup_interval_secs > 0 {
        jobs::cleanup::spawn(urls.clone(), Duration::from_secs(cfg.cleanup_interval_secs));
        tracing::info!(
            every_secs = cfg.cleanup_interval_secs,
            "Background cleanup job started"
        );
    }

    let state = Arc::new(AppState {
        urls,
        hooks: HookRegistry::new(),
        config: cfg,
    });
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("privateurl listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_command(cmd: Commands, urls: &PrivateUrls, cfg: &Config) -> anyhow::Result<()> {
    match cmd {
        Commands::Create {
            action,
            owner,
            expire_in_secs,
            usage_limit,
            auto_delete,
            replace,
            payload,
            token_size,
            dash_split_each,
        } => {
            let mut req = CreatePrivateUrl::new(action)
                .usage_limit(usage_limit)
                .auto_delete(auto_delete)
                .replace(replace)
                .dash_split_each(dash_split_each);
            if let Some(owner) = owner {
                req = req.owner(owner);
            }
            if let Some(secs) = expire_in_secs {
                let duration = chrono::Duration::try_seconds(secs)
                    .ok_or_else(|| anyhow::anyhow!("expire_in_secs out of range: {}", secs))?;
                req = req.expire(duration);
            }
            if let Some(raw) = payload {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("payload is not valid JSON")?;
                req = req.payload(value);
            }
            if let Some(size) = token_size {
                req = req.token_size(size);
            }

            let url = urls.create(req).await?;
            println!("Private url created:");
            println!("  ID:      {}", url.id.map(|id| id.to_string()).unwrap_or_default());
            println!("  Action:  {}", url.action);
            println!("  Token:   {}", url.token);
            println!("  Path:    {}", url.path(&cfg.path_prefix));
            if let Some(expires_at) = url.expires_at {
                println!("  Expires: {}", expires_at.to_rfc3339());
            }
        }
        Commands::Show { action, token } => match urls.find(&action, &token).await? {
            Some(url) => {
                println!("{}", serde_json::to_string_pretty(&url)?);
                println!("available: {}", url.is_available_now());
            }
            None => println!("Private url not found."),
        },
        Commands::Revoke { id } => {
            if urls.revoke(id).await? {
                println!("Private url deleted.");
            } else {
                println!("Private url not found.");
            }
        }
        Commands::PurgeExpired { all } => {
            let deleted = jobs::cleanup::sweep(urls, !all).await?;
            println!("Deleted {} expired private url(s).", deleted);
        }
        Commands::Serve { .. } => anyhow::bail!("serve is not a one-shot command"),
    }
    Ok(())
}
