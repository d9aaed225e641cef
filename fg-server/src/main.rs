use anyhow::{Context, Result};
use clap::Parser;
use fg_server::{
    cache::new_cache,
    config::Config,
    database::Database,
    routes::{app, AppState},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// YAML configuration file. Without one, settings come from FG_* environment variables
    #[clap(long)]
    config: Option<String>,

    /// The address and optionally port to bind to, overriding the configuration
    #[clap(long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Parse command line arguments
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("Loading config from {path}"))?,
        None => Config::from_env(),
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }

    // initialize tracing
    let _guard = match &config.logging.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "access.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .json()
                .with_writer(non_blocking)
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        }
    };

    // connect to the database
    let db = Database::connect(&config.database.path)
        .await
        .context("Connecting to database")?;

    let address = config.server.address.clone();
    let tls = config.server.tls.clone();
    let app = app(AppState {
        db,
        cache: new_cache(),
        config,
    });

    match tls {
        Some(tls) => {
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .context("Loading TLS certificate")?;

            let addr = address.parse()?;
            tracing::info!("Listening on {} (TLS)", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("Starting TLS server")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&address).await?;
            tracing::info!("Listening on {}", address);
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
