use pinmap::config::Config;
use pinmap::error::Error;
use pinmap::server::serve;
use pinmap::store;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pinmap=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let api = store::open(&config.store)?;

    serve(api, &config).await
}
