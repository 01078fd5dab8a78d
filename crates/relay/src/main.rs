use murmur_relay::RelayConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "failed to load relay configuration");
            std::process::exit(1);
        }
    };

    if let Err(error) = murmur_relay::serve(config).await {
        tracing::error!(%error, "relay exited with an error");
        std::process::exit(1);
    }
}
