use terraform_provider_firebase::provider::FirebaseProvider;
use tf_provider::serve;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr, stdout carries the plugin handshake.
fn init_logging() {
    let filter = EnvFilter::try_from_env("TF_LOG_PROVIDER")
        .or_else(|_| EnvFilter::try_from_env("TF_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // The plugin server may have installed a subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    serve("firebase", FirebaseProvider::default()).await?;
    Ok(())
}
