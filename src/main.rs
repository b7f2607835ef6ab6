use std::env;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading anything: provider keys and RUST_LOG may
    // both live there. Missing file is fine (env-only deployments).
    let _ = dotenvy::dotenv();
    init_tracing();

    match env::args().nth(1).as_deref() {
        Some("console") => ricci_chat::console::run().await,
        Some("serve") | None => ricci_chat::server::run().await,
        Some(other) => anyhow::bail!("unknown mode '{other}' (expected 'serve' or 'console')"),
    }
}
