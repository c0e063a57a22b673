use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storyforge_gateway::app;
use storyforge_gateway::config::Args;
use storyforge_gateway::provider::GeminiProvider;
use storyforge_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storyforge_gateway=info,tower_http=info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    args.validate()?;

    let provider = GeminiProvider::new(
        &args.provider_url,
        &args.api_key,
        &args.model,
        args.request_timeout(),
    )?;

    let state = Arc::new(AppState::new(
        Arc::new(provider),
        args.limiters(),
        &args.model,
        &args.title_model,
    ));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, "gateway listening");
    info!(url = %args.provider_url, model = %args.model, "forwarding generation requests");
    info!(
        api_window = args.api_window,
        generation_window = args.generation_window,
        auth_window = args.auth_window,
        max_tracked_keys = args.max_tracked_keys,
        policy = ?args.rejection_policy(),
        "rate limiters configured"
    );

    axum::serve(listener, app(state)).await?;
    Ok(())
}
