use anyhow::Context;

use pettycash_infra::PettyCashConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pettycash_observability::init();

    let config = PettyCashConfig::from_env().context("invalid configuration")?;
    let app = pettycash_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        policy_window_days = config.policy_window.as_duration().num_days(),
        "petty cash api listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
