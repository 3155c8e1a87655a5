use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use driftchat_server::{
    assistant::{gemini::GeminiModel, AssistantPipeline},
    config::Config,
    delivery::DeliveryService,
    realtime::GatewayState,
    store::{BlobStore, ChatStore, MemoryBlobStore, MemoryStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "driftchat_server=debug,tower_http=debug,axum::rejection=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env());

    let memory = Arc::new(MemoryStore::new());
    let ai = memory.seed_ai_identity("Drift AI");
    info!(ai = %ai.id, "Assistant identity ready");

    let store: Arc<dyn ChatStore> = memory;
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let gateway = Arc::new(GatewayState::new(config.event_buffer));
    let model = Arc::new(GeminiModel::new(config.ai_model.clone()));
    let assistant = AssistantPipeline::new(store.clone(), gateway.clone(), model);
    let delivery = Arc::new(DeliveryService::new(
        store.clone(),
        blobs,
        gateway.clone(),
        assistant,
    ));

    let state = AppState {
        config: config.clone(),
        store,
        gateway,
        delivery,
    };
    let app = driftchat_server::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
