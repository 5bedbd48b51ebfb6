use std::sync::Arc;

use fieldsync::server::registry::ResourceRegistry;
use fieldsync::server::routes;
use fieldsync::server::service::RemoteSyncService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let db_path = std::env::var("FIELDSYNC_DB").unwrap_or_else(|_| "fieldsync_server.db".to_string());
    let addr = std::env::var("FIELDSYNC_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

    let pool = fieldsync::initialize(&db_path).await?;
    log::info!("database ready at {}", db_path);

    let service = Arc::new(RemoteSyncService::new(pool, ResourceRegistry::with_defaults()));
    let app = routes::router(service);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("sync server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
