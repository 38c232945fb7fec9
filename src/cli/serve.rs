use std::sync::Arc;

use poem::{Server, listener::TcpListener};

use crate::api::build_routes;
use crate::app_data::AppData;

/// Bind the configured address and serve the route tree until shutdown
pub async fn run_server(app_data: Arc<AppData>) -> Result<(), std::io::Error> {
    let address = app_data.settings.server_address();
    let server_url = format!("{}/api", app_data.settings.app_base_url().trim_end_matches('/'));
    let app = build_routes(app_data, &server_url);

    tracing::info!("Starting server on http://{}", address);
    tracing::info!("Swagger UI available at http://{}/swagger", address);

    Server::new(TcpListener::bind(address)).run(app).await
}
