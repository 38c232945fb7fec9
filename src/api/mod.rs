// API layer - HTTP endpoints
pub mod admin;
pub mod auth;
pub mod guard;
pub mod health;
pub mod permission;

use std::sync::Arc;

use poem::{EndpointExt, IntoResponse, Response, Route, endpoint::BoxEndpoint};
use poem_openapi::OpenApiService;
use poem_openapi::error::{
    ContentTypeError, ParseMultipartError, ParseParamError, ParseRequestPayloadError,
};

pub use admin::AdminApi;
pub use auth::AuthApi;
pub use guard::AccessGuard;
pub use health::HealthApi;
pub use permission::PermissionApi;

use crate::app_data::AppData;
use crate::coordinators::{AdminCoordinator, AuthCoordinator, PermissionCoordinator};
use crate::errors::api::ApiError;

/// Compose the route tree: the OpenAPI service under `/api` and Swagger UI
/// under `/swagger`
///
/// `server_url` is advertised in the generated document.
pub fn build_routes(app_data: Arc<AppData>, server_url: &str) -> BoxEndpoint<'static> {
    let guard = AccessGuard::new(app_data.tokens.clone());

    let auth_api = AuthApi::new(
        Arc::new(AuthCoordinator::new(app_data.clone())),
        guard.clone(),
    );
    let permission_api = PermissionApi::new(
        Arc::new(PermissionCoordinator::new(app_data.clone())),
        guard.clone(),
    );
    let health_api = HealthApi::new(app_data.connections.clone());
    let admin_api = AdminApi::new(Arc::new(AdminCoordinator::new(app_data)), guard);

    let api_service = OpenApiService::new(
        (health_api, auth_api, permission_api, admin_api),
        "Council Auth API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(server_url);

    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/api", api_service)
        .nest("/swagger", ui)
        .catch_all_error(render_request_error)
        .with(poem::middleware::Tracing)
        .boxed()
}

/// Requests rejected while extracting parameters or bodies get the same
/// JSON error body as every handler failure
async fn render_request_error(err: poem::Error) -> Response {
    if err.is::<ParseRequestPayloadError>()
        || err.is::<ParseParamError>()
        || err.is::<ContentTypeError>()
        || err.is::<ParseMultipartError>()
    {
        tracing::debug!("Rejected malformed request: {}", err);
        return ApiError::validation(err.to_string()).into_response();
    }
    err.into_response()
}
