use crate::config::Config;
use crate::error_tracker::install_panic_hook;
use crate::handlers::checkout::checkout;
use crate::handlers::health::health_check;
use crate::handlers::products::{
    create_product, delete_product, get_product, list_products, update_product,
};
use crate::handlers::resources;
use crate::handlers::stores::{create_store, list_stores};
use crate::middleware::{handle_panic, logging_middleware, track_errors};
use crate::models::{Billboard, Category, Color, Size};
use crate::state::{AppState, SharedState};
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full API router around `state`.
pub fn create_app(state: SharedState) -> Router {
    let routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/stores", get(list_stores).post(create_store))
        .route(
            "/api/:storeId/products",
            get(list_products).post(create_product),
        )
        .route(
            "/api/:storeId/products/:productId",
            get(get_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .route(
            "/api/:storeId/billboards",
            get(resources::list::<Billboard>).post(resources::create::<Billboard>),
        )
        .route(
            "/api/:storeId/billboards/:billboardId",
            get(resources::get_one::<Billboard>).delete(resources::delete::<Billboard>),
        )
        .route(
            "/api/:storeId/categories",
            get(resources::list::<Category>).post(resources::create::<Category>),
        )
        .route(
            "/api/:storeId/categories/:categoryId",
            get(resources::get_one::<Category>).delete(resources::delete::<Category>),
        )
        .route(
            "/api/:storeId/colors",
            get(resources::list::<Color>).post(resources::create::<Color>),
        )
        .route(
            "/api/:storeId/colors/:colorId",
            get(resources::get_one::<Color>).delete(resources::delete::<Color>),
        )
        .route(
            "/api/:storeId/sizes",
            get(resources::list::<Size>).post(resources::create::<Size>),
        )
        .route(
            "/api/:storeId/sizes/:sizeId",
            get(resources::get_one::<Size>).delete(resources::delete::<Size>),
        )
        .route("/api/:storeId/checkout", axum::routing::post(checkout));

    with_layers(routes, state)
}

/// Wrap `routes` in the request pipeline shared by every endpoint.
pub fn with_layers(routes: Router<SharedState>, state: SharedState) -> Router {
    routes
        .layer(
            // Outermost first: panics become 500s before error tracking sees them.
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), track_errors))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .with_state(state)
}

pub struct Server {
    state: SharedState,
    bind_addr: SocketAddr,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let bind_addr = config.bind_addr;
        Self {
            state: Arc::new(AppState::new(config)),
            bind_addr,
        }
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        install_panic_hook(Arc::clone(&self.state.error_tracker));
        let cleanup = self
            .state
            .rate_limiters
            .spawn_cleanup(self.state.config.cleanup_interval());

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!("Storefront server listening on {}", self.bind_addr);
        tracing::info!("Health check available at /api/health");

        let app = create_app(Arc::clone(&self.state));
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        cleanup.abort();
        tracing::info!("Rate limiter cleanup stopped");
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
