pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod pages;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use tokio::net::TcpListener;

use auth::{HasAuthBackend, RouteTable, SessionCookies, authenticate};
use db::Database;
use jwt::JwtConfig;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing session tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set the Secure flag on cookies (true in production with HTTPS)
    pub secure_cookies: bool,
}

/// Shared application state handed to every handler and the auth
/// middleware. The route table is built once here and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub routes: Arc<RouteTable>,
    pub secure_cookies: bool,
}

impl HasAuthBackend for AppState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn db(&self) -> &Database {
        &self.db
    }

    fn routes(&self) -> &RouteTable {
        &self.routes
    }

    fn session_cookies(&self) -> SessionCookies {
        SessionCookies::new(self.secure_cookies)
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let state = AppState {
        db: config.db.clone(),
        jwt: Arc::new(JwtConfig::new(&config.jwt_secret)),
        routes: Arc::new(RouteTable::dashboard_defaults()),
        secure_cookies: config.secure_cookies,
    };

    pages::create_page_router(state.clone())
        .layer(middleware::from_fn_with_state(
            state,
            authenticate::<AppState>,
        ))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
