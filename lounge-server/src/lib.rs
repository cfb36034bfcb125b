use axum::{routing::get, Router as AxumRouter};
use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use lounge_core::{Coordinator, Database};

mod context;
mod docs;
mod errors;
mod gateway;
pub mod logging;
mod media;
mod rooms;
mod serialized;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 4530;

type Router<Db> = AxumRouter<ServerContext<Db>>;

/// Starts the lounge server
pub async fn run_server<Db>(coordinator: Coordinator<Db>)
where
    Db: Database,
{
    let context = ServerContext {
        coordinator: Arc::new(coordinator),
    };

    let port = env::var("LOUNGE_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    serve(listener, context).await
}

/// Serves the lounge API on an already-bound listener.
pub async fn serve<Db>(listener: TcpListener, context: ServerContext<Db>)
where
    Db: Database,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/media", media::router());

    let root_router = Router::new()
        .nest("/api", api_router)
        .route("/api.json", get(docs::docs))
        .route("/ws", get(gateway::ws_handler::<Db>))
        .with_state(context)
        .layer(cors);

    axum::serve(listener, root_router.into_make_service())
        .await
        .unwrap();
}
