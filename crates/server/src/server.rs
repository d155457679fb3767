use axum::{
    Router,
    routing::{delete, get, post},
};

use std::sync::Arc;

use crate::{balances, events, expenses, groups, members};
use engine::{BroadcastSink, Engine};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// The sink the engine publishes to; WebSocket clients subscribe here.
    pub events: BroadcastSink,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", post(groups::create))
        .route("/groups/{group_id}", get(groups::get))
        .route("/members/{member_id}/groups", get(groups::for_member))
        .route("/groups/{group_id}/members", post(members::add))
        .route(
            "/groups/{group_id}/members/{member_id}",
            delete(members::remove),
        )
        .route("/groups/{group_id}/balances", get(balances::group))
        .route(
            "/groups/{group_id}/members/{member_id}/balances",
            get(balances::member),
        )
        .route(
            "/groups/{group_id}/expenses",
            get(expenses::list).post(expenses::record),
        )
        .route("/groups/{group_id}/settlements", post(expenses::settle))
        .route("/groups/{group_id}/events", get(events::stream))
        .route(
            "/expenses/{expense_id}",
            get(expenses::get).patch(expenses::amend),
        )
        .route("/expenses/{expense_id}/reverse", post(expenses::reverse))
        .with_state(state)
}

pub async fn run(engine: Engine, events: BroadcastSink, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, events, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    events: BroadcastSink,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        events,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    events: BroadcastSink,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, events, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
