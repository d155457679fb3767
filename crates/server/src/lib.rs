use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod balances;
mod events;
mod expenses;
mod groups;
mod members;
mod server;

pub mod types {
    pub mod group {
        pub use api_types::group::{GroupNew, GroupView};
    }

    pub mod member {
        pub use api_types::member::{MemberNew, MemberView};
    }

    pub mod balance {
        pub use api_types::balance::{
            BalanceChange, BalanceEdge, BalanceView, ChangeKind, GroupBalances, MemberBalances,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseKind, ExpenseList, ExpenseListResponse, ExpenseNew, ExpenseUpdate,
            ExpenseView, LedgerOutcome, SettlementNew, ShareView,
        };
    }

    pub mod events {
        pub use api_types::events::LedgerEvent;
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
    /// Set when resubmitting the same request may succeed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::MemberHasOpenBalance(_) => {
            StatusCode::CONFLICT
        }
        EngineError::InvalidEvent(_) | EngineError::InvalidAmount(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::InvalidId(_) | EngineError::InvalidInput(_) | EngineError::InvalidCursor(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::GroupBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::AggregateUnderflow(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::AggregateUnderflow(msg) => {
            tracing::error!("aggregate underflow: {msg}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error, retryable) = match self {
            ServerError::Engine(err) => {
                let retryable = err.is_retryable();
                (
                    status_for_engine_error(&err),
                    message_for_engine_error(err),
                    retryable,
                )
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err, false),
        };

        (status, Json(Error { error, retryable })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = ServerError::from(EngineError::MemberHasOpenBalance("x".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::InvalidEvent("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let res = ServerError::from(EngineError::InvalidAmount("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn busy_group_maps_to_503() {
        let res = ServerError::from(EngineError::GroupBusy("g".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn underflow_is_hidden_behind_500() {
        let res = ServerError::from(EngineError::AggregateUnderflow("g".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
