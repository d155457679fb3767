//! Expense event endpoints: record, amend, reverse, settle, history.

use api_types::expense::{
    ExpenseKind as ApiKind, ExpenseList, ExpenseListResponse, ExpenseNew, ExpenseUpdate,
    ExpenseView, LedgerOutcome, SettlementNew, ShareView,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, FixedOffset, Utc};
use engine::{AmendExpenseCmd, ExpenseListFilter, ExpenseMeta, RecordExpenseCmd, SettleCmd};
use uuid::Uuid;

use crate::{ServerError, balances::map_change, server::ServerState};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 200;

fn map_kind(kind: engine::ExpenseKind) -> ApiKind {
    match kind {
        engine::ExpenseKind::Expense => ApiKind::Expense,
        engine::ExpenseKind::Settlement => ApiKind::Settlement,
    }
}

fn map_expense(expense: engine::Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        seq: expense.seq,
        kind: map_kind(expense.kind),
        reversed: expense.is_reversed(),
        payer_id: expense.payer_id,
        amount_minor: expense.amount_minor,
        title: expense.title,
        category: expense.category,
        note: expense.note,
        occurred_at: expense.occurred_at,
        participants: expense
            .participants
            .into_iter()
            .map(|share| ShareView {
                member_id: share.member_id,
                amount_minor: share.amount_minor,
            })
            .collect(),
        amended_by: expense.amended_by,
    }
}

fn map_outcome(outcome: engine::LedgerOutcome) -> LedgerOutcome {
    LedgerOutcome {
        expense_id: outcome.expense_id,
        affected_balances: outcome.affected_balances.iter().map(map_change).collect(),
        group_total_minor: outcome.group_total_minor,
    }
}

fn to_utc(value: Option<DateTime<FixedOffset>>) -> DateTime<Utc> {
    value.map_or_else(Utc::now, |dt| dt.with_timezone(&Utc))
}

pub async fn list(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Query(query): Query<ExpenseList>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ServerError::Generic(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let filter = ExpenseListFilter {
        kinds: (!query.include_settlements.unwrap_or(true))
            .then(|| vec![engine::ExpenseKind::Expense]),
        include_reversed: query.include_reversed.unwrap_or(false),
    };

    let (expenses, next_cursor) = state
        .engine
        .list_expenses_page(&group_id, limit, query.cursor.as_deref(), &filter)
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: expenses.into_iter().map(map_expense).collect(),
        next_cursor,
    }))
}

pub async fn record(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<LedgerOutcome>), ServerError> {
    let mut meta = ExpenseMeta::new(payload.title, to_utc(payload.occurred_at));
    if let Some(category) = payload.category {
        meta = meta.category(category);
    }
    if let Some(note) = payload.note {
        meta = meta.note(note);
    }
    let cmd = RecordExpenseCmd::new(
        group_id,
        payload.payer_id,
        payload.participants,
        payload.amount_minor,
        meta,
    );

    let outcome = state.engine.record_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_outcome(outcome))))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(expense_id).await?;
    Ok(Json(map_expense(expense)))
}

pub async fn amend(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<LedgerOutcome>, ServerError> {
    let cmd = AmendExpenseCmd {
        expense_id,
        amount_minor: payload.amount_minor,
        participants: payload.participants,
        payer_id: payload.payer_id,
        title: payload.title,
        category: payload.category,
        note: payload.note,
        occurred_at: payload.occurred_at.map(|dt| dt.with_timezone(&Utc)),
    };

    let outcome = state.engine.amend_expense(cmd).await?;
    Ok(Json(map_outcome(outcome)))
}

pub async fn reverse(
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<LedgerOutcome>, ServerError> {
    let outcome = state.engine.reverse_expense(expense_id).await?;
    Ok(Json(map_outcome(outcome)))
}

pub async fn settle(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<LedgerOutcome>), ServerError> {
    let mut cmd = SettleCmd::new(
        group_id,
        payload.from_id,
        payload.to_id,
        payload.amount_minor,
        to_utc(payload.occurred_at),
    );
    cmd.note = payload.note;

    let outcome = state.engine.settle(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_outcome(outcome))))
}
