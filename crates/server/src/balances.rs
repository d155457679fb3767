//! Balance endpoints.

use api_types::balance::{
    BalanceChange, BalanceEdge, BalanceView, ChangeKind, GroupBalances, MemberBalances,
};
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{ServerError, server::ServerState};

pub(crate) fn map_edge(balance: &engine::Balance) -> BalanceEdge {
    BalanceEdge {
        id: balance.id,
        debtor_id: balance.debtor_id.clone(),
        creditor_id: balance.creditor_id.clone(),
        amount_minor: balance.amount_minor,
    }
}

pub(crate) fn map_change(change: &engine::BalanceChange) -> BalanceChange {
    let (kind, previous_amount_minor) = match change {
        engine::BalanceChange::Created { .. } => (ChangeKind::Created, None),
        engine::BalanceChange::Updated {
            previous_amount_minor,
            ..
        } => (ChangeKind::Updated, Some(*previous_amount_minor)),
        engine::BalanceChange::Deleted { .. } => (ChangeKind::Deleted, None),
    };
    BalanceChange {
        change: kind,
        balance: map_edge(change.balance()),
        previous_amount_minor,
    }
}

pub async fn group(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupBalances>, ServerError> {
    let engine = &state.engine;
    let group = engine.group(&group_id).await?;
    let balances = engine
        .describe_balances(engine.as_ref(), &group_id)
        .await?
        .into_iter()
        .map(|view| BalanceView {
            debtor_id: view.debtor.member_id,
            debtor_name: view.debtor.display_name,
            creditor_id: view.creditor.member_id,
            creditor_name: view.creditor.display_name,
            amount_minor: view.amount_minor,
        })
        .collect();

    Ok(Json(GroupBalances {
        group_id,
        total_expense_minor: group.total_expense_minor,
        balances,
    }))
}

pub async fn member(
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(String, String)>,
) -> Result<Json<MemberBalances>, ServerError> {
    let edges = state.engine.member_balances(&group_id, &member_id).await?;
    let net_position_minor = edges.iter().map(|b| b.signed_for(&member_id)).sum();

    Ok(Json(MemberBalances {
        group_id,
        net_position_minor,
        balances: edges.iter().map(map_edge).collect(),
        member_id,
    }))
}
