//! Member management endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::MemberProfile;

use api_types::member::{MemberNew, MemberView};

use crate::{ServerError, server::ServerState};

pub(crate) fn map_member(member: engine::Member) -> MemberView {
    MemberView {
        member_id: member.member_id,
        display_name: member.display_name,
        avatar_ref: member.avatar_ref,
        joined_at: member.joined_at,
    }
}

pub async fn add(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let profile = MemberProfile::new(
        &payload.member_id,
        &payload.display_name,
        payload.avatar_ref.as_deref(),
    );
    let member = state.engine.add_member(&group_id, profile).await?;
    Ok((StatusCode::CREATED, Json(map_member(member))))
}

/// Fails with 409 while the member still owes or is owed money.
pub async fn remove(
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state.engine.remove_member(&group_id, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
