//! Group endpoints.

use api_types::group::{GroupNew, GroupView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{CreateGroupCmd, MemberProfile};

use crate::{ServerError, members::map_member, server::ServerState};

pub(crate) fn map_group(group: engine::Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        category: group.category,
        created_by: group.created_by,
        created_at: group.created_at,
        total_expense_minor: group.total_expense_minor,
        members: group.members.into_iter().map(map_member).collect(),
    }
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let creator = MemberProfile::new(
        &payload.creator.member_id,
        &payload.creator.display_name,
        payload.creator.avatar_ref.as_deref(),
    );
    let mut cmd = CreateGroupCmd::new(payload.name, creator);
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }

    let group = state.engine.create_group(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_group(group))))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state.engine.group(&group_id).await?;
    Ok(Json(map_group(group)))
}

pub async fn for_member(
    State(state): State<ServerState>,
    Path(member_id): Path<String>,
) -> Result<Json<Vec<GroupView>>, ServerError> {
    let groups = state.engine.groups_for_member(&member_id).await?;
    Ok(Json(groups.into_iter().map(map_group).collect()))
}
