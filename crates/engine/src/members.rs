//! Group members and the member registry.
//!
//! A member is identified by an opaque `member_id`, unique within its group.
//! The ledger never reads display data for arithmetic; names and avatars are
//! only resolved through [`MemberRegistry`] when assembling views.

use std::future::Future;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{ResultEngine, util::normalize_required_text};

/// Display metadata for a member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl MemberProfile {
    pub fn new(member_id: &str, display_name: &str, avatar_ref: Option<&str>) -> Self {
        Self {
            member_id: member_id.to_string(),
            display_name: display_name.to_string(),
            avatar_ref: avatar_ref.map(ToString::to_string),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub group_id: String,
    pub member_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub(crate) fn new(
        group_id: &str,
        profile: &MemberProfile,
        joined_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        Ok(Self {
            group_id: group_id.to_string(),
            member_id: normalize_required_text(&profile.member_id, "member id")?,
            display_name: normalize_required_text(&profile.display_name, "member display name")?,
            avatar_ref: profile
                .avatar_ref
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            joined_at,
        })
    }

    pub fn profile(&self) -> MemberProfile {
        MemberProfile {
            member_id: self.member_id.clone(),
            display_name: self.display_name.clone(),
            avatar_ref: self.avatar_ref.clone(),
        }
    }
}

/// Resolves member ids to display metadata.
///
/// The engine implements it over the `members` table (primary-key lookup);
/// callers can plug their own directory instead.
pub trait MemberRegistry {
    fn resolve_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> impl Future<Output = ResultEngine<Option<MemberProfile>>> + Send;
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub joined_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Member> for ActiveModel {
    fn from(member: &Member) -> Self {
        Self {
            group_id: ActiveValue::Set(member.group_id.clone()),
            member_id: ActiveValue::Set(member.member_id.clone()),
            display_name: ActiveValue::Set(member.display_name.clone()),
            avatar_ref: ActiveValue::Set(member.avatar_ref.clone()),
            joined_at: ActiveValue::Set(member.joined_at),
        }
    }
}

impl From<Model> for Member {
    fn from(model: Model) -> Self {
        Self {
            group_id: model.group_id,
            member_id: model.member_id,
            display_name: model.display_name,
            avatar_ref: model.avatar_ref,
            joined_at: model.joined_at,
        }
    }
}
