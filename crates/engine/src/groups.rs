//! Groups: the consistency domain of the ledger.
//!
//! Every balance, expense and member belongs to exactly one group. The group
//! row also carries the running `total_expense_minor` aggregate.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Member, ResultEngine, util::normalize_required_text};

/// Category used when a group is created without one.
pub const DEFAULT_GROUP_CATEGORY: &str = "NONE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub category: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub total_expense_minor: i64,
    pub members: Vec<Member>,
}

impl Group {
    pub(crate) fn new(
        name: &str,
        category: Option<&str>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let name = normalize_required_text(name, "group name")?;
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_GROUP_CATEGORY)
            .to_string();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            category,
            created_by: created_by.to_string(),
            created_at,
            total_expense_minor: 0,
            members: Vec::new(),
        })
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub category: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub total_expense_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::members::Entity")]
    Members,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
    #[sea_orm(has_many = "super::balances::Entity")]
    Balances,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::balances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Balances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(group: &Group) -> Self {
        Self {
            id: ActiveValue::Set(group.id.clone()),
            name: ActiveValue::Set(group.name.clone()),
            category: ActiveValue::Set(group.category.clone()),
            created_by: ActiveValue::Set(group.created_by.clone()),
            created_at: ActiveValue::Set(group.created_at),
            total_expense_minor: ActiveValue::Set(group.total_expense_minor),
        }
    }
}

impl From<Model> for Group {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            created_by: model.created_by,
            created_at: model.created_at,
            total_expense_minor: model.total_expense_minor,
            members: Vec::new(),
        }
    }
}
