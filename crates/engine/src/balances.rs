//! Ledger edges.
//!
//! A [`Balance`] means "`debtor_id` owes `creditor_id` `amount_minor`". Within
//! a group there is at most one edge per unordered pair of members, and an
//! edge never carries a zero or negative amount: it is deleted instead.
//!
//! Balances are derived state. Only the ledger writes them, and replaying the
//! group's expense events from an empty set must reproduce them.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: Uuid,
    pub group_id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount_minor: i64,
}

impl Balance {
    pub fn new(group_id: &str, debtor_id: &str, creditor_id: &str, amount_minor: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: group_id.to_string(),
            debtor_id: debtor_id.to_string(),
            creditor_id: creditor_id.to_string(),
            amount_minor,
        }
    }

    /// Returns `true` if the edge touches `member_id` in either direction.
    pub fn touches(&self, member_id: &str) -> bool {
        self.debtor_id == member_id || self.creditor_id == member_id
    }

    /// Signed amount from the point of view of `member_id`: positive when the
    /// member is owed, negative when the member owes, 0 when not involved.
    pub fn signed_for(&self, member_id: &str) -> i64 {
        if self.creditor_id == member_id {
            self.amount_minor
        } else if self.debtor_id == member_id {
            -self.amount_minor
        } else {
            0
        }
    }
}

/// One edge mutation produced by a ledger operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum BalanceChange {
    Created {
        balance: Balance,
    },
    Updated {
        balance: Balance,
        previous_amount_minor: i64,
    },
    /// The edge was removed; `balance` holds its last amount.
    Deleted {
        balance: Balance,
    },
}

impl BalanceChange {
    pub fn balance(&self) -> &Balance {
        match self {
            Self::Created { balance } | Self::Updated { balance, .. } | Self::Deleted { balance } => {
                balance
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount_minor: i64,
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

impl From<&Balance> for ActiveModel {
    fn from(balance: &Balance) -> Self {
        Self {
            id: ActiveValue::Set(balance.id.to_string()),
            group_id: ActiveValue::Set(balance.group_id.clone()),
            debtor_id: ActiveValue::Set(balance.debtor_id.clone()),
            creditor_id: ActiveValue::Set(balance.creditor_id.clone()),
            amount_minor: ActiveValue::Set(balance.amount_minor),
        }
    }
}

impl TryFrom<Model> for Balance {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "balance")?,
            group_id: model.group_id,
            debtor_id: model.debtor_id,
            creditor_id: model.creditor_id,
            amount_minor: model.amount_minor,
        })
    }
}
