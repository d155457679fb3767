//! Expense events.
//!
//! An [`Expense`] is one shared payment: `payer_id` paid `amount_minor` on
//! behalf of the participants. The event log is the source of truth for the
//! ledger; balances are derived from it.
//!
//! Events are never updated in place. A correction marks the event reversed
//! (`reversed_at`) and, for an amend, points at the replacement event
//! (`amended_by`).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    netting::{Delta, Share},
    util::parse_uuid,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    /// A shared payment. Counts toward the group total.
    Expense,
    /// A direct repayment from a debtor to a creditor. Moves balances only.
    Settlement,
}

impl ExpenseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Settlement => "settlement",
        }
    }

    /// Whether events of this kind feed the group total.
    pub fn counts_toward_total(self) -> bool {
        matches!(self, Self::Expense)
    }
}

impl TryFrom<&str> for ExpenseKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "settlement" => Ok(Self::Settlement),
            other => Err(EngineError::InvalidEvent(format!(
                "invalid expense kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: String,
    /// Creation order within the group. Replays walk events by `seq`.
    pub seq: i64,
    pub kind: ExpenseKind,
    pub payer_id: String,
    pub amount_minor: i64,
    pub title: String,
    pub category: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub amended_by: Option<Uuid>,
    /// Participants in recorded order, each with the share they were charged.
    pub participants: Vec<Share>,
}

impl Expense {
    pub fn is_reversed(&self) -> bool {
        self.reversed_at.is_some()
    }

    /// Debts this event adds to the ledger.
    pub fn deltas(&self) -> Vec<Delta> {
        crate::netting::debts_for(&self.payer_id, &self.participants)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub seq: i64,
    pub kind: String,
    pub payer_id: String,
    pub amount_minor: i64,
    pub title: String,
    pub category: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub reversed_at: Option<DateTimeUtc>,
    pub amended_by: Option<String>,
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
    #[sea_orm(has_many = "super::expense_participants::Entity")]
    Participants,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::expense_participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            seq: ActiveValue::Set(expense.seq),
            kind: ActiveValue::Set(expense.kind.as_str().to_string()),
            payer_id: ActiveValue::Set(expense.payer_id.clone()),
            amount_minor: ActiveValue::Set(expense.amount_minor),
            title: ActiveValue::Set(expense.title.clone()),
            category: ActiveValue::Set(expense.category.clone()),
            note: ActiveValue::Set(expense.note.clone()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            created_at: ActiveValue::Set(expense.created_at),
            reversed_at: ActiveValue::Set(expense.reversed_at),
            amended_by: ActiveValue::Set(expense.amended_by.map(|id| id.to_string())),
        }
    }
}

/// Rebuilds an [`Expense`] from its row and its participant rows.
impl TryFrom<(Model, Vec<super::expense_participants::Model>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, mut participants): (Model, Vec<super::expense_participants::Model>),
    ) -> ResultEngine<Self> {
        participants.sort_by_key(|p| p.position);
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            group_id: model.group_id,
            seq: model.seq,
            kind: ExpenseKind::try_from(model.kind.as_str())?,
            payer_id: model.payer_id,
            amount_minor: model.amount_minor,
            title: model.title,
            category: model.category,
            note: model.note,
            occurred_at: model.occurred_at,
            created_at: model.created_at,
            reversed_at: model.reversed_at,
            amended_by: model
                .amended_by
                .as_deref()
                .map(|id| parse_uuid(id, "expense"))
                .transpose()?,
            participants: participants
                .into_iter()
                .map(|p| Share {
                    member_id: p.member_id,
                    amount_minor: p.share_minor,
                })
                .collect(),
        })
    }
}
