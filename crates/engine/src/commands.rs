//! Command structs for engine operations.
//!
//! These types group parameters for write operations
//! (record/amend/settle/create group), keeping call sites readable and
//! avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::MemberProfile;

/// Metadata attached to an expense. Opaque to the ledger arithmetic.
#[derive(Clone, Debug)]
pub struct ExpenseMeta {
    pub title: String,
    pub category: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ExpenseMeta {
    #[must_use]
    pub fn new(title: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            category: None,
            note: None,
            occurred_at,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Record a shared expense: `payer_id` paid `amount_minor`, split among
/// `participants` (in order; the last one absorbs the rounding remainder).
#[derive(Clone, Debug)]
pub struct RecordExpenseCmd {
    pub group_id: String,
    pub payer_id: String,
    pub participants: Vec<String>,
    pub amount_minor: i64,
    pub meta: ExpenseMeta,
}

impl RecordExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        payer_id: impl Into<String>,
        participants: impl IntoIterator<Item = impl Into<String>>,
        amount_minor: i64,
        meta: ExpenseMeta,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            payer_id: payer_id.into(),
            participants: participants.into_iter().map(Into::into).collect(),
            amount_minor,
            meta,
        }
    }
}

/// Correct an expense. Fields left `None` keep the original value.
#[derive(Clone, Debug)]
pub struct AmendExpenseCmd {
    pub expense_id: Uuid,
    pub amount_minor: Option<i64>,
    pub participants: Option<Vec<String>>,
    pub payer_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl AmendExpenseCmd {
    #[must_use]
    pub fn new(expense_id: Uuid) -> Self {
        Self {
            expense_id,
            amount_minor: None,
            participants: None,
            payer_id: None,
            title: None,
            category: None,
            note: None,
            occurred_at: None,
        }
    }

    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn participants(mut self, participants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.participants = Some(participants.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn payer_id(mut self, payer_id: impl Into<String>) -> Self {
        self.payer_id = Some(payer_id.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Record a direct repayment: `from_id` pays `to_id` back.
#[derive(Clone, Debug)]
pub struct SettleCmd {
    pub group_id: String,
    pub from_id: String,
    pub to_id: String,
    pub amount_minor: i64,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SettleCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount_minor,
            note: None,
            occurred_at,
        }
    }
}

/// Create a group; the creator becomes its first member.
#[derive(Clone, Debug)]
pub struct CreateGroupCmd {
    pub name: String,
    pub category: Option<String>,
    pub creator: MemberProfile,
}

impl CreateGroupCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, creator: MemberProfile) -> Self {
        Self {
            name: name.into(),
            category: None,
            creator,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
