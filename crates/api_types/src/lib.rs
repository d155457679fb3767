use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod member {
    use super::*;

    /// Request body for adding a member (also used for a group's creator).
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub member_id: String,
        pub display_name: String,
        pub avatar_ref: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub member_id: String,
        pub display_name: String,
        pub avatar_ref: Option<String>,
        pub joined_at: DateTime<Utc>,
    }
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
        /// Defaults to `NONE`.
        pub category: Option<String>,
        pub creator: member::MemberNew,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: String,
        pub name: String,
        pub category: String,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
        /// Sum of live expenses (settlements excluded), in cents.
        pub total_expense_minor: i64,
        pub members: Vec<member::MemberView>,
    }
}

pub mod balance {
    use super::*;

    /// "debtor owes creditor `amount_minor`".
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BalanceEdge {
        pub id: Uuid,
        pub debtor_id: String,
        pub creditor_id: String,
        pub amount_minor: i64,
    }

    /// A balance with display names for both ends.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub debtor_id: String,
        pub debtor_name: String,
        pub creditor_id: String,
        pub creditor_name: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupBalances {
        pub group_id: String,
        pub total_expense_minor: i64,
        pub balances: Vec<BalanceView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberBalances {
        pub group_id: String,
        pub member_id: String,
        /// Owed to the member minus owed by the member.
        pub net_position_minor: i64,
        pub balances: Vec<BalanceEdge>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ChangeKind {
        Created,
        Updated,
        Deleted,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BalanceChange {
        pub change: ChangeKind,
        /// For `deleted`, the edge as it was before removal.
        pub balance: BalanceEdge,
        /// Only set for `updated`.
        pub previous_amount_minor: Option<i64>,
    }
}

pub mod expense {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ExpenseKind {
        Expense,
        Settlement,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub payer_id: String,
        /// Split order matters: the last participant absorbs the rounding
        /// remainder.
        pub participants: Vec<String>,
        /// Must be > 0.
        pub amount_minor: i64,
        pub title: String,
        pub category: Option<String>,
        pub note: Option<String>,
        /// RFC3339 timestamp, including timezone offset (local user time).
        /// Optional: if absent, server uses now().
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    /// Amend request. Absent fields keep the original value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub amount_minor: Option<i64>,
        pub participants: Option<Vec<String>>,
        pub payer_id: Option<String>,
        pub title: Option<String>,
        pub category: Option<String>,
        pub note: Option<String>,
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        /// The debtor paying back.
        pub from_id: String,
        pub to_id: String,
        pub amount_minor: i64,
        pub note: Option<String>,
        pub occurred_at: Option<DateTime<FixedOffset>>,
    }

    /// Query string for the expense history.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
        pub include_reversed: Option<bool>,
        pub include_settlements: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub member_id: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub seq: i64,
        pub kind: ExpenseKind,
        pub payer_id: String,
        pub amount_minor: i64,
        pub title: String,
        pub category: Option<String>,
        pub note: Option<String>,
        pub occurred_at: DateTime<Utc>,
        pub participants: Vec<ShareView>,
        pub reversed: bool,
        pub amended_by: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    /// Response to every ledger mutation.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerOutcome {
        pub expense_id: Uuid,
        pub affected_balances: Vec<balance::BalanceChange>,
        pub group_total_minor: i64,
    }
}

pub mod events {
    use super::*;

    /// Pushed on `/groups/{group_id}/events` after each committed change.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LedgerEvent {
        pub group_id: String,
        pub affected_balances: Vec<balance::BalanceChange>,
        pub new_group_total_minor: i64,
    }
}
