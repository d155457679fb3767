//! Expense Event Log operations.
//!
//! Every mutation follows the same path: validate the input, take the group
//! lock, open a DB transaction, load the group's edges once, fold the deltas
//! in memory, persist the edge changes and the aggregate, commit, notify.
//! Any error before commit drops the transaction, so an event is applied
//! entirely or not at all.

use std::collections::HashMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, Select, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AmendExpenseCmd, BalanceChange, Delta, EngineError, Expense, ExpenseKind, Ledger,
    RecordExpenseCmd, ResultEngine, SettleCmd, expense_participants, expenses,
    netting::{Share, split_shares},
    util::{normalize_member_ids, normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

/// Result of a ledger mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub group_id: String,
    /// The recorded event (record, settle, amend) or the reversed one
    /// (reverse).
    pub expense_id: Uuid,
    pub affected_balances: Vec<BalanceChange>,
    pub group_total_minor: i64,
}

/// Filters for listing expenses.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<ExpenseKind>>,
    /// If true, includes reversed events (default: false).
    pub include_reversed: bool,
}

fn validate_list_filter(filter: &ExpenseListFilter) -> ResultEngine<()> {
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::InvalidInput(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ExpensesCursor {
    seq: i64,
}

impl ExpensesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid expenses cursor".to_string()))
    }
}

/// A validated event, not yet stored.
#[derive(Clone, Debug)]
struct ExpenseDraft {
    id: Uuid,
    kind: ExpenseKind,
    payer_id: String,
    amount_minor: i64,
    shares: Vec<Share>,
    title: String,
    category: Option<String>,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl ExpenseDraft {
    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: ExpenseKind,
        payer_id: &str,
        participants: &[String],
        amount_minor: i64,
        title: &str,
        category: Option<&str>,
        note: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        let payer_id = payer_id.trim();
        if payer_id.is_empty() {
            return Err(EngineError::InvalidEvent(
                "payer id must not be empty".to_string(),
            ));
        }
        let participants = normalize_member_ids(participants)?;
        if kind == ExpenseKind::Settlement
            && (participants.len() != 1 || participants[0] == payer_id)
        {
            return Err(EngineError::InvalidEvent(
                "a settlement moves money between two different members".to_string(),
            ));
        }
        let shares = split_shares(amount_minor, &participants)?;
        let title = normalize_required_text(title, "title")
            .map_err(|_| EngineError::InvalidEvent("title must not be empty".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            payer_id: payer_id.to_string(),
            amount_minor,
            shares,
            title,
            category: normalize_optional_text(category),
            note: normalize_optional_text(note),
            occurred_at,
        })
    }

    fn member_ids(&self) -> Vec<&str> {
        std::iter::once(self.payer_id.as_str())
            .chain(self.shares.iter().map(|s| s.member_id.as_str()))
            .collect()
    }
}

impl Engine {
    /// Records a shared expense and nets its debts into the group ledger.
    ///
    /// Fails with `InvalidEvent` when the amount is not positive, the split
    /// is empty, or the payer/participants are not members of the group.
    pub async fn record_expense(&self, cmd: RecordExpenseCmd) -> ResultEngine<LedgerOutcome> {
        let draft = ExpenseDraft::new(
            ExpenseKind::Expense,
            &cmd.payer_id,
            &cmd.participants,
            cmd.amount_minor,
            &cmd.meta.title,
            cmd.meta.category.as_deref(),
            cmd.meta.note.as_deref(),
            cmd.meta.occurred_at,
        )?;
        self.record_draft(&cmd.group_id, draft).await
    }

    /// Records a direct repayment from `from_id` to `to_id`.
    ///
    /// Settlements go through the same netting as expenses but do not count
    /// toward the group total.
    pub async fn settle(&self, cmd: SettleCmd) -> ResultEngine<LedgerOutcome> {
        let draft = ExpenseDraft::new(
            ExpenseKind::Settlement,
            &cmd.from_id,
            std::slice::from_ref(&cmd.to_id),
            cmd.amount_minor,
            "Settlement",
            None,
            cmd.note.as_deref(),
            cmd.occurred_at,
        )?;
        self.record_draft(&cmd.group_id, draft).await
    }

    async fn record_draft(&self, group_id: &str, draft: ExpenseDraft) -> ResultEngine<LedgerOutcome> {
        let _guard = self.lock_group(group_id).await?;
        let outcome = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            self.require_members(&db_tx, group_id, &draft.member_ids())
                .await?;

            let mut ledger = self.load_ledger(&db_tx, group_id).await?;
            let (expense, total) = self
                .record_locked(&db_tx, group_id, &mut ledger, draft)
                .await?;
            let affected = self.persist_ledger(&db_tx, &ledger).await?;

            Ok::<_, EngineError>(LedgerOutcome {
                group_id: group_id.to_string(),
                expense_id: expense.id,
                affected_balances: affected,
                group_total_minor: total,
            })
        })?;

        tracing::info!(
            "recorded expense {} in group {group_id}: {} balance change(s)",
            outcome.expense_id,
            outcome.affected_balances.len()
        );
        self.notify(group_id, &outcome.affected_balances, outcome.group_total_minor);
        Ok(outcome)
    }

    /// Undoes an expense: its debts are applied with debtor and creditor
    /// swapped, and the group total is decremented.
    pub async fn reverse_expense(&self, expense_id: Uuid) -> ResultEngine<LedgerOutcome> {
        let group_id = self.expense_group_id(expense_id).await?;
        let _guard = self.lock_group(&group_id).await?;
        let outcome = with_tx!(self, |db_tx| {
            let expense = self.load_expense(&db_tx, expense_id).await?;
            if expense.is_reversed() {
                return Err(EngineError::InvalidEvent(
                    "expense already reversed".to_string(),
                ));
            }

            let mut ledger = self.load_ledger(&db_tx, &group_id).await?;
            let total = self
                .reverse_locked(&db_tx, &mut ledger, &expense, None)
                .await?;
            let affected = self.persist_ledger(&db_tx, &ledger).await?;

            Ok::<_, EngineError>(LedgerOutcome {
                group_id: group_id.clone(),
                expense_id,
                affected_balances: affected,
                group_total_minor: total,
            })
        })?;

        tracing::info!(
            "reversed expense {expense_id} in group {group_id}: {} balance change(s)",
            outcome.affected_balances.len()
        );
        self.notify(&group_id, &outcome.affected_balances, outcome.group_total_minor);
        Ok(outcome)
    }

    /// Corrects an expense by reversing it and recording the corrected event,
    /// under one lock and one DB transaction. The old event keeps a link to
    /// its replacement.
    pub async fn amend_expense(&self, cmd: AmendExpenseCmd) -> ResultEngine<LedgerOutcome> {
        let group_id = self.expense_group_id(cmd.expense_id).await?;
        let _guard = self.lock_group(&group_id).await?;
        let outcome = with_tx!(self, |db_tx| {
            let original = self.load_expense(&db_tx, cmd.expense_id).await?;
            if original.is_reversed() {
                return Err(EngineError::InvalidEvent(
                    "expense already reversed".to_string(),
                ));
            }

            let participants = cmd.participants.clone().unwrap_or_else(|| {
                original
                    .participants
                    .iter()
                    .map(|s| s.member_id.clone())
                    .collect()
            });
            let draft = ExpenseDraft::new(
                original.kind,
                cmd.payer_id.as_deref().unwrap_or(&original.payer_id),
                &participants,
                cmd.amount_minor.unwrap_or(original.amount_minor),
                cmd.title.as_deref().unwrap_or(&original.title),
                cmd.category.as_deref().or(original.category.as_deref()),
                cmd.note.as_deref().or(original.note.as_deref()),
                cmd.occurred_at.unwrap_or(original.occurred_at),
            )?;
            self.require_members(&db_tx, &group_id, &draft.member_ids())
                .await?;

            let mut ledger = self.load_ledger(&db_tx, &group_id).await?;
            self.reverse_locked(&db_tx, &mut ledger, &original, Some(draft.id))
                .await?;
            let (expense, total) = self
                .record_locked(&db_tx, &group_id, &mut ledger, draft)
                .await?;
            let affected = self.persist_ledger(&db_tx, &ledger).await?;

            Ok::<_, EngineError>(LedgerOutcome {
                group_id: group_id.clone(),
                expense_id: expense.id,
                affected_balances: affected,
                group_total_minor: total,
            })
        })?;

        tracing::info!(
            "amended expense {} into {} in group {group_id}",
            cmd.expense_id,
            outcome.expense_id
        );
        self.notify(&group_id, &outcome.affected_balances, outcome.group_total_minor);
        Ok(outcome)
    }

    /// Returns one expense with its participants.
    pub async fn expense(&self, expense_id: Uuid) -> ResultEngine<Expense> {
        self.load_expense(&self.database, expense_id).await
    }

    /// Lists a group's expenses in creation order (oldest first).
    pub async fn list_expenses(
        &self,
        group_id: &str,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<Vec<Expense>> {
        validate_list_filter(filter)?;
        self.require_group(&self.database, group_id).await?;
        let rows = Self::filtered(group_id, filter)
            .order_by_asc(expenses::Column::Seq)
            .all(&self.database)
            .await?;
        self.attach_participants(&self.database, rows).await
    }

    /// Lists a group's expenses newest first, with cursor-based pagination.
    pub async fn list_expenses_page(
        &self,
        group_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<(Vec<Expense>, Option<String>)> {
        validate_list_filter(filter)?;
        self.require_group(&self.database, group_id).await?;

        let limit_plus_one = limit.saturating_add(1);
        let mut query = Self::filtered(group_id, filter);
        if let Some(cursor) = cursor {
            let cursor = ExpensesCursor::decode(cursor)?;
            query = query.filter(expenses::Column::Seq.lt(cursor.seq));
        }
        let mut rows = query
            .order_by_desc(expenses::Column::Seq)
            .limit(limit_plus_one)
            .all(&self.database)
            .await?;

        let next_cursor = if rows.len() as u64 > limit {
            rows.truncate(limit as usize);
            match rows.last() {
                Some(last) => Some(ExpensesCursor { seq: last.seq }.encode()?),
                None => None,
            }
        } else {
            None
        };

        let items = self.attach_participants(&self.database, rows).await?;
        Ok((items, next_cursor))
    }

    fn filtered(group_id: &str, filter: &ExpenseListFilter) -> Select<expenses::Entity> {
        let mut query = expenses::Entity::find().filter(expenses::Column::GroupId.eq(group_id));
        if !filter.include_reversed {
            query = query.filter(expenses::Column::ReversedAt.is_null());
        }
        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            query = query.filter(expenses::Column::Kind.is_in(kinds));
        }
        query
    }

    pub(super) async fn attach_participants(
        &self,
        db: &impl ConnectionTrait,
        rows: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut by_expense: HashMap<String, Vec<expense_participants::Model>> = HashMap::new();
        for part in expense_participants::Entity::find()
            .filter(expense_participants::Column::ExpenseId.is_in(ids))
            .all(db)
            .await?
        {
            by_expense
                .entry(part.expense_id.clone())
                .or_default()
                .push(part);
        }

        rows.into_iter()
            .map(|row| {
                let parts = by_expense.remove(&row.id).unwrap_or_default();
                Expense::try_from((row, parts))
            })
            .collect()
    }

    pub(crate) async fn load_expense(
        &self,
        db: &impl ConnectionTrait,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        let parts = expense_participants::Entity::find()
            .filter(expense_participants::Column::ExpenseId.eq(expense_id.to_string()))
            .all(db)
            .await?;
        Expense::try_from((model, parts))
    }

    /// The group of an expense never changes, so it can be read before the
    /// group lock is taken.
    async fn expense_group_id(&self, expense_id: Uuid) -> ResultEngine<String> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .one(&self.database)
            .await?
            .map(|m| m.group_id)
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    async fn next_seq(&self, db_tx: &DatabaseTransaction, group_id: &str) -> ResultEngine<i64> {
        let last = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id))
            .order_by_desc(expenses::Column::Seq)
            .one(db_tx)
            .await?;
        Ok(last.map_or(1, |m| m.seq + 1))
    }

    /// Stores the event, folds its debts into `ledger` and bumps the total.
    /// Callers hold the group lock.
    async fn record_locked(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
        ledger: &mut Ledger,
        draft: ExpenseDraft,
    ) -> ResultEngine<(Expense, i64)> {
        let expense = Expense {
            id: draft.id,
            group_id: group_id.to_string(),
            seq: self.next_seq(db_tx, group_id).await?,
            kind: draft.kind,
            payer_id: draft.payer_id,
            amount_minor: draft.amount_minor,
            title: draft.title,
            category: draft.category,
            note: draft.note,
            occurred_at: draft.occurred_at,
            created_at: Utc::now(),
            reversed_at: None,
            amended_by: None,
            participants: draft.shares,
        };

        expenses::ActiveModel::from(&expense).insert(db_tx).await?;
        expense_participants::Entity::insert_many(expense_participants::active_models(
            expense.id,
            &expense.participants,
        ))
        .exec(db_tx)
        .await?;

        ledger.apply_all(&expense.deltas())?;

        let total = if expense.kind.counts_toward_total() {
            self.increment_total(db_tx, group_id, expense.amount_minor)
                .await?
        } else {
            self.require_group(db_tx, group_id).await?.total_expense_minor
        };
        Ok((expense, total))
    }

    /// Marks the event reversed, folds the inverse debts into `ledger` and
    /// decrements the total. Callers hold the group lock.
    ///
    /// Every member the inverse debts touch must still belong to the group:
    /// a debt written for someone who left could never be settled.
    async fn reverse_locked(
        &self,
        db_tx: &DatabaseTransaction,
        ledger: &mut Ledger,
        expense: &Expense,
        amended_by: Option<Uuid>,
    ) -> ResultEngine<i64> {
        let inverse: Vec<Delta> = expense.deltas().iter().map(Delta::reversed).collect();
        let touched: Vec<&str> = inverse
            .iter()
            .flat_map(|d| [d.debtor_id.as_str(), d.creditor_id.as_str()])
            .collect();
        if !touched.is_empty() {
            self.require_members(db_tx, &expense.group_id, &touched)
                .await?;
        }
        ledger.apply_all(&inverse)?;

        let active = expenses::ActiveModel {
            id: ActiveValue::Set(expense.id.to_string()),
            reversed_at: ActiveValue::Set(Some(Utc::now())),
            amended_by: ActiveValue::Set(amended_by.map(|id| id.to_string())),
            ..Default::default()
        };
        active.update(db_tx).await?;

        if expense.kind.counts_toward_total() {
            self.decrement_total(db_tx, &expense.group_id, expense.amount_minor)
                .await
        } else {
            Ok(self
                .require_group(db_tx, &expense.group_id)
                .await?
                .total_expense_minor)
        }
    }
}
