//! Group Aggregate: the running total of a group's expenses.
//!
//! Purely additive. It is derived from the event log, never from balances.

use sea_orm::{ActiveValue, DatabaseTransaction, prelude::*};

use crate::{EngineError, ResultEngine, groups};

use super::Engine;

impl Engine {
    /// Adds `amount_minor` to the group total and returns the new total.
    pub(crate) async fn increment_total(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
        amount_minor: i64,
    ) -> ResultEngine<i64> {
        let group = self.require_group(db_tx, group_id).await?;
        let total = group
            .total_expense_minor
            .checked_add(amount_minor)
            .ok_or_else(|| EngineError::InvalidAmount("group total overflow".to_string()))?;
        self.store_total(db_tx, group_id, total).await
    }

    /// Subtracts `amount_minor` from the group total and returns the new total.
    ///
    /// Going below zero means a reversal was misapplied; it fails with
    /// [`EngineError::AggregateUnderflow`] instead of clamping.
    pub(crate) async fn decrement_total(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
        amount_minor: i64,
    ) -> ResultEngine<i64> {
        let group = self.require_group(db_tx, group_id).await?;
        let total = group.total_expense_minor - amount_minor;
        if total < 0 {
            tracing::error!(
                "group {group_id} total {} cannot drop by {amount_minor}",
                group.total_expense_minor
            );
            return Err(EngineError::AggregateUnderflow(format!(
                "group {group_id} total {} is smaller than {amount_minor}",
                group.total_expense_minor
            )));
        }
        self.store_total(db_tx, group_id, total).await
    }

    pub(crate) async fn store_total(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
        total: i64,
    ) -> ResultEngine<i64> {
        let active = groups::ActiveModel {
            id: ActiveValue::Set(group_id.to_string()),
            total_expense_minor: ActiveValue::Set(total),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(total)
    }
}
