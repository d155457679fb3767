use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    Balance, EngineError, Ledger, MemberProfile, MemberRegistry, ResultEngine, expenses,
};

use super::{Engine, with_tx};

/// A balance with both ends resolved to display metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub debtor: MemberProfile,
    pub creditor: MemberProfile,
    pub amount_minor: i64,
}

/// Stored state of a group compared with a replay of its event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub group_id: String,
    pub stored: Vec<(String, String, i64)>,
    pub replayed: Vec<(String, String, i64)>,
    pub stored_total_minor: i64,
    pub replayed_total_minor: i64,
}

impl LedgerReport {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed && self.stored_total_minor == self.replayed_total_minor
    }
}

impl Engine {
    /// All non-zero edges of a group, ordered by `(debtor, creditor)`.
    pub async fn group_balances(&self, group_id: &str) -> ResultEngine<Vec<Balance>> {
        self.require_group(&self.database, group_id).await?;
        let mut balances = self.load_balances(&self.database, group_id).await?;
        balances.sort_by(|a, b| {
            (&a.debtor_id, &a.creditor_id).cmp(&(&b.debtor_id, &b.creditor_id))
        });
        Ok(balances)
    }

    /// Edges where `member_id` is debtor or creditor.
    pub async fn member_balances(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> ResultEngine<Vec<Balance>> {
        Ok(self
            .group_balances(group_id)
            .await?
            .into_iter()
            .filter(|b| b.touches(member_id))
            .collect())
    }

    /// What the group owes `member_id` minus what the member owes.
    pub async fn net_position(&self, group_id: &str, member_id: &str) -> ResultEngine<i64> {
        Ok(self
            .group_balances(group_id)
            .await?
            .iter()
            .map(|b| b.signed_for(member_id))
            .sum())
    }

    /// Group balances with display metadata from `registry`. Ids the
    /// registry cannot resolve are shown as-is.
    pub async fn describe_balances<R: MemberRegistry>(
        &self,
        registry: &R,
        group_id: &str,
    ) -> ResultEngine<Vec<BalanceView>> {
        let balances = self.group_balances(group_id).await?;
        let mut out = Vec::with_capacity(balances.len());
        for balance in balances {
            let debtor = resolve_or_id(registry, group_id, &balance.debtor_id).await?;
            let creditor = resolve_or_id(registry, group_id, &balance.creditor_id).await?;
            out.push(BalanceView {
                debtor,
                creditor,
                amount_minor: balance.amount_minor,
            });
        }
        Ok(out)
    }

    /// Rebuilds the edges from scratch by folding every live event of the
    /// group, oldest first.
    pub async fn replay_balances(&self, group_id: &str) -> ResultEngine<Vec<Balance>> {
        self.require_group(&self.database, group_id).await?;
        let (ledger, _) = self.replay(&self.database, group_id).await?;
        Ok(ledger.balances())
    }

    /// Compares stored edges and total with a replay, under the group lock.
    pub async fn verify_group(&self, group_id: &str) -> ResultEngine<LedgerReport> {
        let _guard = self.lock_group(group_id).await?;
        let group = self.require_group(&self.database, group_id).await?;
        let stored = self.load_ledger_snapshot(group_id).await?;
        let (replayed, replayed_total) = self.replay(&self.database, group_id).await?;

        let report = LedgerReport {
            group_id: group_id.to_string(),
            stored: stored.pairs(),
            replayed: replayed.pairs(),
            stored_total_minor: group.total_expense_minor,
            replayed_total_minor: replayed_total,
        };
        if !report.is_consistent() {
            tracing::warn!("group {group_id} ledger differs from its event log");
        }
        Ok(report)
    }

    /// Overwrites stored edges and total with a replay of the event log.
    pub async fn rebuild_group(&self, group_id: &str) -> ResultEngine<LedgerReport> {
        let _guard = self.lock_group(group_id).await?;
        let (report, affected) = with_tx!(self, |db_tx| {
            let group = self.require_group(&db_tx, group_id).await?;
            let mut ledger = self.load_ledger(&db_tx, group_id).await?;
            let (replayed, replayed_total) = self.replay(&db_tx, group_id).await?;

            let report = LedgerReport {
                group_id: group_id.to_string(),
                stored: ledger.pairs(),
                replayed: replayed.pairs(),
                stored_total_minor: group.total_expense_minor,
                replayed_total_minor: replayed_total,
            };

            ledger.reconcile_to(&replayed)?;
            let affected = self.persist_ledger(&db_tx, &ledger).await?;
            self.store_total(&db_tx, group_id, replayed_total).await?;
            Ok::<_, EngineError>((report, affected))
        })?;

        tracing::info!(
            "rebuilt group {group_id}: {} balance change(s)",
            affected.len()
        );
        if !affected.is_empty() || report.stored_total_minor != report.replayed_total_minor {
            self.notify(group_id, &affected, report.replayed_total_minor);
        }
        Ok(report)
    }

    async fn load_ledger_snapshot(&self, group_id: &str) -> ResultEngine<Ledger> {
        let balances = self.load_balances(&self.database, group_id).await?;
        Ledger::from_balances(group_id, balances)
    }

    /// Folds live events in `seq` order and sums the ones that count toward
    /// the total.
    async fn replay(
        &self,
        db: &impl ConnectionTrait,
        group_id: &str,
    ) -> ResultEngine<(Ledger, i64)> {
        let rows = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id))
            .filter(expenses::Column::ReversedAt.is_null())
            .order_by_asc(expenses::Column::Seq)
            .all(db)
            .await?;

        let mut ledger = Ledger::new(group_id);
        let mut total: i64 = 0;
        for expense in self.attach_participants(db, rows).await? {
            ledger.apply_all(&expense.deltas())?;
            if expense.kind.counts_toward_total() {
                total = total
                    .checked_add(expense.amount_minor)
                    .ok_or_else(|| EngineError::InvalidAmount("group total overflow".to_string()))?;
            }
        }
        Ok((ledger, total))
    }
}

async fn resolve_or_id<R: MemberRegistry>(
    registry: &R,
    group_id: &str,
    member_id: &str,
) -> ResultEngine<MemberProfile> {
    Ok(registry
        .resolve_member(group_id, member_id)
        .await?
        .unwrap_or_else(|| MemberProfile::new(member_id, member_id, None)))
}
