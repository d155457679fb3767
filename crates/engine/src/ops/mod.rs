use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use sea_orm::{DatabaseConnection, DatabaseTransaction, QueryFilter, prelude::*};

use crate::{
    Balance, BalanceChange, EngineError, Ledger, LedgerNotification, NotificationSink,
    ResultEngine, locks::GroupLocks, members,
};

mod aggregate;
mod balances;
mod expenses;
mod groups;

pub use balances::{BalanceView, LedgerReport};
pub use expenses::{ExpenseListFilter, LedgerOutcome};

/// How long an operation waits for its group's lock by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = sea_orm::TransactionTrait::begin(&$self.database).await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    locks: GroupLocks,
    lock_timeout: Duration,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("lock_timeout", &self.lock_timeout)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Takes the group's lock for the duration of an operation.
    pub(crate) async fn lock_group(&self, group_id: &str) -> ResultEngine<crate::GroupGuard> {
        self.locks.acquire(group_id, self.lock_timeout).await
    }

    pub(crate) async fn require_group(
        &self,
        db: &impl ConnectionTrait,
        group_id: &str,
    ) -> ResultEngine<crate::groups::Model> {
        crate::groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    /// Checks that every id is a current member of the group.
    pub(crate) async fn require_members(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
        member_ids: &[&str],
    ) -> ResultEngine<()> {
        let wanted: HashSet<&str> = member_ids.iter().copied().collect();
        let found: HashSet<String> = members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id))
            .filter(members::Column::MemberId.is_in(wanted.iter().copied()))
            .all(db_tx)
            .await?
            .into_iter()
            .map(|m| m.member_id)
            .collect();

        let mut missing: Vec<&str> = wanted
            .into_iter()
            .filter(|id| !found.contains(*id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();
        Err(EngineError::InvalidEvent(format!(
            "not a member of the group: {}",
            missing.join(", ")
        )))
    }

    pub(crate) async fn load_balances(
        &self,
        db: &impl ConnectionTrait,
        group_id: &str,
    ) -> ResultEngine<Vec<Balance>> {
        crate::balances::Entity::find()
            .filter(crate::balances::Column::GroupId.eq(group_id))
            .all(db)
            .await?
            .into_iter()
            .map(Balance::try_from)
            .collect()
    }

    /// Loads the group's edges once; callers must hold the group lock.
    pub(crate) async fn load_ledger(
        &self,
        db_tx: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Ledger> {
        let balances = self.load_balances(db_tx, group_id).await?;
        Ledger::from_balances(group_id, balances)
    }

    /// Writes the ledger's edge mutations and returns them.
    pub(crate) async fn persist_ledger(
        &self,
        db_tx: &DatabaseTransaction,
        ledger: &Ledger,
    ) -> ResultEngine<Vec<BalanceChange>> {
        let changes = ledger.changes();
        for change in &changes {
            match change {
                BalanceChange::Created { balance } => {
                    crate::balances::ActiveModel::from(balance).insert(db_tx).await?;
                }
                BalanceChange::Updated { balance, .. } => {
                    crate::balances::ActiveModel::from(balance).update(db_tx).await?;
                }
                BalanceChange::Deleted { balance } => {
                    let res = crate::balances::Entity::delete_by_id(balance.id.to_string())
                        .exec(db_tx)
                        .await?;
                    if res.rows_affected != 1 {
                        return Err(EngineError::Database(DbErr::RecordNotUpdated));
                    }
                }
            }
        }
        Ok(changes)
    }

    /// Hands a committed change to the sink, if any.
    pub(crate) fn notify(&self, group_id: &str, affected: &[BalanceChange], total_minor: i64) {
        let Some(sink) = &self.sink else {
            return;
        };
        sink.notify(LedgerNotification {
            group_id: group_id.to_string(),
            affected_balances: affected.to_vec(),
            new_group_total_minor: total_minor,
        });
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    lock_timeout: Option<Duration>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// How long an operation may wait for its group's lock before failing
    /// with `GroupBusy`.
    pub fn lock_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Where committed ledger changes are reported.
    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> EngineBuilder {
        self.sink = Some(sink);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            locks: GroupLocks::default(),
            lock_timeout: self.lock_timeout.unwrap_or(DEFAULT_LOCK_TIMEOUT),
            sink: self.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;
    use crate::{CreateGroupCmd, ExpenseMeta, MemberProfile, RecordExpenseCmd};

    #[tokio::test]
    async fn busy_group_rejects_writes_without_side_effects() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder()
            .database(db)
            .lock_timeout(Duration::from_millis(20))
            .build()
            .await
            .unwrap();

        let group = engine
            .create_group(CreateGroupCmd::new(
                "Trip",
                MemberProfile::new("alice", "Alice", None),
            ))
            .await
            .unwrap();
        engine
            .add_member(&group.id, MemberProfile::new("bob", "Bob", None))
            .await
            .unwrap();

        let held = engine.lock_group(&group.id).await.unwrap();
        let err = engine
            .record_expense(RecordExpenseCmd::new(
                group.id.clone(),
                "alice",
                ["alice", "bob"],
                1000,
                ExpenseMeta::new("Dinner", Utc::now()),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::GroupBusy(group.id.clone()));
        assert!(err.is_retryable());

        // Other groups are not blocked.
        let other = engine
            .create_group(CreateGroupCmd::new(
                "Flat",
                MemberProfile::new("alice", "Alice", None),
            ))
            .await
            .unwrap();
        engine.verify_group(&other.id).await.unwrap();
        drop(held);

        assert!(engine.group_balances(&group.id).await.unwrap().is_empty());
        assert_eq!(engine.group(&group.id).await.unwrap().total_expense_minor, 0);
        assert!(
            engine
                .list_expenses(&group.id, &ExpenseListFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
