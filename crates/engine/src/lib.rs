//! Group debt ledger.
//!
//! The engine keeps, for every group, the minimal set of pairwise debts
//! implied by the group's expense events: at most one directed edge per pair
//! of members, netted on every mutation. See [`netting`] for the algorithm
//! and [`Engine`] for the operations.

pub use balances::{Balance, BalanceChange};
pub use commands::{AmendExpenseCmd, CreateGroupCmd, ExpenseMeta, RecordExpenseCmd, SettleCmd};
pub use error::EngineError;
pub use expenses::{Expense, ExpenseKind};
pub use groups::{DEFAULT_GROUP_CATEGORY, Group};
pub use locks::GroupGuard;
pub use members::{Member, MemberProfile, MemberRegistry};
pub use money::MoneyCents;
pub use netting::{Delta, Ledger, Share, split_shares};
pub use notify::{BroadcastSink, LedgerNotification, NotificationSink};
pub use ops::{
    BalanceView, DEFAULT_LOCK_TIMEOUT, Engine, EngineBuilder, ExpenseListFilter, LedgerOutcome,
    LedgerReport,
};

mod balances;
mod commands;
mod error;
mod expense_participants;
mod expenses;
mod groups;
mod locks;
mod members;
mod money;
pub mod netting;
mod notify;
mod ops;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
