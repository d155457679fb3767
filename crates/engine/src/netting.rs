//! Share computation and debt netting.
//!
//! This module is pure: it works on an in-memory snapshot of a group's edges
//! and never touches storage. The engine loads the snapshot under the group
//! lock, applies every delta of an operation here, then persists
//! [`Ledger::changes`] in the same DB transaction.
//!
//! ## Rounding
//!
//! Amounts are integer cents. An amount split among `n` participants gives
//! everyone `amount / n`, and the last participant in recorded order also
//! takes the remainder `amount % n`. The shares always sum to the amount.
//!
//! ```rust
//! use engine::split_shares;
//!
//! let shares = split_shares(100, &["a".into(), "b".into(), "c".into()]).unwrap();
//! let cents: Vec<i64> = shares.iter().map(|s| s.amount_minor).collect();
//! assert_eq!(cents, vec![33, 33, 34]);
//! ```
//!
//! ## Netting
//!
//! A delta "D owes C X" is folded into the edges so that a pair never has
//! two opposing edges:
//! - an existing `D→C` grows by `X`;
//! - otherwise an existing `C→D` of amount `R` shrinks by `X` (`R > X`), is
//!   removed (`R == X`), or is replaced by `D→C` of `X - R` (`R < X`);
//! - otherwise `D→C` is created with `X`.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap, HashSet},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Balance, BalanceChange, EngineError, ResultEngine};

/// The part of an expense charged to one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub member_id: String,
    pub amount_minor: i64,
}

/// "`debtor_id` owes `creditor_id` `amount_minor` more than before".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub debtor_id: String,
    pub creditor_id: String,
    pub amount_minor: i64,
}

impl Delta {
    /// The delta that cancels this one.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            debtor_id: self.creditor_id.clone(),
            creditor_id: self.debtor_id.clone(),
            amount_minor: self.amount_minor,
        }
    }
}

/// Splits `amount_minor` among `participants` (already deduplicated, in
/// recorded order). The last participant absorbs the remainder.
pub fn split_shares(amount_minor: i64, participants: &[String]) -> ResultEngine<Vec<Share>> {
    if amount_minor <= 0 {
        return Err(EngineError::InvalidEvent(
            "amount_minor must be > 0".to_string(),
        ));
    }
    if participants.is_empty() {
        return Err(EngineError::InvalidEvent(
            "participants must not be empty".to_string(),
        ));
    }

    let n = participants.len() as i64;
    let base = amount_minor / n;
    let remainder = amount_minor % n;
    let last = participants.len() - 1;

    Ok(participants
        .iter()
        .enumerate()
        .map(|(idx, member_id)| Share {
            member_id: member_id.clone(),
            amount_minor: if idx == last { base + remainder } else { base },
        })
        .collect())
}

/// Debts implied by a payment: every participant other than the payer owes
/// the payer their share. Zero shares produce no debt.
pub(crate) fn debts_for(payer_id: &str, shares: &[Share]) -> Vec<Delta> {
    shares
        .iter()
        .filter(|s| s.member_id != payer_id && s.amount_minor > 0)
        .map(|s| Delta {
            debtor_id: s.member_id.clone(),
            creditor_id: payer_id.to_string(),
            amount_minor: s.amount_minor,
        })
        .collect()
}

type PairKey = (String, String);

/// In-memory edge set of one group.
#[derive(Clone, Debug)]
pub struct Ledger {
    group_id: String,
    edges: BTreeMap<PairKey, Balance>,
    original: HashMap<Uuid, Balance>,
}

impl Ledger {
    /// An empty ledger, the starting point of a replay.
    pub fn new(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            edges: BTreeMap::new(),
            original: HashMap::new(),
        }
    }

    /// Loads a snapshot of stored edges. Rejects snapshots that already
    /// violate the edge invariants.
    pub fn from_balances(group_id: &str, balances: Vec<Balance>) -> ResultEngine<Self> {
        let mut ledger = Self::new(group_id);
        for balance in balances {
            if balance.amount_minor <= 0 || balance.debtor_id == balance.creditor_id {
                return Err(EngineError::InvalidAmount(format!(
                    "corrupted balance {}: invalid edge",
                    balance.id
                )));
            }
            let key = (balance.debtor_id.clone(), balance.creditor_id.clone());
            let reverse = (balance.creditor_id.clone(), balance.debtor_id.clone());
            if ledger.edges.contains_key(&key) || ledger.edges.contains_key(&reverse) {
                return Err(EngineError::InvalidAmount(format!(
                    "corrupted balance {}: more than one edge for the pair",
                    balance.id
                )));
            }
            ledger.original.insert(balance.id, balance.clone());
            ledger.edges.insert(key, balance);
        }
        Ok(ledger)
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Folds one delta into the edge set.
    pub fn apply(&mut self, delta: &Delta) -> ResultEngine<()> {
        let amount = delta.amount_minor;
        if amount <= 0 {
            return Err(EngineError::InvalidEvent(
                "delta amount must be > 0".to_string(),
            ));
        }
        if delta.debtor_id == delta.creditor_id {
            return Err(EngineError::InvalidEvent(
                "debtor and creditor must differ".to_string(),
            ));
        }

        let forward = (delta.debtor_id.clone(), delta.creditor_id.clone());
        if let Some(edge) = self.edges.get_mut(&forward) {
            edge.amount_minor = edge
                .amount_minor
                .checked_add(amount)
                .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
            return Ok(());
        }

        let reverse = (delta.creditor_id.clone(), delta.debtor_id.clone());
        if let Some(reverse_amount) = self.edges.get(&reverse).map(|e| e.amount_minor) {
            match reverse_amount.cmp(&amount) {
                Ordering::Greater => {
                    if let Some(edge) = self.edges.get_mut(&reverse) {
                        edge.amount_minor = reverse_amount - amount;
                    }
                }
                Ordering::Equal => {
                    self.edges.remove(&reverse);
                }
                Ordering::Less => {
                    self.edges.remove(&reverse);
                    self.insert_edge(forward, amount - reverse_amount);
                }
            }
            return Ok(());
        }

        self.insert_edge(forward, amount);
        Ok(())
    }

    pub fn apply_all<'a>(&mut self, deltas: impl IntoIterator<Item = &'a Delta>) -> ResultEngine<()> {
        for delta in deltas {
            self.apply(delta)?;
        }
        Ok(())
    }

    /// Applies the deltas that turn this edge set into `target`'s, so that
    /// [`Ledger::changes`] reports the difference against the snapshot.
    pub fn reconcile_to(&mut self, target: &Ledger) -> ResultEngine<()> {
        // Signed debt of the smaller id toward the larger one, per pair.
        let mut diff: BTreeMap<PairKey, i64> = BTreeMap::new();
        let mut add = |b: &Balance, factor: i64| {
            let (key, signed) = if b.debtor_id < b.creditor_id {
                ((b.debtor_id.clone(), b.creditor_id.clone()), b.amount_minor)
            } else {
                ((b.creditor_id.clone(), b.debtor_id.clone()), -b.amount_minor)
            };
            *diff.entry(key).or_insert(0) += factor * signed;
        };
        for edge in target.edges.values() {
            add(edge, 1);
        }
        for edge in self.edges.values() {
            add(edge, -1);
        }

        for ((low, high), amount) in diff {
            let delta = match amount.cmp(&0) {
                Ordering::Greater => Delta {
                    debtor_id: low,
                    creditor_id: high,
                    amount_minor: amount,
                },
                Ordering::Less => Delta {
                    debtor_id: high,
                    creditor_id: low,
                    amount_minor: -amount,
                },
                Ordering::Equal => continue,
            };
            self.apply(&delta)?;
        }
        Ok(())
    }

    fn insert_edge(&mut self, key: PairKey, amount_minor: i64) {
        // A pair that was in the snapshot keeps its row.
        let balance = match self
            .original
            .values()
            .find(|b| b.debtor_id == key.0 && b.creditor_id == key.1)
        {
            Some(prev) => Balance {
                amount_minor,
                ..prev.clone()
            },
            None => Balance::new(&self.group_id, &key.0, &key.1, amount_minor),
        };
        self.edges.insert(key, balance);
    }

    /// Current edges ordered by `(debtor, creditor)`.
    pub fn balances(&self) -> Vec<Balance> {
        self.edges.values().cloned().collect()
    }

    /// Current edges as comparable `(debtor, creditor, amount)` triples.
    pub fn pairs(&self) -> Vec<(String, String, i64)> {
        self.edges
            .values()
            .map(|b| (b.debtor_id.clone(), b.creditor_id.clone(), b.amount_minor))
            .collect()
    }

    /// Signed position of `member_id`: owed to the member minus owed by it.
    pub fn net_position(&self, member_id: &str) -> i64 {
        self.edges.values().map(|b| b.signed_for(member_id)).sum()
    }

    /// Edge mutations relative to the loaded snapshot.
    pub fn changes(&self) -> Vec<BalanceChange> {
        let mut out = Vec::new();
        let mut live: HashSet<Uuid> = HashSet::with_capacity(self.edges.len());

        for edge in self.edges.values() {
            live.insert(edge.id);
            match self.original.get(&edge.id) {
                None => out.push(BalanceChange::Created {
                    balance: edge.clone(),
                }),
                Some(prev) if prev.amount_minor != edge.amount_minor => {
                    out.push(BalanceChange::Updated {
                        balance: edge.clone(),
                        previous_amount_minor: prev.amount_minor,
                    });
                }
                Some(_) => {}
            }
        }

        let mut removed: Vec<&Balance> = self
            .original
            .values()
            .filter(|b| !live.contains(&b.id))
            .collect();
        removed.sort_by(|a, b| (&a.debtor_id, &a.creditor_id).cmp(&(&b.debtor_id, &b.creditor_id)));
        out.extend(removed.into_iter().map(|b| BalanceChange::Deleted { balance: b.clone() }));

        out.sort_by(|a, b| {
            let (a, b) = (a.balance(), b.balance());
            (&a.debtor_id, &a.creditor_id).cmp(&(&b.debtor_id, &b.creditor_id))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn delta(debtor: &str, creditor: &str, amount: i64) -> Delta {
        Delta {
            debtor_id: debtor.to_string(),
            creditor_id: creditor.to_string(),
            amount_minor: amount,
        }
    }

    fn pair(debtor: &str, creditor: &str, amount: i64) -> (String, String, i64) {
        (debtor.to_string(), creditor.to_string(), amount)
    }

    fn expense_deltas(payer: &str, amount: i64, participants: &[&str]) -> Vec<Delta> {
        let shares = split_shares(amount, &ids(participants)).unwrap();
        debts_for(payer, &shares)
    }

    #[test]
    fn split_even_amount() {
        let shares = split_shares(9000, &ids(&["a", "b", "c"])).unwrap();
        assert!(shares.iter().all(|s| s.amount_minor == 3000));
    }

    #[test]
    fn split_last_participant_absorbs_remainder() {
        let shares = split_shares(1001, &ids(&["a", "b", "c", "d"])).unwrap();
        let cents: Vec<i64> = shares.iter().map(|s| s.amount_minor).collect();
        assert_eq!(cents, vec![250, 250, 250, 251]);
        assert_eq!(cents.iter().sum::<i64>(), 1001);
    }

    #[test]
    fn split_rejects_invalid_input() {
        assert!(matches!(
            split_shares(0, &ids(&["a"])),
            Err(EngineError::InvalidEvent(_))
        ));
        assert!(matches!(
            split_shares(-5, &ids(&["a"])),
            Err(EngineError::InvalidEvent(_))
        ));
        assert!(matches!(
            split_shares(100, &[]),
            Err(EngineError::InvalidEvent(_))
        ));
    }

    #[test]
    fn payer_share_is_excluded_from_debts() {
        let deltas = expense_deltas("a", 9000, &["a", "b", "c"]);
        assert_eq!(deltas, vec![delta("b", "a", 3000), delta("c", "a", 3000)]);
    }

    #[test]
    fn payer_outside_split_is_owed_every_share() {
        let deltas = expense_deltas("a", 1000, &["b", "c"]);
        assert_eq!(deltas, vec![delta("b", "a", 500), delta("c", "a", 500)]);
    }

    #[test]
    fn tiny_amount_skips_zero_shares() {
        // 0, 0, 1: only the last participant owes anything.
        let deltas = expense_deltas("a", 1, &["b", "c", "d"]);
        assert_eq!(deltas, vec![delta("d", "a", 1)]);
    }

    #[test]
    fn same_direction_accumulates() {
        let mut ledger = Ledger::new("g");
        ledger.apply(&delta("b", "a", 3000)).unwrap();
        ledger.apply(&delta("b", "a", 1500)).unwrap();
        assert_eq!(ledger.pairs(), vec![pair("b", "a", 4500)]);
    }

    #[test]
    fn opposing_delta_shrinks_reverse_edge() {
        let mut ledger = Ledger::new("g");
        ledger
            .apply_all(&expense_deltas("a", 9000, &["a", "b", "c"]))
            .unwrap();
        assert_eq!(
            ledger.pairs(),
            vec![pair("b", "a", 3000), pair("c", "a", 3000)]
        );

        // B pays 30 split among A and B: A owes B 15.
        ledger
            .apply_all(&expense_deltas("b", 3000, &["a", "b"]))
            .unwrap();
        assert_eq!(
            ledger.pairs(),
            vec![pair("b", "a", 1500), pair("c", "a", 3000)]
        );
    }

    #[test]
    fn equal_opposing_delta_deletes_edge() {
        let mut ledger = Ledger::new("g");
        ledger.apply(&delta("b", "a", 1000)).unwrap();
        ledger.apply(&delta("a", "b", 1000)).unwrap();
        assert!(ledger.pairs().is_empty());
    }

    #[test]
    fn crossover_replaces_edge_with_difference() {
        let mut ledger = Ledger::from_balances("g", vec![Balance::new("g", "b", "a", 1000)]).unwrap();
        ledger.apply(&delta("a", "b", 2500)).unwrap();
        assert_eq!(ledger.pairs(), vec![pair("a", "b", 1500)]);

        let changes = ledger.changes();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().any(|c| matches!(
            c,
            BalanceChange::Created { balance } if balance.debtor_id == "a" && balance.amount_minor == 1500
        )));
        assert!(changes.iter().any(|c| matches!(
            c,
            BalanceChange::Deleted { balance } if balance.debtor_id == "b" && balance.amount_minor == 1000
        )));
    }

    #[test]
    fn reversal_restores_snapshot() {
        let mut ledger = Ledger::new("g");
        ledger
            .apply_all(&expense_deltas("a", 9000, &["a", "b", "c"]))
            .unwrap();
        let before = ledger.pairs();

        let event = expense_deltas("b", 3000, &["a", "b"]);
        ledger.apply_all(&event).unwrap();
        let undo: Vec<Delta> = event.iter().map(Delta::reversed).collect();
        ledger.apply_all(&undo).unwrap();

        assert_eq!(ledger.pairs(), before);
    }

    #[test]
    fn net_amounts_do_not_depend_on_order() {
        let e1 = expense_deltas("a", 9000, &["a", "b", "c"]);
        let e2 = expense_deltas("b", 12000, &["a", "b", "c", "d"]);
        let e3 = expense_deltas("c", 777, &["a", "d"]);

        let mut forward = Ledger::new("g");
        forward.apply_all(e1.iter().chain(&e2).chain(&e3)).unwrap();
        let mut backward = Ledger::new("g");
        backward.apply_all(e3.iter().chain(&e2).chain(&e1)).unwrap();

        assert_eq!(forward.pairs(), backward.pairs());
    }

    #[test]
    fn ledger_is_zero_sum_with_single_edge_per_pair() {
        let mut ledger = Ledger::new("g");
        ledger
            .apply_all(
                expense_deltas("a", 10001, &["a", "b", "c"])
                    .iter()
                    .chain(&expense_deltas("b", 4999, &["c", "a"]))
                    .chain(&expense_deltas("c", 333, &["a", "b", "c"])),
            )
            .unwrap();

        let members = ["a", "b", "c"];
        let total: i64 = members.iter().map(|m| ledger.net_position(m)).sum();
        assert_eq!(total, 0);

        let pairs = ledger.pairs();
        for (d, c, amount) in &pairs {
            assert!(*amount > 0);
            assert!(!pairs.iter().any(|(d2, c2, _)| d2 == c && c2 == d));
        }
    }

    #[test]
    fn snapshot_with_opposing_edges_is_rejected() {
        let result = Ledger::from_balances(
            "g",
            vec![Balance::new("g", "a", "b", 10), Balance::new("g", "b", "a", 5)],
        );
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn changes_report_updates_against_snapshot() {
        let stored = Balance::new("g", "b", "a", 3000);
        let mut ledger = Ledger::from_balances("g", vec![stored.clone()]).unwrap();
        ledger.apply(&delta("a", "b", 1500)).unwrap();

        let changes = ledger.changes();
        assert_eq!(
            changes,
            vec![BalanceChange::Updated {
                balance: Balance {
                    amount_minor: 1500,
                    ..stored
                },
                previous_amount_minor: 3000,
            }]
        );
    }

    #[test]
    fn reconcile_moves_stored_edges_to_target() {
        let mut stored = Ledger::from_balances(
            "g",
            vec![Balance::new("g", "b", "a", 999), Balance::new("g", "c", "b", 10)],
        )
        .unwrap();
        let mut target = Ledger::new("g");
        target
            .apply_all(&expense_deltas("a", 9000, &["a", "b", "c"]))
            .unwrap();

        stored.reconcile_to(&target).unwrap();
        assert_eq!(stored.pairs(), target.pairs());
        assert_eq!(stored.changes().len(), 3);
    }

    #[test]
    fn recreated_pair_keeps_its_row() {
        let stored = Balance::new("g", "b", "a", 3000);
        let mut ledger = Ledger::from_balances("g", vec![stored.clone()]).unwrap();
        ledger.apply(&delta("a", "b", 3000)).unwrap();
        ledger.apply(&delta("b", "a", 4500)).unwrap();

        assert_eq!(
            ledger.changes(),
            vec![BalanceChange::Updated {
                balance: Balance {
                    amount_minor: 4500,
                    ..stored
                },
                previous_amount_minor: 3000,
            }]
        );
    }

    #[test]
    fn invalid_deltas_are_rejected() {
        let mut ledger = Ledger::new("g");
        assert!(ledger.apply(&delta("a", "a", 10)).is_err());
        assert!(ledger.apply(&delta("a", "b", 0)).is_err());
        assert!(ledger.pairs().is_empty());
    }
}
