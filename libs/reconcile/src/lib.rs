//! Reconciliation diff primitives.
//!
//! This library provides the pure set/map diff helpers the sync loop is built
//! on. Key concepts:
//!
//! - **Keyed diff**: compare two keyed snapshots and partition the key space
//!   into added / removed / changed.
//! - **Set delta**: compare an actual and a desired unordered set and produce
//!   the minimal create/delete change set.
//!
//! # Invariants
//!
//! - Diffs are deterministic given the same inputs (keys come out in key
//!   order).
//! - `added`, `removed`, and `changed` are pairwise disjoint and cover
//!   exactly the keys that differ between the snapshots.
//! - Applying a set delta to the actual set yields exactly the desired set.

use std::collections::{BTreeMap, BTreeSet};

/// Partition of the key space produced by [`diff_keyed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDiff<K> {
    /// Keys present only in the next snapshot.
    pub added: Vec<K>,

    /// Keys present only in the previous snapshot.
    pub removed: Vec<K>,

    /// Keys present in both snapshots whose values differ.
    pub changed: Vec<K>,
}

impl<K> KeyedDiff<K> {
    /// True when the snapshots are value-identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff two keyed snapshots by full value equality.
pub fn diff_keyed<K, V>(prev: &BTreeMap<K, V>, next: &BTreeMap<K, V>) -> KeyedDiff<K>
where
    K: Ord + Clone,
    V: PartialEq,
{
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for (key, value) in next {
        match prev.get(key) {
            None => added.push(key.clone()),
            Some(old) if old != value => changed.push(key.clone()),
            Some(_) => {}
        }
    }

    for key in prev.keys() {
        if !next.contains_key(key) {
            removed.push(key.clone());
        }
    }

    KeyedDiff {
        added,
        removed,
        changed,
    }
}

/// Minimal change set produced by [`set_delta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDelta<T> {
    /// Elements desired but not present.
    pub to_create: Vec<T>,

    /// Elements present but no longer desired.
    pub to_delete: Vec<T>,
}

impl<T> SetDelta<T> {
    /// True when actual already matches desired.
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the minimal change set turning `actual` into `desired`.
pub fn set_delta<T>(actual: &BTreeSet<T>, desired: &BTreeSet<T>) -> SetDelta<T>
where
    T: Ord + Clone,
{
    SetDelta {
        to_create: desired.difference(actual).cloned().collect(),
        to_delete: actual.difference(desired).cloned().collect(),
    }
}
