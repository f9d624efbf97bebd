//! Inventory store: item name → stock status.
//!
//! Keys are normalized (trimmed, lowercased). Unknown items are absent; the
//! store never holds a "null" status. The store is process-memory only and is
//! shared between conversations as `Arc<InventoryStore>`. The internal lock
//! keeps the map consistent but gives no transactional guarantees across
//! concurrent conversations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Relative stock level of a pantry item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "BAJO", alias = "LOW")]
    Low,
    #[serde(rename = "MEDIO", alias = "MEDIUM")]
    Medium,
    #[serde(rename = "ALTO", alias = "HIGH")]
    High,
}

impl StockStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::Low => "BAJO",
            StockStatus::Medium => "MEDIO",
            StockStatus::High => "ALTO",
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid stock status '{0}' (expected BAJO, MEDIO or ALTO)")]
pub struct InvalidStatus(pub String);

impl FromStr for StockStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BAJO" | "LOW" => Ok(StockStatus::Low),
            "MEDIO" | "MEDIUM" => Ok(StockStatus::Medium),
            "ALTO" | "HIGH" => Ok(StockStatus::High),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

/// What happened to the items a description refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Items were acquired
    In,
    /// Items ran out or were consumed
    Out,
    /// A correction to an intermediate level
    Update,
}

impl OperationKind {
    /// The status an affected item ends up with.
    pub fn target_status(&self) -> StockStatus {
        match self {
            OperationKind::In => StockStatus::High,
            OperationKind::Out => StockStatus::Low,
            OperationKind::Update => StockStatus::Medium,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::In => "IN",
            OperationKind::Out => "OUT",
            OperationKind::Update => "UPDATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid operation kind '{0}' (expected IN, OUT or UPDATE)")]
pub struct InvalidOperationKind(pub String);

impl FromStr for OperationKind {
    type Err = InvalidOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IN" | "ENTRADA" => Ok(OperationKind::In),
            "OUT" | "SALIDA" => Ok(OperationKind::Out),
            "UPDATE" | "ACTUALIZACION" | "ACTUALIZACIÓN" => Ok(OperationKind::Update),
            _ => Err(InvalidOperationKind(s.to_string())),
        }
    }
}

/// One item whose status was set by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub item: String,
    pub previous: StockStatus,
    pub current: StockStatus,
}

/// Normalize an item name into a store key.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory pantry inventory.
#[derive(Debug, Default)]
pub struct InventoryStore {
    items: RwLock<BTreeMap<String, StockStatus>>,
}

impl InventoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given items.
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, StockStatus)>,
        S: AsRef<str>,
    {
        let map = items
            .into_iter()
            .map(|(name, status)| (normalize_key(name.as_ref()), status))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self {
            items: RwLock::new(map),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StockStatus>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StockStatus>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Exact lookup by (normalized) name.
    pub fn get(&self, name: &str) -> Option<StockStatus> {
        self.read().get(&normalize_key(name)).copied()
    }

    /// All items, ordered by name.
    pub fn snapshot(&self) -> Vec<(String, StockStatus)> {
        self.read().iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// All keys, ordered.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Items whose key contains `filter` (case-insensitive).
    pub fn matching(&self, filter: &str) -> Vec<(String, StockStatus)> {
        let needle = normalize_key(filter);
        self.read()
            .iter()
            .filter(|(k, _)| k.contains(&needle))
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Items currently at `status`, ordered by name.
    pub fn with_status(&self, status: StockStatus) -> Vec<String> {
        self.read()
            .iter()
            .filter(|(_, v)| **v == status)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Apply an operation described in free text.
    ///
    /// Every existing key that occurs as a substring of the (lowercased)
    /// description is affected and set to `kind.target_status()`. No key is
    /// ever created. The match is deliberately loose: a key that happens to
    /// be part of an unrelated word ("pan" in "panela") is affected too.
    pub fn apply(&self, description: &str, kind: OperationKind) -> Vec<StatusChange> {
        let haystack = description.to_lowercase();
        let target = kind.target_status();
        let mut items = self.write();
        items
            .iter_mut()
            .filter(|(k, _)| haystack.contains(k.as_str()))
            .map(|(k, v)| {
                let previous = std::mem::replace(v, target);
                StatusChange {
                    item: k.clone(),
                    previous,
                    current: target,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
