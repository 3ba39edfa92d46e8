use std::collections::HashMap;

use serde::Serialize;

use crate::model::VarMeta;

/// Index of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

/// Index of a logical variable: one value shared by every variable unified
/// through promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotId(pub usize);

/// Index of a component in the flattened model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CompId(pub usize);

#[derive(Debug, Clone)]
pub struct Variable {
    /// Full dotted path from the root
    pub path: String,
    pub meta: VarMeta,
    pub component: CompId,
    pub slot: SlotId,
}

/// Where a slot's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Feed {
    /// Default or externally set
    External,
    /// Value holder of an `IndepVarComp`-style output
    Independent(VarId),
    /// Written by its component on every pass
    Computed(VarId),
    /// Copied from another slot after its producer runs
    Connected { from: SlotId, source: String },
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub members: Vec<VarId>,
    pub value: Option<f64>,
    pub feed: Feed,
    /// Slots fed from this one by explicit connections
    pub targets: Vec<SlotId>,
}

impl Slot {
    /// Whether `set` may write this slot.
    pub fn is_settable(&self) -> bool {
        matches!(self.feed, Feed::External | Feed::Independent(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NameEntry {
    pub slot: SlotId,
    /// The name covers at least one parameter
    pub has_param: bool,
    /// The name covers at least one output
    pub has_output: bool,
}

/// All variables of a set-up model, addressed by path or by handle.
///
/// Every full variable path and every promoted name (prefixed with its
/// group's path) is resolved once during setup.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) vars: Vec<Variable>,
    pub(crate) slots: Vec<Slot>,
    pub(crate) names: HashMap<String, NameEntry>,
}

impl Registry {
    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Resolve a path to its slot.
    pub fn lookup(&self, path: &str) -> Option<SlotId> {
        self.names.get(path).map(|e| e.slot)
    }

    pub(crate) fn entry(&self, path: &str) -> Option<NameEntry> {
        self.names.get(path).copied()
    }

    pub fn value(&self, slot: SlotId) -> Option<f64> {
        self.slots[slot.0].value
    }

    /// Write a slot and forward the value along its connections.
    pub(crate) fn write(&mut self, slot: SlotId, value: f64) {
        self.slots[slot.0].value = Some(value);
        for i in 0..self.slots[slot.0].targets.len() {
            let target = self.slots[slot.0].targets[i];
            self.slots[target.0].value = Some(value);
        }
    }

    /// Display name of a slot: the path of its first member.
    pub fn label(&self, slot: SlotId) -> &str {
        let first = self.slots[slot.0].members[0];
        &self.vars[first.0].path
    }

    /// Full paths of every variable sharing a slot.
    pub fn aliases(&self, slot: SlotId) -> Vec<&str> {
        self.slots[slot.0]
            .members
            .iter()
            .map(|v| self.vars[v.0].path.as_str())
            .collect()
    }
}
