//! Build slot definitions and the validated slot table.
//!
//! A slot is a named position in a build ("cpu", "motherboard", ...) that
//! holds at most one part. Slots may declare a single upstream slot they
//! depend on; the table guarantees those edges form an acyclic graph so the
//! configurator can walk them without guarding against loops.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use thiserror::Error;

/// Identifier of a build slot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for SlotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlotId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<StandardSlot> for SlotId {
    fn from(slot: StandardSlot) -> Self {
        Self::new(slot.id())
    }
}

/// The storefront's fixed build sequence, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StandardSlot {
    Cpu,
    Motherboard,
    Ram,
    Gpu,
    Storage,
    Psu,
    Case,
}

impl StandardSlot {
    /// Slot id; also used as the catalog category
    pub const fn id(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Motherboard => "motherboard",
            Self::Ram => "ram",
            Self::Gpu => "gpu",
            Self::Storage => "storage",
            Self::Psu => "psu",
            Self::Case => "case",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Cpu => "Processor (CPU)",
            Self::Motherboard => "Motherboard",
            Self::Ram => "Memory (RAM)",
            Self::Gpu => "Graphics Card",
            Self::Storage => "Storage",
            Self::Psu => "Power Supply",
            Self::Case => "PC Case",
        }
    }

    /// The motherboard socket must match the CPU; nothing else is constrained.
    pub const fn depends_on(self) -> Option<Self> {
        match self {
            Self::Motherboard => Some(Self::Cpu),
            _ => None,
        }
    }

    pub fn definition(self) -> SlotDefinition {
        SlotDefinition {
            id: self.into(),
            title: self.title().to_string(),
            category: self.id().to_string(),
            depends_on: self.depends_on().map(SlotId::from),
        }
    }

    pub fn standard_definitions() -> Vec<SlotDefinition> {
        Self::iter().map(Self::definition).collect()
    }
}

/// Static description of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub id: SlotId,
    pub title: String,
    /// Catalog category queried for candidates
    pub category: String,
    /// Upstream slot whose compatibility key constrains this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<SlotId>,
}

impl SlotDefinition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: SlotId::new(id),
            title: title.into(),
            category: category.into(),
            depends_on: None,
        }
    }

    pub fn depending_on(mut self, upstream: impl Into<String>) -> Self {
        self.depends_on = Some(SlotId::new(upstream));
        self
    }
}

/// Errors found while building a slot table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotTableError {
    #[error("Slot table must contain at least one slot")]
    Empty,

    #[error("Slot id cannot be empty")]
    EmptyId,

    #[error("Slot '{slot}' is defined more than once")]
    DuplicateSlot { slot: SlotId },

    #[error("Slot '{slot}' has no catalog category")]
    EmptyCategory { slot: SlotId },

    #[error("Slot '{slot}' depends on unknown slot '{depends_on}'")]
    UnknownDependency { slot: SlotId, depends_on: SlotId },

    #[error("Slot '{slot}' cannot depend on itself")]
    SelfDependency { slot: SlotId },

    #[error("Slot '{slot}' is part of a dependency cycle")]
    Cycle { slot: SlotId },
}

/// Ordered, validated set of slot definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SlotDefinition>", into = "Vec<SlotDefinition>")]
pub struct SlotTable {
    slots: Vec<SlotDefinition>,
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl SlotTable {
    /// Validate and wrap a list of slot definitions.
    ///
    /// # Errors
    ///
    /// Rejects empty tables, blank ids or categories, duplicate ids,
    /// dependencies on unknown slots, self-dependencies and cycles.
    pub fn new(slots: Vec<SlotDefinition>) -> Result<Self, SlotTableError> {
        if slots.is_empty() {
            return Err(SlotTableError::Empty);
        }

        let mut seen = HashSet::with_capacity(slots.len());
        for slot in &slots {
            if slot.id.as_str().trim().is_empty() {
                return Err(SlotTableError::EmptyId);
            }
            if slot.category.trim().is_empty() {
                return Err(SlotTableError::EmptyCategory {
                    slot: slot.id.clone(),
                });
            }
            if !seen.insert(slot.id.as_str()) {
                return Err(SlotTableError::DuplicateSlot {
                    slot: slot.id.clone(),
                });
            }
        }

        for slot in &slots {
            if let Some(upstream) = &slot.depends_on {
                if *upstream == slot.id {
                    return Err(SlotTableError::SelfDependency {
                        slot: slot.id.clone(),
                    });
                }
                if !seen.contains(upstream.as_str()) {
                    return Err(SlotTableError::UnknownDependency {
                        slot: slot.id.clone(),
                        depends_on: upstream.clone(),
                    });
                }
            }
        }

        let table = Self { slots };
        table.check_acyclic()?;
        Ok(table)
    }

    /// The storefront's seven-slot build: CPU, motherboard (depends on CPU),
    /// RAM, GPU, storage, PSU, case.
    pub fn standard() -> Self {
        Self {
            slots: StandardSlot::standard_definitions(),
        }
    }

    // Each slot has at most one upstream edge, so any walk longer than the
    // table must have looped.
    fn check_acyclic(&self) -> Result<(), SlotTableError> {
        for slot in &self.slots {
            let mut current = slot;
            let mut steps = 0;
            while let Some(upstream) = current
                .depends_on
                .as_ref()
                .and_then(|id| self.get(id.as_str()))
            {
                steps += 1;
                if upstream.id == slot.id || steps > self.slots.len() {
                    return Err(SlotTableError::Cycle {
                        slot: slot.id.clone(),
                    });
                }
                current = upstream;
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SlotDefinition> {
        self.slots.iter().find(|slot| slot.id.as_str() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlotDefinition> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots that declare `id` as their direct upstream dependency
    pub fn dependents_of<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a SlotDefinition> + 'a {
        self.slots
            .iter()
            .filter(move |slot| slot.depends_on.as_ref().is_some_and(|d| d.as_str() == id))
    }
}

impl TryFrom<Vec<SlotDefinition>> for SlotTable {
    type Error = SlotTableError;

    fn try_from(slots: Vec<SlotDefinition>) -> Result<Self, Self::Error> {
        Self::new(slots)
    }
}

impl From<SlotTable> for Vec<SlotDefinition> {
    fn from(table: SlotTable) -> Self {
        table.slots
    }
}

impl<'a> IntoIterator for &'a SlotTable {
    type Item = &'a SlotDefinition;
    type IntoIter = std::slice::Iter<'a, SlotDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}
