//! Interrupt-line tables.
//!
//! Interrupt assignments layer exactly like regions: a later layer may move
//! a named peripheral to a new line or add new peripherals, but two distinct
//! peripherals may never end up on the same line. Collisions are errors, not
//! last-write-wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MapError, Result};

/// Number of interrupt lines assumed when a board does not say otherwise.
pub const DEFAULT_INTERRUPT_LINES: u32 = 32;

/// A named set of interrupt assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptLayer {
    /// Layer name, used in diagnostics.
    pub name: String,
    /// Peripheral name to interrupt line.
    #[serde(default)]
    pub lines: BTreeMap<String, u32>,
}

impl InterruptLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: BTreeMap::new(),
        }
    }

    /// Assign `peripheral` to `line` in this layer.
    pub fn assign(mut self, peripheral: impl Into<String>, line: u32) -> Self {
        self.lines.insert(peripheral.into(), line);
        self
    }
}

/// A validated interrupt table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptTable {
    limit: u32,
    lines: BTreeMap<String, u32>,
}

impl InterruptTable {
    /// An empty table for a controller with `limit` lines.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            lines: BTreeMap::new(),
        }
    }

    /// Fold `layers` into a table, in order.
    pub fn compose<'a>(limit: u32, layers: impl IntoIterator<Item = &'a InterruptLayer>) -> Result<Self> {
        let mut table = Self::new(limit);
        for layer in layers {
            table.apply(layer)?;
        }
        Ok(table)
    }

    /// Apply one layer. Names in the layer are released first, so a layer may
    /// swap or shuffle its own peripherals freely.
    pub fn apply(&mut self, layer: &InterruptLayer) -> Result<()> {
        for name in layer.lines.keys() {
            self.lines.remove(name);
        }
        for (name, &line) in &layer.lines {
            if line >= self.limit {
                return Err(MapError::InterruptOutOfRange {
                    name: name.clone(),
                    line,
                    limit: self.limit,
                });
            }
            if let Some(existing) = self.name_of(line) {
                return Err(MapError::InterruptCollision {
                    line,
                    existing: existing.to_string(),
                    incoming: name.clone(),
                });
            }
            debug!(layer = %layer.name, peripheral = %name, line, "assigned interrupt");
            self.lines.insert(name.clone(), line);
        }
        Ok(())
    }

    /// Line assigned to `peripheral`.
    pub fn line(&self, peripheral: &str) -> Option<u32> {
        self.lines.get(peripheral).copied()
    }

    /// Peripheral holding `line`.
    pub fn name_of(&self, line: u32) -> Option<&str> {
        self.lines
            .iter()
            .find(|(_, &l)| l == line)
            .map(|(name, _)| name.as_str())
    }

    /// Assignments ordered by line number.
    pub fn by_line(&self) -> Vec<(u32, &str)> {
        let mut out: Vec<(u32, &str)> = self.lines.iter().map(|(n, &l)| (l, n.as_str())).collect();
        out.sort();
        out
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
