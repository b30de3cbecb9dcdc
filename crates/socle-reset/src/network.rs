//! Per-domain reset network.
//!
//! Every gated domain gets its own [`PowerOnResetSequencer`], clocked by that
//! domain alone. Sequencers share no state; the only ordering between domains
//! comes from derivation edges, along which reset propagates downward.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResetError, Result};
use crate::graph::ClockDomainGraph;
use crate::sequencer::{PorState, PowerOnResetSequencer, POR_SETTLE_CYCLES};

/// Static description of how one domain comes out of reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DomainReset {
    pub domain: String,
    /// Whether a sequencer gates this domain.
    pub gated: bool,
    /// Gated parent whose reset also holds this domain. Reset does not
    /// propagate through reset-less domains, so a gated domain below one
    /// has no holder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_by: Option<String>,
    pub frequency_hz: Option<u64>,
    /// Settle cycles after synchronization (0 for reset-less domains).
    pub settle_cycles: u64,
    pub sync_stages: usize,
    /// Settle window in nanoseconds, when the frequency is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_ns: Option<u64>,
}

impl DomainReset {
    pub fn settle_time(&self) -> Option<Duration> {
        self.settle_ns.map(Duration::from_nanos)
    }
}

/// Reset sequencing for every domain of a graph, in topological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPlan {
    pub domains: Vec<DomainReset>,
}

impl ResetPlan {
    pub fn domain(&self, name: &str) -> Option<&DomainReset> {
        self.domains.iter().find(|d| d.domain == name)
    }
}

/// Live sequencers for every gated domain of a graph.
#[derive(Debug, Clone)]
pub struct ResetNetwork {
    graph: ClockDomainGraph,
    sequencers: BTreeMap<String, PowerOnResetSequencer>,
    sync_stages: usize,
}

impl ResetNetwork {
    /// Attach a freshly powered-up sequencer to every gated domain.
    pub fn power_up(graph: &ClockDomainGraph, sync_stages: usize) -> Result<Self> {
        let mut sequencers = BTreeMap::new();
        for domain in graph.gated() {
            debug!(domain = %domain.name, sync_stages, "attached power-on reset sequencer");
            sequencers.insert(domain.name.clone(), PowerOnResetSequencer::power_up(sync_stages)?);
        }
        Ok(Self {
            graph: graph.clone(),
            sequencers,
            sync_stages,
        })
    }

    /// One edge of `domain`'s clock.
    pub fn tick(&mut self, domain: &str, request: bool) -> Result<()> {
        if self.graph.domain(domain).is_none() {
            return Err(ResetError::UnknownDomain { name: domain.into() });
        }
        if let Some(seq) = self.sequencers.get_mut(domain) {
            seq.tick(request);
        }
        Ok(())
    }

    /// One edge of every domain's clock.
    pub fn tick_all(&mut self, request: bool) {
        for seq in self.sequencers.values_mut() {
            seq.tick(request);
        }
    }

    /// Assert an external reset request on every gated domain.
    pub fn request_reset(&mut self) {
        for seq in self.sequencers.values_mut() {
            seq.request_reset();
        }
    }

    /// Whether `domain` is held in reset by its own sequencer or any gated ancestor.
    pub fn in_reset(&self, domain: &str) -> Result<bool> {
        let mut current = self
            .graph
            .domain(domain)
            .ok_or_else(|| ResetError::UnknownDomain { name: domain.into() })?;
        loop {
            if current.reset_less {
                return Ok(false);
            }
            if self.sequencers.get(&current.name).is_some_and(|s| s.asserted()) {
                return Ok(true);
            }
            match current.parent().and_then(|p| self.graph.domain(p)) {
                Some(parent) => current = parent,
                None => return Ok(false),
            }
        }
    }

    /// State of `domain`'s own sequencer; `None` for reset-less domains.
    pub fn state(&self, domain: &str) -> Option<PorState> {
        self.sequencers.get(domain).map(|s| s.state())
    }

    /// Whether every gated domain has been released.
    pub fn all_released(&self) -> bool {
        self.sequencers.values().all(|s| !s.asserted())
    }

    /// Static plan for the graph this network was built from.
    pub fn plan(&self) -> ResetPlan {
        let settle_cycles = u64::from(POR_SETTLE_CYCLES);
        let domains = self
            .graph
            .topological()
            .map(|d| {
                let frequency_hz = self.graph.frequency_hz(&d.name);
                let gated = d.is_gated();
                let held_by = if gated { self.gated_ancestor(&d.name) } else { None };
                DomainReset {
                    domain: d.name.clone(),
                    gated,
                    held_by,
                    frequency_hz,
                    settle_cycles: if gated { settle_cycles } else { 0 },
                    sync_stages: if gated { self.sync_stages } else { 0 },
                    settle_ns: match (gated, frequency_hz) {
                        (true, Some(hz)) => (settle_cycles * 1_000_000_000).checked_div(hz),
                        _ => None,
                    },
                }
            })
            .collect();
        ResetPlan { domains }
    }

    /// Parent held in reset alongside `name`, matching [`Self::in_reset`].
    fn gated_ancestor(&self, name: &str) -> Option<String> {
        let parent = self.graph.domain(name)?.parent().and_then(|p| self.graph.domain(p))?;
        parent.is_gated().then(|| parent.name.clone())
    }
}
