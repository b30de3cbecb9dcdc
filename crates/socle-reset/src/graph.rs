//! Clock-domain DAG.
//!
//! Domains form a DAG whose edges run from a parent clock to every domain
//! derived from it. The same edges carry reset: a derived domain is held in
//! reset while its parent is. Roots are primary oscillators or external
//! clocks, and at least one primary oscillator must exist.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::Serialize;

use crate::domain::{ClockDomain, ClockSource};
use crate::error::{ResetError, Result};

/// A validated set of clock domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockDomainGraph {
    domains: Vec<ClockDomain>,
    /// Indices into `domains`, parents before children.
    #[serde(skip)]
    order: Vec<usize>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    frequencies: BTreeMap<String, Option<u64>>,
}

impl ClockDomainGraph {
    /// Validate `domains` and resolve their frequencies.
    pub fn new(domains: Vec<ClockDomain>) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, domain) in domains.iter().enumerate() {
            if index.insert(domain.name.clone(), i).is_some() {
                return Err(ResetError::DuplicateDomain {
                    name: domain.name.clone(),
                });
            }
        }

        if !domains
            .iter()
            .any(|d| matches!(d.source, ClockSource::PrimaryOscillator { .. }))
        {
            return Err(ResetError::NoPrimaryOscillator { count: domains.len() });
        }

        // Kahn's algorithm over parent -> child edges; seeds in declaration order.
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); domains.len()];
        let mut pending = vec![0usize; domains.len()];
        for (i, domain) in domains.iter().enumerate() {
            if let Some(parent) = domain.parent() {
                let &p = index.get(parent).ok_or_else(|| ResetError::UnknownDomain {
                    name: parent.to_string(),
                })?;
                children[p].push(i);
                pending[i] += 1;
            }
        }
        let mut queue: VecDeque<usize> = (0..domains.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(domains.len());
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &c in &children[i] {
                pending[c] -= 1;
                if pending[c] == 0 {
                    queue.push_back(c);
                }
            }
        }
        if let Some(stuck) = (0..domains.len()).find(|&i| pending[i] > 0) {
            return Err(ResetError::CyclicDerivation {
                name: domains[stuck].name.clone(),
            });
        }

        let mut frequencies: BTreeMap<String, Option<u64>> = BTreeMap::new();
        for &i in &order {
            let domain = &domains[i];
            let hz = match &domain.source {
                ClockSource::PrimaryOscillator { frequency_hz: 0 }
                | ClockSource::External { frequency_hz: Some(0) } => {
                    return Err(ResetError::ZeroFrequency {
                        name: domain.name.clone(),
                    });
                }
                ClockSource::PrimaryOscillator { frequency_hz } => Some(*frequency_hz),
                ClockSource::External { frequency_hz } => *frequency_hz,
                ClockSource::Derived { from, derivation } => match frequencies.get(from).copied().flatten() {
                    Some(reference) => Some(derivation.output_hz(reference).ok_or_else(|| {
                        ResetError::InvalidDerivation {
                            name: domain.name.clone(),
                            detail: format!("{derivation} of {reference} Hz produces no clock"),
                        }
                    })?),
                    None => None,
                },
            };
            frequencies.insert(domain.name.clone(), hz);
        }

        Ok(Self {
            domains,
            order,
            index,
            frequencies,
        })
    }

    /// Look up a domain by name.
    pub fn domain(&self, name: &str) -> Option<&ClockDomain> {
        self.index.get(name).map(|&i| &self.domains[i])
    }

    /// Domains in declaration order.
    pub fn domains(&self) -> &[ClockDomain] {
        &self.domains
    }

    /// Domains with every parent listed before its children.
    pub fn topological(&self) -> impl Iterator<Item = &ClockDomain> {
        self.order.iter().map(|&i| &self.domains[i])
    }

    /// Domains that get a power-on reset sequencer.
    pub fn gated(&self) -> impl Iterator<Item = &ClockDomain> {
        self.domains.iter().filter(|d| d.is_gated())
    }

    /// Domains derived directly from `name`.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ClockDomain> + 'a {
        self.domains.iter().filter(move |d| d.parent() == Some(name))
    }

    /// Resolved frequency, if the domain's clock chain has a known rate.
    pub fn frequency_hz(&self, name: &str) -> Option<u64> {
        self.frequencies.get(name).copied().flatten()
    }

    /// Merge extra domains in; existing names may not be redeclared.
    pub fn extend(&self, extra: impl IntoIterator<Item = ClockDomain>) -> Result<Self> {
        let mut domains = self.domains.clone();
        domains.extend(extra);
        Self::new(domains)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Derivation;

    fn fomu() -> Vec<ClockDomain> {
        vec![
            ClockDomain::primary("clk48", 48_000_000).reset_less(),
            ClockDomain::derived("sys", "clk48", Derivation::Pll { divr: 2, divf: 63, divq: 6 }),
            ClockDomain::derived("usb_48", "clk48", Derivation::Divider { divisor: 1 }).reset_less(),
        ]
    }

    #[test]
    fn resolves_frequencies() {
        let graph = ClockDomainGraph::new(fomu()).unwrap();
        assert_eq!(graph.frequency_hz("sys"), Some(16_000_000));
        assert_eq!(graph.frequency_hz("usb_48"), Some(48_000_000));
        assert_eq!(graph.gated().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["sys"]);
    }

    #[test]
    fn topological_order_parents_first() {
        let mut domains = fomu();
        domains.reverse();
        let graph = ClockDomainGraph::new(domains).unwrap();
        let order: Vec<&str> = graph.topological().map(|d| d.name.as_str()).collect();
        assert_eq!(order[0], "clk48");
    }

    #[test]
    fn duplicate_name() {
        let mut domains = fomu();
        domains.push(ClockDomain::primary("sys", 12_000_000));
        assert_eq!(
            ClockDomainGraph::new(domains).unwrap_err(),
            ResetError::DuplicateDomain { name: "sys".into() }
        );
    }

    #[test]
    fn unknown_parent() {
        let domains = vec![
            ClockDomain::primary("clk16", 16_000_000),
            ClockDomain::derived("usb_48", "clk12", Derivation::Divider { divisor: 1 }),
        ];
        assert_eq!(
            ClockDomainGraph::new(domains).unwrap_err(),
            ResetError::UnknownDomain { name: "clk12".into() }
        );
    }

    #[test]
    fn cycle_detected() {
        let domains = vec![
            ClockDomain::primary("osc", 12_000_000),
            ClockDomain::derived("a", "b", Derivation::Divider { divisor: 2 }),
            ClockDomain::derived("b", "a", Derivation::Divider { divisor: 2 }),
        ];
        assert!(matches!(
            ClockDomainGraph::new(domains),
            Err(ResetError::CyclicDerivation { .. })
        ));
    }

    #[test]
    fn needs_primary_oscillator() {
        let domains = vec![ClockDomain::external("usb_48", Some(48_000_000))];
        assert_eq!(
            ClockDomainGraph::new(domains).unwrap_err(),
            ResetError::NoPrimaryOscillator { count: 1 }
        );
    }

    #[test]
    fn external_without_rate_propagates_unknown() {
        let domains = vec![
            ClockDomain::primary("osc", 12_000_000),
            ClockDomain::external("jtag", None),
            ClockDomain::derived("jtag_half", "jtag", Derivation::Divider { divisor: 2 }),
        ];
        let graph = ClockDomainGraph::new(domains).unwrap();
        assert_eq!(graph.frequency_hz("jtag_half"), None);
    }

    #[test]
    fn invalid_pll() {
        let domains = vec![
            ClockDomain::primary("osc", 12_000_000),
            ClockDomain::derived("sys", "osc", Derivation::Divider { divisor: 0 }),
        ];
        assert!(matches!(
            ClockDomainGraph::new(domains),
            Err(ResetError::InvalidDerivation { ref name, .. }) if name == "sys"
        ));
    }

    #[test]
    fn zero_hz_sources_rejected() {
        let mut domains = fomu();
        domains.push(ClockDomain::primary("osc0", 0));
        assert_eq!(
            ClockDomainGraph::new(domains).unwrap_err(),
            ResetError::ZeroFrequency { name: "osc0".into() }
        );
        let domains = vec![
            ClockDomain::primary("osc", 12_000_000),
            ClockDomain::external("jtag", Some(0)),
        ];
        assert_eq!(
            ClockDomainGraph::new(domains).unwrap_err(),
            ResetError::ZeroFrequency { name: "jtag".into() }
        );
    }

    #[test]
    fn extend_adds_domains() {
        let graph = ClockDomainGraph::new(fomu()).unwrap();
        let graph = graph
            .extend([ClockDomain::derived("usb_12", "usb_48", Derivation::Divider { divisor: 4 })])
            .unwrap();
        assert_eq!(graph.frequency_hz("usb_12"), Some(12_000_000));
        assert_eq!(graph.children("usb_48").count(), 1);
        assert!(graph.extend([ClockDomain::primary("sys", 1)]).is_err());
    }
}
