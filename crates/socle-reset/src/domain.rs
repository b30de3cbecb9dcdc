//! Clock domain declarations.
//!
//! Oscillators and PLL blocks are modelled symbolically: a domain records
//! where its clock comes from and the parameters of any derivation, never
//! the vendor primitive that realizes it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a derived clock is produced from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Derivation {
    /// Simple-feedback PLL: `f_out = f_ref * (divf + 1) / ((divr + 1) * 2^divq)`.
    Pll { divr: u32, divf: u32, divq: u32 },
    /// Integer clock divider.
    Divider { divisor: u32 },
}

impl Derivation {
    /// Output frequency for a reference of `reference_hz`, or `None` if the
    /// parameters do not produce a clock.
    pub fn output_hz(&self, reference_hz: u64) -> Option<u64> {
        let hz = match *self {
            Derivation::Pll { divr, divf, divq } => {
                let num = reference_hz.checked_mul(u64::from(divf) + 1)?;
                let den = (u64::from(divr) + 1).checked_shl(divq)?;
                num / den
            }
            Derivation::Divider { divisor } => reference_hz.checked_div(u64::from(divisor))?,
        };
        (hz > 0).then_some(hz)
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Pll { divr, divf, divq } => write!(f, "pll(divr={divr}, divf={divf}, divq={divq})"),
            Derivation::Divider { divisor } => write!(f, "divide-by-{divisor}"),
        }
    }
}

/// Where a domain's clock comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClockSource {
    /// A free-running on-board or on-die oscillator.
    #[serde(rename_all = "kebab-case")]
    PrimaryOscillator { frequency_hz: u64 },
    /// A clock supplied from outside the chip (a pin, a bus master).
    #[serde(rename_all = "kebab-case")]
    External {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frequency_hz: Option<u64>,
    },
    /// Produced from another domain's clock.
    Derived { from: String, derivation: Derivation },
}

/// A named clock domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockDomain {
    /// Domain name (e.g., "sys", "usb_48").
    pub name: String,
    /// Clock source.
    pub source: ClockSource,
    /// A reset-less domain has no sequencer and is assumed stable at power-up.
    #[serde(default)]
    pub reset_less: bool,
}

impl ClockDomain {
    /// A domain driven directly by an oscillator.
    pub fn primary(name: impl Into<String>, frequency_hz: u64) -> Self {
        Self {
            name: name.into(),
            source: ClockSource::PrimaryOscillator { frequency_hz },
            reset_less: false,
        }
    }

    /// A domain clocked from outside the chip.
    pub fn external(name: impl Into<String>, frequency_hz: Option<u64>) -> Self {
        Self {
            name: name.into(),
            source: ClockSource::External { frequency_hz },
            reset_less: false,
        }
    }

    /// A domain derived from `from`.
    pub fn derived(name: impl Into<String>, from: impl Into<String>, derivation: Derivation) -> Self {
        Self {
            name: name.into(),
            source: ClockSource::Derived {
                from: from.into(),
                derivation,
            },
            reset_less: false,
        }
    }

    /// Mark the domain reset-less.
    pub fn reset_less(mut self) -> Self {
        self.reset_less = true;
        self
    }

    /// Parent domain, for derived domains.
    pub fn parent(&self) -> Option<&str> {
        match &self.source {
            ClockSource::Derived { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Whether a power-on reset sequencer gates this domain.
    pub fn is_gated(&self) -> bool {
        !self.reset_less
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ice40_pll_48_to_16() {
        let pll = Derivation::Pll { divr: 2, divf: 63, divq: 6 };
        assert_eq!(pll.output_hz(48_000_000), Some(16_000_000));
    }

    #[test]
    fn ice40_pll_16_to_48() {
        let pll = Derivation::Pll { divr: 0, divf: 47, divq: 4 };
        assert_eq!(pll.output_hz(16_000_000), Some(48_000_000));
    }

    #[test]
    fn divider() {
        assert_eq!(Derivation::Divider { divisor: 4 }.output_hz(48_000_000), Some(12_000_000));
        assert_eq!(Derivation::Divider { divisor: 0 }.output_hz(48_000_000), None);
    }

    #[test]
    fn oversized_divq_is_rejected() {
        let pll = Derivation::Pll { divr: 0, divf: 0, divq: 80 };
        assert_eq!(pll.output_hz(48_000_000), None);
    }

    #[test]
    fn constructors() {
        let usb = ClockDomain::primary("usb_48", 48_000_000).reset_less();
        assert!(!usb.is_gated());
        let sys = ClockDomain::derived("sys", "usb_48", Derivation::Divider { divisor: 3 });
        assert_eq!(sys.parent(), Some("usb_48"));
        assert!(sys.is_gated());
    }

    #[test]
    fn serde_shape() {
        let sys = ClockDomain::derived("sys", "clk48", Derivation::Pll { divr: 2, divf: 63, divq: 6 });
        let json = serde_json::to_string(&sys).unwrap();
        assert!(json.contains("\"type\":\"derived\""));
        assert!(json.contains("\"kind\":\"pll\""));
        let back: ClockDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sys);

        let osc: ClockDomain =
            serde_json::from_str(r#"{"name":"clk48","source":{"type":"primary-oscillator","frequency-hz":48000000}}"#)
                .unwrap();
        assert_eq!(osc, ClockDomain::primary("clk48", 48_000_000));
    }
}
