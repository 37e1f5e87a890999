//! Enumeration types for the fishery simulation.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// A fixed position within one simulated step.
///
/// Phases execute in declaration order every step. Each phase also decides
/// how its members are ordered: randomized phases are reshuffled every step
/// so no fisher is systematically first to a scarce resource, while the
/// remaining phases run in stable registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Start-of-step bookkeeping.
    Dawn,
    /// Fisher decisions: trips, landings, trade intents.
    FisherPhase,
    /// Biology growth and movement.
    BiologyPhase,
    /// Regulation updates, quota resets and order-book clearing.
    PolicyUpdate,
    /// Daily data collection.
    DailyDataGathering,
    /// Yearly data collection.
    YearlyDataGathering,
    /// Aggregate (population-wide) data collection.
    AggregateDataGathering,
    /// Counter resets after data has been gathered.
    DataReset,
    /// Anything that must observe fully-gathered data.
    AfterData,
}

impl Phase {
    /// Every phase, in dispatch order.
    pub const ALL: [Self; 9] = [
        Self::Dawn,
        Self::FisherPhase,
        Self::BiologyPhase,
        Self::PolicyUpdate,
        Self::DailyDataGathering,
        Self::YearlyDataGathering,
        Self::AggregateDataGathering,
        Self::DataReset,
        Self::AfterData,
    ];

    /// Whether members of this phase are shuffled afresh every step.
    pub const fn is_randomized(self) -> bool {
        matches!(
            self,
            Self::FisherPhase | Self::BiologyPhase | Self::PolicyUpdate | Self::AfterData
        )
    }

    /// Stable upper-case name used in log output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dawn => "DAWN",
            Self::FisherPhase => "FISHER_PHASE",
            Self::BiologyPhase => "BIOLOGY_PHASE",
            Self::PolicyUpdate => "POLICY_UPDATE",
            Self::DailyDataGathering => "DAILY_DATA_GATHERING",
            Self::YearlyDataGathering => "YEARLY_DATA_GATHERING",
            Self::AggregateDataGathering => "AGGREGATE_DATA_GATHERING",
            Self::DataReset => "DATA_RESET",
            Self::AfterData => "AFTER_DATA",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// Coarse cadence used by components that are configured rather than coded
/// against a specific period (counters, resets, collectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPolicy {
    /// Every simulation step.
    EveryStep,
    /// Every simulated day.
    EveryDay,
    /// Every 30 days. Not calendar-accurate.
    EveryMonth,
    /// Every 365-day simulated year.
    EveryYear,
}

// ---------------------------------------------------------------------------
// Regulation
// ---------------------------------------------------------------------------

/// The regulatory regime a scenario runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationKind {
    /// No catch limits at all.
    #[default]
    Anarchy,
    /// One pool shared by every fisher, constraining all landings.
    MonoTac,
    /// One pool per fisher, each holding the full yearly quota.
    MonoIq,
    /// Per-species pools shared by every fisher (total allowable catch).
    Tac,
    /// Per-species pools per fisher, the aggregate divided evenly each year.
    Iq,
    /// Like [`RegulationKind::Iq`], with quota tradable on order books.
    Itq,
}

impl RegulationKind {
    /// Whether regulations of this kind map species to separate pools.
    pub const fn is_multi_species(self) -> bool {
        matches!(self, Self::Tac | Self::Iq | Self::Itq)
    }
}

/// Which side of an order book a trade intent rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    /// The fisher wants to sell one or more lots of quota.
    Offer,
    /// The fisher wants to buy one or more lots of quota.
    Request,
}

/// How the clearing price of a matched lot is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// Halfway between the offer and request prices.
    #[default]
    Midpoint,
    /// The offer (ask) price.
    Ask,
    /// The request (bid) price.
    Bid,
}
