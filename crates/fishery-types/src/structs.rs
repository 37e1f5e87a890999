//! Shared value types: sale ceilings and the species roster.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::SpeciesId;

// ---------------------------------------------------------------------------
// Ceiling
// ---------------------------------------------------------------------------

/// An upper bound on a quantity that may also be absent.
///
/// Regulations answer "how much may this fisher sell?" with a `Ceiling`.
/// `Unbounded` is the answer for anything unconstrained: Anarchy, or a
/// species missing from a multi-species quota map. It is a
/// different value from `Limited(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ceiling {
    /// No limit applies.
    Unbounded,
    /// At most this much (never negative).
    Limited(Decimal),
}

impl Ceiling {
    /// Build a limited ceiling, flooring negative values at zero.
    pub fn limited(amount: Decimal) -> Self {
        Self::Limited(amount.max(Decimal::ZERO))
    }

    /// Clamp a requested quantity to this ceiling.
    ///
    /// Non-positive requests always clamp to zero.
    pub fn clamp(self, requested: Decimal) -> Decimal {
        if requested <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self {
            Self::Unbounded => requested,
            Self::Limited(limit) => requested.min(limit),
        }
    }

    /// The numeric limit, if any.
    pub const fn limit(self) -> Option<Decimal> {
        match self {
            Self::Unbounded => None,
            Self::Limited(limit) => Some(limit),
        }
    }

    /// Whether the ceiling allows nothing at all.
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Limited(limit) if limit <= Decimal::ZERO)
    }
}

impl core::fmt::Display for Ceiling {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Limited(limit) => write!(f, "{limit}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

/// One species of fish tracked by the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    /// Stable index; equal to the species' position in its [`SpeciesList`].
    pub id: SpeciesId,
    /// Human-readable name as written in the scenario.
    pub name: String,
}

/// The ordered roster of species in a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesList {
    species: Vec<Species>,
}

impl SpeciesList {
    /// Build a roster from names; indices follow the given order.
    ///
    /// Returns `None` if there are more names than a [`SpeciesId`] can index.
    pub fn from_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut species = Vec::new();
        for (index, name) in names.into_iter().enumerate() {
            let id = SpeciesId::new(u16::try_from(index).ok()?);
            species.push(Species {
                id,
                name: name.into(),
            });
        }
        Some(Self { species })
    }

    /// Look a species up by name, ignoring case and surrounding whitespace.
    pub fn find_by_name(&self, name: &str) -> Option<&Species> {
        let wanted = name.trim();
        self.species
            .iter()
            .find(|s| s.name.trim().eq_ignore_ascii_case(wanted))
    }

    /// Look a species up by index.
    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(usize::from(id.into_inner()))
    }

    /// Iterate species in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    /// Iterate species indices in order.
    pub fn ids(&self) -> impl Iterator<Item = SpeciesId> + '_ {
        self.species.iter().map(|s| s.id)
    }

    /// Number of species.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn clamp_limits_requests() {
        assert_eq!(Ceiling::Limited(dec(100)).clamp(dec(150)), dec(100));
        assert_eq!(Ceiling::Limited(dec(100)).clamp(dec(40)), dec(40));
        assert_eq!(Ceiling::Unbounded.clamp(dec(1_000_000)), dec(1_000_000));
    }

    #[test]
    fn non_positive_requests_clamp_to_zero() {
        assert_eq!(Ceiling::Unbounded.clamp(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(Ceiling::Limited(dec(5)).clamp(dec(-3)), Decimal::ZERO);
    }

    #[test]
    fn unbounded_is_not_zero() {
        assert_ne!(Ceiling::Unbounded, Ceiling::Limited(Decimal::ZERO));
        assert!(Ceiling::Limited(Decimal::ZERO).is_exhausted());
        assert!(!Ceiling::Unbounded.is_exhausted());
    }

    #[test]
    fn limited_floors_negatives() {
        assert_eq!(Ceiling::limited(dec(-1)), Ceiling::Limited(Decimal::ZERO));
    }

    #[test]
    fn species_lookup_is_case_insensitive_and_trimmed() {
        let list = SpeciesList::from_names(["Sablefish", "Yelloweye Rockfish"]).unwrap_or_default();
        assert_eq!(list.len(), 2);
        let found = list.find_by_name("  yelloweye rockfish ");
        assert_eq!(found.map(|s| s.id), Some(SpeciesId::new(1)));
        assert!(list.find_by_name("dover sole").is_none());
        assert_eq!(
            list.get(SpeciesId::new(0)).map(|s| s.name.as_str()),
            Some("Sablefish")
        );
    }
}
