//! Instrument keys and venue registration
//!
//! A position bucket is identified by the canonical string triple
//! `venue:instrument_class:symbol`. Every delta the engine emits is keyed by
//! one of these, so parsing and formatting must round-trip exactly.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StrataError};

/// Class of a position bucket within a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentClass {
    /// Plain spot balance of a token
    BaseToken,
    /// Yield-bearing wrapper: liquid-staking token or lending-pool aToken
    #[serde(rename = "LST/aToken")]
    YieldToken,
    /// Open perpetual-futures position
    PerpPosition,
    /// Outstanding borrow against a lending pool
    DebtPosition,
}

impl InstrumentClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BaseToken => "BaseToken",
            Self::YieldToken => "LST/aToken",
            Self::PerpPosition => "PerpPosition",
            Self::DebtPosition => "DebtPosition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BaseToken" => Some(Self::BaseToken),
            "LST/aToken" => Some(Self::YieldToken),
            "PerpPosition" => Some(Self::PerpPosition),
            "DebtPosition" => Some(Self::DebtPosition),
            _ => None,
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `venue:instrument_class:symbol` identifier for one position
/// bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentKey {
    pub venue: String,
    pub class: InstrumentClass,
    pub symbol: String,
}

impl InstrumentKey {
    pub fn new(
        venue: impl Into<String>,
        class: InstrumentClass,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            venue: venue.into(),
            class,
            symbol: symbol.into(),
        }
    }

    /// Spot balance bucket shorthand.
    pub fn base(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::new(venue, InstrumentClass::BaseToken, symbol)
    }

    /// Check the venue against the registry.
    pub fn validate(&self, venues: &VenueRegistry) -> Result<()> {
        if !venues.is_registered(&self.venue) {
            return Err(StrataError::UnregisteredVenue(self.venue.clone()));
        }
        Ok(())
    }
}

// Display is the wire format; serde and logs both go through it.
impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.venue, self.class, self.symbol)
    }
}

impl FromStr for InstrumentKey {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, ':');
        let venue = parts.next().unwrap_or_default();
        let rest = parts
            .next()
            .ok_or_else(|| StrataError::MalformedInstrumentKey(s.to_string()))?;
        // The class label may itself contain '/', never ':'; the symbol is the
        // final segment.
        let (class_str, symbol) = rest
            .rsplit_once(':')
            .ok_or_else(|| StrataError::MalformedInstrumentKey(s.to_string()))?;
        if venue.is_empty() || symbol.is_empty() || symbol.contains(':') {
            return Err(StrataError::MalformedInstrumentKey(s.to_string()));
        }
        let class = InstrumentClass::parse(class_str)
            .ok_or_else(|| StrataError::MalformedInstrumentKey(s.to_string()))?;
        Ok(Self::new(venue, class, symbol))
    }
}

impl Serialize for InstrumentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InstrumentKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Kind of venue, used for trade invariants (CEX executions carry a price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Cex,
    Defi,
}

/// Registered venue identifiers for this run.
#[derive(Debug, Clone, Default)]
pub struct VenueRegistry {
    venues: HashMap<String, VenueKind>,
}

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, venue: impl Into<String>, kind: VenueKind) {
        self.venues.insert(venue.into(), kind);
    }

    pub fn is_registered(&self, venue: &str) -> bool {
        self.venues.contains_key(venue)
    }

    pub fn kind_of(&self, venue: &str) -> Option<VenueKind> {
        self.venues.get(venue).copied()
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}

/// The instrument keys a strategy is allowed to reference.
///
/// Strategies validate every key they will ever touch against this set at
/// construction time; a miss is a fatal configuration error.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    keys: HashSet<InstrumentKey>,
}

impl AllowList {
    pub fn new(keys: impl IntoIterator<Item = InstrumentKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &InstrumentKey) -> bool {
        self.keys.contains(key)
    }

    /// Fail-fast check used by strategy constructors.
    pub fn ensure_all<'a>(
        &self,
        strategy_id: &str,
        keys: impl IntoIterator<Item = &'a InstrumentKey>,
    ) -> Result<()> {
        for key in keys {
            if !self.keys.contains(key) {
                return Err(StrataError::MissingInstrument {
                    strategy_id: strategy_id.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_label_roundtrip() {
        let classes = [
            InstrumentClass::BaseToken,
            InstrumentClass::YieldToken,
            InstrumentClass::PerpPosition,
            InstrumentClass::DebtPosition,
        ];
        for c in classes {
            assert_eq!(InstrumentClass::parse(c.as_str()), Some(c));
        }
        assert!(InstrumentClass::parse("SpotToken").is_none());
    }

    #[test]
    fn test_key_display_parse_roundtrip() {
        let key = InstrumentKey::new("aave", InstrumentClass::YieldToken, "aUSDC");
        let text = key.to_string();
        assert_eq!(text, "aave:LST/aToken:aUSDC");
        let parsed: InstrumentKey = text.parse().expect("should parse");
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for bad in ["", "binance", "binance:BaseToken", ":BaseToken:BTC", "binance:Nope:BTC"] {
            assert!(bad.parse::<InstrumentKey>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = InstrumentKey::base("binance", "BTC");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"binance:BaseToken:BTC\"");
        let back: InstrumentKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_venue_registry() {
        let mut venues = VenueRegistry::new();
        venues.register("binance", VenueKind::Cex);
        venues.register("aave", VenueKind::Defi);

        assert!(venues.is_registered("binance"));
        assert_eq!(venues.kind_of("aave"), Some(VenueKind::Defi));
        assert!(!venues.is_registered("ftx"));

        let key = InstrumentKey::base("binance", "BTC");
        assert!(key.validate(&venues).is_ok());
        let bad = InstrumentKey::base("ftx", "BTC");
        assert!(bad.validate(&venues).is_err());
    }

    #[test]
    fn test_allow_list_ensure_all() {
        let allowed = AllowList::new([
            InstrumentKey::base("binance", "BTC"),
            InstrumentKey::base("binance", "USDT"),
        ]);
        let ok = [InstrumentKey::base("binance", "BTC")];
        assert!(allowed.ensure_all("s1", ok.iter()).is_ok());

        let missing = [InstrumentKey::base("binance", "ETH")];
        let err = allowed.ensure_all("s1", missing.iter()).unwrap_err();
        assert!(matches!(err, StrataError::MissingInstrument { .. }));
    }
}
