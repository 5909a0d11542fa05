//! Strategy registry
//!
//! Mode-keyed registry of constructors. Resolution returns a proper
//! `Result`, so a construction failure can never be mistaken for a valid
//! strategy instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::StrategySettings;
use crate::domain::AllowList;
use crate::error::{Result, StrataError};
use crate::providers::RateSource;

use super::basis::LeveragedBasisStrategy;
use super::lending::PureLendingStrategy;
use super::staking::StakingOnlyStrategy;
use super::traits::StrategyImplementation;

/// Closed set of built-in strategy modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyMode {
    PureLending,
    StakingOnly,
    LeveragedBasis,
}

impl StrategyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PureLending => "pure_lending",
            Self::StakingOnly => "staking_only",
            Self::LeveragedBasis => "leveraged_basis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pure_lending" => Some(Self::PureLending),
            "staking_only" => Some(Self::StakingOnly),
            "leveraged_basis" => Some(Self::LeveragedBasis),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a strategy constructor may need.
#[derive(Clone)]
pub struct StrategyDeps {
    pub settings: StrategySettings,
    pub allow_list: AllowList,
    pub rates: Arc<dyn RateSource>,
}

type Constructor = fn(&StrategyDeps) -> Result<Box<dyn StrategyImplementation>>;

/// Registry of strategy constructors keyed by mode.
pub struct StrategyRegistry {
    constructors: HashMap<StrategyMode, Constructor>,
}

impl StrategyRegistry {
    /// Registry with the three built-in variants.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register(StrategyMode::PureLending, |deps| {
            Ok(Box::new(PureLendingStrategy::new(deps)?))
        });
        registry.register(StrategyMode::StakingOnly, |deps| {
            Ok(Box::new(StakingOnlyStrategy::new(deps)?))
        });
        registry.register(StrategyMode::LeveragedBasis, |deps| {
            Ok(Box::new(LeveragedBasisStrategy::new(deps)?))
        });
        registry
    }

    pub fn register(&mut self, mode: StrategyMode, constructor: Constructor) {
        self.constructors.insert(mode, constructor);
    }

    /// Construct the strategy for `mode`. Configuration problems (missing
    /// allow-list entries, unknown mode) surface here, before any tick runs.
    pub fn build(
        &self,
        mode: StrategyMode,
        deps: &StrategyDeps,
    ) -> Result<Box<dyn StrategyImplementation>> {
        let constructor = self
            .constructors
            .get(&mode)
            .ok_or_else(|| StrataError::UnknownStrategyMode(mode.to_string()))?;
        constructor(deps)
    }

    /// Parse a free-form mode string and construct, in one step.
    pub fn build_named(
        &self,
        mode: &str,
        deps: &StrategyDeps,
    ) -> Result<Box<dyn StrategyImplementation>> {
        let mode = StrategyMode::parse(mode)
            .ok_or_else(|| StrataError::UnknownStrategyMode(mode.to_string()))?;
        self.build(mode, deps)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
