use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;

use serde::{Deserialize, Serialize};

use crate::common::error::{ControllerError, ControllerResult};
use crate::qos::model::{FiveTuple, MAX_FILTERS, MAX_FILTER_NAME_LEN, TrafficClass};

const BUILTIN_POLICY: &str = include_str!("../../config/policy.json");

pub const DEFAULT_FILTER_PRIORITY: u32 = 1;

fn default_priority() -> u32 {
    DEFAULT_FILTER_PRIORITY
}

/// One named traffic class: what to match, how to mark it, which band it
/// is queued in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPolicy {
    pub name: String,
    #[serde(rename = "match")]
    pub matcher: FiveTuple,
    pub traffic_class: TrafficClass,
    pub band: u8,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

/// Where packets no policy claims end up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPolicy {
    pub name: String,
    pub traffic_class: TrafficClass,
    pub band: u8,
}

/// Operator supplied traffic-class table consumed by the QoS builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    pub band_count: u8,
    pub queue_limit: u32,
    pub policies: Vec<TrafficPolicy>,
    pub fallback: FallbackPolicy,
}

impl PolicyTable {
    /// The testbed's standard table shipped in `config/policy.json`.
    pub fn builtin() -> ControllerResult<Self> {
        Self::from_json(BUILTIN_POLICY)
    }

    pub fn load(path: &str) -> ControllerResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let table: PolicyTable = serde_json::from_reader(reader)
            .map_err(|e| ControllerError::InvalidPolicy(format!("{}: {}", path, e)))?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json(json: &str) -> ControllerResult<Self> {
        let table: PolicyTable =
            serde_json::from_str(json).map_err(|e| ControllerError::InvalidPolicy(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> ControllerResult<()> {
        if self.band_count == 0 {
            return Err(ControllerError::InvalidPolicy("band_count must be at least 1".to_string()));
        }
        if self.queue_limit == 0 {
            return Err(ControllerError::InvalidPolicy("queue_limit must be greater than zero".to_string()));
        }

        // The fallback becomes one more filter.
        if self.policies.len() >= MAX_FILTERS {
            return Err(ControllerError::InvalidPolicy(format!(
                "{} policies exceed the limit of {}",
                self.policies.len(),
                MAX_FILTERS - 1
            )));
        }

        let mut names = HashSet::new();
        for policy in &self.policies {
            if policy.name.trim().is_empty() {
                return Err(ControllerError::InvalidPolicy("policy with empty name".to_string()));
            }
            check_name_len(&policy.name)?;
            if !names.insert(policy.name.as_str()) {
                return Err(ControllerError::InvalidPolicy(format!("duplicate policy {:?}", policy.name)));
            }
            if policy.band >= self.band_count {
                return Err(ControllerError::InvalidPolicy(format!(
                    "policy {:?} uses band {} but only {} bands exist",
                    policy.name, policy.band, self.band_count
                )));
            }
            if policy.matcher.is_wildcard() {
                return Err(ControllerError::InvalidPolicy(format!(
                    "policy {:?} matches everything; use the fallback entry instead",
                    policy.name
                )));
            }
            if policy.priority == u32::MAX {
                return Err(ControllerError::InvalidPolicy(format!(
                    "policy {:?} priority leaves no room for the fallback filter",
                    policy.name
                )));
            }
        }

        if self.fallback.name.trim().is_empty() {
            return Err(ControllerError::InvalidPolicy("fallback with empty name".to_string()));
        }
        check_name_len(&self.fallback.name)?;
        if self.fallback.band >= self.band_count {
            return Err(ControllerError::InvalidPolicy(format!(
                "fallback uses band {} but only {} bands exist",
                self.fallback.band, self.band_count
            )));
        }
        Ok(())
    }

    /// Priority given to the fallback filter: one past every policy, so it is
    /// always evaluated last.
    pub fn fallback_priority(&self) -> u32 {
        self.policies
            .iter()
            .map(|p| p.priority)
            .max()
            .unwrap_or(DEFAULT_FILTER_PRIORITY)
            + 1
    }
}

fn check_name_len(name: &str) -> ControllerResult<()> {
    if name.len() > MAX_FILTER_NAME_LEN {
        return Err(ControllerError::InvalidPolicy(format!(
            "name of {} bytes exceeds the limit of {}",
            name.len(),
            MAX_FILTER_NAME_LEN
        )));
    }
    Ok(())
}
