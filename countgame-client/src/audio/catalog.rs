//! Static audio catalog
//!
//! Maps logical asset ids (`numbers.3`, `greetings.hi_ready_to_play`,
//! `positive_feedback[1]`) to physical paths relative to the asset root.
//! Built once at startup from [`CatalogConfig`] and never mutated.

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Catalog category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetCategory {
    Numbers,
    Greetings,
    Instructions,
    PositiveFeedback,
    Encouragement,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Numbers => "numbers",
            AssetCategory::Greetings => "greetings",
            AssetCategory::Instructions => "instructions",
            AssetCategory::PositiveFeedback => "positive_feedback",
            AssetCategory::Encouragement => "encouragement",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical audio asset identifier (category + name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetId {
    Number(u32),
    Greeting(String),
    Instruction(String),
    PositiveFeedback(usize),
    Encouragement(String),
}

impl AssetId {
    pub fn category(&self) -> AssetCategory {
        match self {
            AssetId::Number(_) => AssetCategory::Numbers,
            AssetId::Greeting(_) => AssetCategory::Greetings,
            AssetId::Instruction(_) => AssetCategory::Instructions,
            AssetId::PositiveFeedback(_) => AssetCategory::PositiveFeedback,
            AssetId::Encouragement(_) => AssetCategory::Encouragement,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Number(n) => write!(f, "numbers.{}", n),
            AssetId::Greeting(key) => write!(f, "greetings.{}", key),
            AssetId::Instruction(key) => write!(f, "instructions.{}", key),
            AssetId::PositiveFeedback(i) => write!(f, "positive_feedback[{}]", i),
            AssetId::Encouragement(key) => write!(f, "encouragement.{}", key),
        }
    }
}

impl FromStr for AssetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("Invalid asset id '{}'", s));

        if let Some(rest) = s.strip_prefix("positive_feedback[") {
            let index = rest.strip_suffix(']').ok_or_else(invalid)?;
            return index
                .parse::<usize>()
                .map(AssetId::PositiveFeedback)
                .map_err(|_| invalid());
        }

        let (category, name) = s.split_once('.').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        match category {
            "numbers" => name.parse::<u32>().map(AssetId::Number).map_err(|_| invalid()),
            "greetings" => Ok(AssetId::Greeting(name.to_string())),
            "instructions" => Ok(AssetId::Instruction(name.to_string())),
            "encouragement" => Ok(AssetId::Encouragement(name.to_string())),
            _ => Err(invalid()),
        }
    }
}

/// Immutable catalog of asset paths
#[derive(Debug, Clone)]
pub struct AudioCatalog {
    numbers: BTreeMap<u32, String>,
    greetings: BTreeMap<String, String>,
    instructions: BTreeMap<String, String>,
    positive_feedback: Vec<String>,
    encouragement: BTreeMap<String, String>,
}

impl AudioCatalog {
    /// Build and validate the catalog.
    ///
    /// Numbers must be keyed `1..=N` without gaps, positive feedback must be
    /// non-empty and no path may be blank.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let mut numbers = BTreeMap::new();
        for (key, path) in &config.numbers {
            let n = key.trim().parse::<u32>().map_err(|_| {
                Error::Config(format!("catalog.numbers key '{}' is not a number", key))
            })?;
            numbers.insert(n, path.clone());
        }

        for (expected, n) in (1u32..).zip(numbers.keys()) {
            if *n != expected {
                return Err(Error::Config(format!(
                    "catalog.numbers must cover 1..=N without gaps (missing {})",
                    expected
                )));
            }
        }

        if config.positive_feedback.is_empty() {
            return Err(Error::Config(
                "catalog.positive_feedback must list at least one asset".to_string(),
            ));
        }

        let catalog = Self {
            numbers,
            greetings: config.greetings.clone(),
            instructions: config.instructions.clone(),
            positive_feedback: config.positive_feedback.clone(),
            encouragement: config.encouragement.clone(),
        };

        if let Some(id) = catalog.ids().find(|id| {
            catalog
                .resolve(id)
                .map(|p| p.trim().is_empty())
                .unwrap_or(true)
        }) {
            return Err(Error::Config(format!("catalog entry {} has an empty path", id)));
        }

        Ok(catalog)
    }

    /// Physical path for an id, if catalogued
    pub fn resolve(&self, id: &AssetId) -> Option<&str> {
        match id {
            AssetId::Number(n) => self.numbers.get(n),
            AssetId::Greeting(key) => self.greetings.get(key),
            AssetId::Instruction(key) => self.instructions.get(key),
            AssetId::PositiveFeedback(i) => self.positive_feedback.get(*i),
            AssetId::Encouragement(key) => self.encouragement.get(key),
        }
        .map(String::as_str)
    }

    /// Highest catalogued number (0 when no numbers)
    pub fn max_number(&self) -> u32 {
        self.numbers.keys().next_back().copied().unwrap_or(0)
    }

    pub fn positive_feedback_len(&self) -> usize {
        self.positive_feedback.len()
    }

    /// Uniform random pick from the positive feedback list
    pub fn random_positive_feedback(&self) -> AssetId {
        let index = rand::thread_rng().gen_range(0..self.positive_feedback.len().max(1));
        AssetId::PositiveFeedback(index)
    }

    /// Named (non-number, non-list) entries as (category, key)
    pub fn named_keys(&self) -> impl Iterator<Item = (AssetCategory, &str)> {
        let greetings = self
            .greetings
            .keys()
            .map(|k| (AssetCategory::Greetings, k.as_str()));
        let instructions = self
            .instructions
            .keys()
            .map(|k| (AssetCategory::Instructions, k.as_str()));
        let encouragement = self
            .encouragement
            .keys()
            .map(|k| (AssetCategory::Encouragement, k.as_str()));
        greetings.chain(instructions).chain(encouragement)
    }

    /// Every catalogued id
    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        let numbers = self.numbers.keys().map(|n| AssetId::Number(*n));
        let feedback = (0..self.positive_feedback.len()).map(AssetId::PositiveFeedback);
        let named = self.named_keys().map(|(category, key)| match category {
            AssetCategory::Greetings => AssetId::Greeting(key.to_string()),
            AssetCategory::Instructions => AssetId::Instruction(key.to_string()),
            _ => AssetId::Encouragement(key.to_string()),
        });
        numbers.chain(feedback).chain(named)
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
