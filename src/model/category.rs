use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sensor family a trial's snippet was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Eeg,
    Mag,
    Grad,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[Category::Eeg, Category::Mag, Category::Grad]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Eeg => "eeg",
            Category::Mag => "mag",
            Category::Grad => "grad",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category {0:?} (use eeg|mag|grad)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eeg" => Ok(Category::Eeg),
            "mag" => Ok(Category::Mag),
            "grad" => Ok(Category::Grad),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// What the participant is rating: raw sensor channels or decomposed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentMode {
    Channels,
    Components,
}

impl ExperimentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentMode::Channels => "channels",
            ExperimentMode::Components => "components",
        }
    }
}

impl fmt::Display for ExperimentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/category.rs"]
mod tests;
