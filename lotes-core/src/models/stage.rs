use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of a lot, in growing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "CLONADO")]
    Clone,
    #[serde(rename = "VEG. TEMPRANO")]
    VegetativeEarly,
    #[serde(rename = "VEG. TARDIO")]
    VegetativeLate,
    #[serde(rename = "FLORACIÓN")]
    Flowering,
    #[serde(rename = "TRANSICIÓN")]
    Transition,
    #[serde(rename = "SECADO")]
    Drying,
    #[serde(rename = "PT")]
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Clone,
        Stage::VegetativeEarly,
        Stage::VegetativeLate,
        Stage::Flowering,
        Stage::Transition,
        Stage::Drying,
        Stage::Finished,
    ];

    /// Label stored in the ledger file.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Clone => "CLONADO",
            Stage::VegetativeEarly => "VEG. TEMPRANO",
            Stage::VegetativeLate => "VEG. TARDIO",
            Stage::Flowering => "FLORACIÓN",
            Stage::Transition => "TRANSICIÓN",
            Stage::Drying => "SECADO",
            Stage::Finished => "PT",
        }
    }

    /// Stage a lot is expected to be in at a given week of its cycle.
    ///
    /// Weeks outside 1-22 have no stage. `Transition` is never assigned by
    /// week; it is only set by hand.
    pub fn for_week(week: u8) -> Option<Stage> {
        match week {
            1..=4 => Some(Stage::Clone),
            5..=7 => Some(Stage::VegetativeEarly),
            8..=9 => Some(Stage::VegetativeLate),
            10..=20 => Some(Stage::Flowering),
            21 => Some(Stage::Drying),
            22 => Some(Stage::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.label() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Stage::ALL.iter().map(|s| s.label()).collect();
                format!("Invalid stage '{}'. Valid options: {}", s, valid.join(", "))
            })
    }
}
