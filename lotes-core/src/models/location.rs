use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Room or area where a lot is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "PT")]
    Finished,
    #[serde(rename = "CUARTO 1")]
    Room1,
    #[serde(rename = "CUARTO 2")]
    Room2,
    #[serde(rename = "CUARTO 3")]
    Room3,
    #[serde(rename = "CUARTO 4")]
    Room4,
    #[serde(rename = "VEGETATIVO")]
    Vegetative,
    #[serde(rename = "ENFERMERÍA")]
    Infirmary,
    #[serde(rename = "MADRES")]
    Mothers,
}

impl Location {
    pub const ALL: [Location; 8] = [
        Location::Finished,
        Location::Room1,
        Location::Room2,
        Location::Room3,
        Location::Room4,
        Location::Vegetative,
        Location::Infirmary,
        Location::Mothers,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Location::Finished => "PT",
            Location::Room1 => "CUARTO 1",
            Location::Room2 => "CUARTO 2",
            Location::Room3 => "CUARTO 3",
            Location::Room4 => "CUARTO 4",
            Location::Vegetative => "VEGETATIVO",
            Location::Infirmary => "ENFERMERÍA",
            Location::Mothers => "MADRES",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Location::ALL
            .into_iter()
            .find(|location| location.label() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Location::ALL.iter().map(|l| l.label()).collect();
                format!(
                    "Invalid location '{}'. Valid options: {}",
                    s,
                    valid.join(", ")
                )
            })
    }
}
