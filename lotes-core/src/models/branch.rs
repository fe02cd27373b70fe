use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cultivation site a lot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "FSM")]
    Fsm,
    #[serde(rename = "SMB")]
    Smb,
    #[serde(rename = "RP")]
    Rp,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Fsm, Branch::Smb, Branch::Rp];

    pub fn code(&self) -> &'static str {
        match self {
            Branch::Fsm => "FSM",
            Branch::Smb => "SMB",
            Branch::Rp => "RP",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FSM" => Ok(Branch::Fsm),
            "SMB" => Ok(Branch::Smb),
            "RP" => Ok(Branch::Rp),
            _ => Err(format!(
                "Invalid branch '{}'. Valid options: FSM, SMB, RP",
                s
            )),
        }
    }
}
