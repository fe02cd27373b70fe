use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Branch, Location, Stage};
use crate::ledger::LedgerError;

/// Number of variety slots a lot row can hold.
pub const MAX_VARIETIES: usize = 20;

/// A plant variety and how many plants of it a lot holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variety {
    pub name: String,
    pub count: u32,
}

impl Variety {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// One cultivation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRecord {
    pub id: String,
    pub branch: Branch,
    pub lot_number: u32,
    pub stage: Option<Stage>,
    pub location: Option<Location>,
    pub week: Option<u8>,
    pub date_created: Option<NaiveDate>,
    pub last_updated: Option<NaiveDate>,
    pub notes: String,
    pub varieties: Vec<Variety>,
}

impl LotRecord {
    pub fn new(branch: Branch, lot_number: u32, created: NaiveDate) -> Self {
        Self {
            id: Self::canonical_id(branch, lot_number),
            branch,
            lot_number,
            stage: None,
            location: None,
            week: None,
            date_created: Some(created),
            last_updated: None,
            notes: String::new(),
            varieties: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_week(mut self, week: u8) -> Self {
        self.week = Some(week);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// `L{number}-{branch}`, e.g. `L7-FSM`.
    pub fn canonical_id(branch: Branch, lot_number: u32) -> String {
        format!("L{}-{}", lot_number, branch)
    }

    /// Adds plants of a variety, merging into an existing entry of the same name.
    pub fn add_variety(&mut self, name: &str, count: u32) -> Result<(), LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyVarietyName);
        }

        if let Some(existing) = self.varieties.iter_mut().find(|v| v.name == name) {
            existing.count = existing.count.saturating_add(count);
            return Ok(());
        }

        if self.varieties.len() >= MAX_VARIETIES {
            return Err(LedgerError::TooManyVarieties {
                lot: self.id.clone(),
                count: self.varieties.len() + 1,
            });
        }

        self.varieties.push(Variety::new(name, count));
        Ok(())
    }

    /// Removes a variety by name. Returns false if the lot did not hold it.
    pub fn remove_variety(&mut self, name: &str) -> bool {
        let before = self.varieties.len();
        self.varieties.retain(|v| v.name != name);
        self.varieties.len() != before
    }

    pub fn total_plants(&self) -> u64 {
        self.varieties.iter().map(|v| u64::from(v.count)).sum()
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.varieties.len() > MAX_VARIETIES {
            return Err(LedgerError::TooManyVarieties {
                lot: self.id.clone(),
                count: self.varieties.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for LotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.id)?;
        writeln!(f, "{}", "=".repeat(self.id.len()))?;
        writeln!(f, "Branch:   {}", self.branch)?;
        writeln!(f, "Lot:      {}", self.lot_number)?;
        if let Some(stage) = self.stage {
            writeln!(f, "Stage:    {}", stage)?;
        }
        if let Some(location) = self.location {
            writeln!(f, "Location: {}", location)?;
        }
        if let Some(week) = self.week {
            writeln!(f, "Week:     {}", week)?;
        }
        if let Some(date) = self.date_created {
            writeln!(f, "Created:  {}", date)?;
        }
        if let Some(date) = self.last_updated {
            writeln!(f, "Updated:  {}", date)?;
        }
        if !self.notes.is_empty() {
            writeln!(f, "Notes:    {}", self.notes)?;
        }

        if !self.varieties.is_empty() {
            writeln!(f, "\nVarieties ({} plants):", self.total_plants())?;
            for variety in &self.varieties {
                writeln!(f, "  - {}: {}", variety.name, variety.count)?;
            }
        }

        Ok(())
    }
}
