//! The ledger: the whole ordered collection of lots, the unit of sync.

pub mod codec;
mod error;

pub use error::LedgerError;

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{Branch, Location, LotRecord, Stage};

/// First and last week of a lot's cycle.
pub const FIRST_WEEK: u8 = 1;
pub const LAST_WEEK: u8 = 22;

/// How to number a new lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotNumber {
    /// One past the highest number already used in the branch.
    Auto,
    Fixed(u32),
}

/// Parameters for a new lot.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub branch: Branch,
    pub number: LotNumber,
    pub stage: Option<Stage>,
    pub location: Option<Location>,
    pub week: Option<u8>,
    pub notes: String,
}

/// Requested changes to an existing lot. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct LotEdit {
    pub stage: Option<Stage>,
    pub location: Option<Location>,
    pub week: Option<u8>,
}

/// A field that changed during an edit, with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LotChange {
    Stage(Stage),
    Location(Location),
    Week(u8),
}

/// One lot moved forward by [`Ledger::advance_weeks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekAdvance {
    pub id: String,
    pub from_week: u8,
    pub to_week: u8,
    pub from_stage: Option<Stage>,
    pub to_stage: Option<Stage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    lots: Vec<LotRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lots(lots: Vec<LotRecord>) -> Self {
        Self { lots }
    }

    pub fn lots(&self) -> &[LotRecord] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LotRecord> {
        self.lots.iter()
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        self.lots.iter().try_for_each(LotRecord::validate)
    }

    /// Appends a new lot and returns its id.
    pub fn create_lot(&mut self, new: NewLot, today: NaiveDate) -> Result<String, LedgerError> {
        let number = match new.number {
            LotNumber::Fixed(0) => return Err(LedgerError::InvalidLotNumber),
            LotNumber::Fixed(n) => n,
            LotNumber::Auto => self.next_lot_number(new.branch)?,
        };

        if let Some(week) = new.week {
            check_week(week)?;
        }

        // Numbers are only unique per (branch, location)
        if self
            .lots
            .iter()
            .any(|l| l.branch == new.branch && l.lot_number == number && l.location == new.location)
        {
            return Err(LedgerError::DuplicateLot {
                id: LotRecord::canonical_id(new.branch, number),
                location: location_label(new.location).to_string(),
            });
        }

        let mut lot = LotRecord::new(new.branch, number, today).with_notes(new.notes);
        lot.stage = new.stage;
        lot.location = new.location;
        lot.week = new.week;

        let id = lot.id.clone();
        self.lots.push(lot);
        Ok(id)
    }

    fn next_lot_number(&self, branch: Branch) -> Result<u32, LedgerError> {
        match self
            .lots
            .iter()
            .filter(|l| l.branch == branch)
            .map(|l| l.lot_number)
            .max()
        {
            Some(n) => n.checked_add(1).ok_or(LedgerError::InvalidLotNumber),
            None => Ok(1),
        }
    }

    /// Finds a lot by id or by a label from [`Ledger::labels`].
    ///
    /// Accepts `L3-FSM`, the stored id, `L3-FSM (CUARTO 1)` to pick among
    /// lots sharing an id, and ignores anything after a `|`.
    pub fn find(&self, selector: &str) -> Option<usize> {
        let mut sel = selector.trim();
        if let Some((head, _)) = sel.split_once('|') {
            sel = head.trim();
        }

        let mut location_filter = None;
        if sel.ends_with(')') {
            if let Some((head, tail)) = sel.rsplit_once('(') {
                location_filter = Some(tail.trim_end_matches(')').trim());
                sel = head.trim();
            }
        }

        self.lots.iter().position(|lot| {
            let id_matches =
                LotRecord::canonical_id(lot.branch, lot.lot_number) == sel || lot.id == sel;
            match location_filter {
                Some(filter) => id_matches && location_label(lot.location) == filter,
                None => id_matches,
            }
        })
    }

    pub fn get(&self, selector: &str) -> Option<&LotRecord> {
        self.find(selector).map(|idx| &self.lots[idx])
    }

    fn get_mut(&mut self, selector: &str) -> Result<&mut LotRecord, LedgerError> {
        match self.find(selector) {
            Some(idx) => Ok(&mut self.lots[idx]),
            None => Err(LedgerError::LotNotFound(selector.to_string())),
        }
    }

    /// Lot labels ordered by branch and number; ids shared by several lots
    /// carry their location, e.g. `L2-RP (CUARTO 1)`.
    pub fn labels(&self) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for lot in &self.lots {
            *counts
                .entry(LotRecord::canonical_id(lot.branch, lot.lot_number))
                .or_default() += 1;
        }

        self.sorted()
            .into_iter()
            .map(|lot| {
                let id = LotRecord::canonical_id(lot.branch, lot.lot_number);
                if counts.get(&id).copied().unwrap_or(0) > 1 {
                    format!("{} ({})", id, location_label(lot.location))
                } else {
                    id
                }
            })
            .collect()
    }

    /// Lots ordered by branch, then number.
    pub fn sorted(&self) -> Vec<&LotRecord> {
        let mut lots: Vec<&LotRecord> = self.lots.iter().collect();
        lots.sort_by_key(|l| (l.branch, l.lot_number));
        lots
    }

    pub fn filter(
        &self,
        branch: Option<Branch>,
        stage: Option<Stage>,
        location: Option<Location>,
    ) -> Vec<&LotRecord> {
        self.sorted()
            .into_iter()
            .filter(|l| branch.map_or(true, |b| l.branch == b))
            .filter(|l| stage.map_or(true, |s| l.stage == Some(s)))
            .filter(|l| location.map_or(true, |loc| l.location == Some(loc)))
            .collect()
    }

    pub fn add_variety(
        &mut self,
        selector: &str,
        name: &str,
        count: u32,
    ) -> Result<(), LedgerError> {
        self.get_mut(selector)?.add_variety(name, count)
    }

    pub fn remove_variety(&mut self, selector: &str, name: &str) -> Result<(), LedgerError> {
        let lot = self.get_mut(selector)?;
        if lot.remove_variety(name) {
            Ok(())
        } else {
            Err(LedgerError::VarietyNotFound {
                lot: lot.id.clone(),
                name: name.to_string(),
            })
        }
    }

    /// Applies an edit and returns what actually changed.
    ///
    /// Moving a lot to week 20 or 21 also moves it to `PT` / `SECADO`.
    pub fn edit(&mut self, selector: &str, edit: LotEdit) -> Result<Vec<LotChange>, LedgerError> {
        if let Some(week) = edit.week {
            check_week(week)?;
        }

        let lot = self.get_mut(selector)?;
        let mut changes = Vec::new();

        if let Some(stage) = edit.stage.filter(|s| lot.stage != Some(*s)) {
            lot.stage = Some(stage);
            changes.push(LotChange::Stage(stage));
        }
        if let Some(location) = edit.location.filter(|l| lot.location != Some(*l)) {
            lot.location = Some(location);
            changes.push(LotChange::Location(location));
        }
        if let Some(week) = edit.week.filter(|w| lot.week != Some(*w)) {
            lot.week = Some(week);
            changes.push(LotChange::Week(week));

            if matches!(week, 20 | 21) {
                if lot.location != Some(Location::Finished) {
                    lot.location = Some(Location::Finished);
                    changes.push(LotChange::Location(Location::Finished));
                }
                if lot.stage != Some(Stage::Drying) {
                    lot.stage = Some(Stage::Drying);
                    changes.push(LotChange::Stage(Stage::Drying));
                }
            }
        }

        Ok(changes)
    }

    /// Moves every running lot forward one week, once per ISO week.
    ///
    /// A lot advances when `1 <= week < 22` and its `last_updated` date falls
    /// in a different ISO week than `today`. Its stage follows the week.
    pub fn advance_weeks(&mut self, today: NaiveDate) -> Vec<WeekAdvance> {
        let current = today.iso_week();
        let mut advanced = Vec::new();

        for lot in &mut self.lots {
            let Some(week) = lot.week else { continue };
            if !(FIRST_WEEK..LAST_WEEK).contains(&week) {
                continue;
            }
            if lot.last_updated.map(|d| d.iso_week()) == Some(current) {
                continue;
            }

            let to_week = week + 1;
            let to_stage = Stage::for_week(to_week);
            advanced.push(WeekAdvance {
                id: lot.id.clone(),
                from_week: week,
                to_week,
                from_stage: lot.stage,
                to_stage,
            });

            lot.week = Some(to_week);
            lot.stage = to_stage;
            lot.last_updated = Some(today);
        }

        advanced
    }
}

fn check_week(week: u8) -> Result<(), LedgerError> {
    if (FIRST_WEEK..=LAST_WEEK).contains(&week) {
        Ok(())
    } else {
        Err(LedgerError::InvalidWeek(week))
    }
}

fn location_label(location: Option<Location>) -> &'static str {
    location.map_or("", |l| l.label())
}
