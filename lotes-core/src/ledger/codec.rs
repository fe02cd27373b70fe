//! Tabular text codec for the ledger file.
//!
//! Fixed columns `ID,Branch,LoteNum,Stage,Location,Semana,DateCreated,
//! LastUpdated,Notes` followed by 20 `Variedad_n`/`Cantidad_n` pairs. Columns
//! are looked up by name, so missing optional columns read as empty.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::{Ledger, LedgerError};
use crate::models::{Branch, Location, LotRecord, Stage, Variety, MAX_VARIETIES};

const COL_ID: &str = "ID";
const COL_BRANCH: &str = "Branch";
const COL_LOT_NUM: &str = "LoteNum";
const COL_STAGE: &str = "Stage";
const COL_LOCATION: &str = "Location";
const COL_WEEK: &str = "Semana";
const COL_DATE_CREATED: &str = "DateCreated";
const COL_LAST_UPDATED: &str = "LastUpdated";
const COL_LAST_UPDATED_LEGACY: &str = "ÚltimaActualización";
const COL_NOTES: &str = "Notes";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header row, in write order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = [
        COL_ID,
        COL_BRANCH,
        COL_LOT_NUM,
        COL_STAGE,
        COL_LOCATION,
        COL_WEEK,
        COL_DATE_CREATED,
        COL_LAST_UPDATED,
        COL_NOTES,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    for i in 1..=MAX_VARIETIES {
        columns.push(format!("Variedad_{}", i));
        columns.push(format!("Cantidad_{}", i));
    }
    columns
}

/// Serializes the ledger. Fails if any lot breaks the variety limit.
pub fn encode(ledger: &Ledger) -> Result<String, LedgerError> {
    ledger.validate()?;

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header())?;

    for lot in ledger.iter() {
        let mut row: Vec<String> = vec![
            lot.id.clone(),
            lot.branch.to_string(),
            lot.lot_number.to_string(),
            lot.stage.map(|s| s.to_string()).unwrap_or_default(),
            lot.location.map(|l| l.to_string()).unwrap_or_default(),
            lot.week.map(|w| w.to_string()).unwrap_or_default(),
            format_date(lot.date_created),
            format_date(lot.last_updated),
            lot.notes.clone(),
        ];

        for slot in 0..MAX_VARIETIES {
            match lot.varieties.get(slot) {
                Some(variety) => {
                    row.push(variety.name.clone());
                    row.push(variety.count.to_string());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }

        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| LedgerError::Csv(e.into_error().into()))?;
    // Every field written above is a String, so the buffer is valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses ledger text. Blank rows are skipped.
pub fn decode(text: &str) -> Result<Ledger, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), i))
        .collect();

    let mut lots = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        // Header is line 1
        let row = Row {
            number: i + 2,
            record: &record,
            columns: &columns,
        };
        lots.push(row.decode()?);
    }

    Ok(Ledger::from_lots(lots))
}

/// Counts rows below the header with at least one non-blank field.
///
/// Rows the reader cannot parse count as data, so a damaged file is never
/// mistaken for an empty one.
pub fn count_data_rows(text: &str) -> usize {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .records()
        .filter(|record| match record {
            Ok(r) => r.iter().any(|f| !f.trim().is_empty()),
            Err(_) => true,
        })
        .count()
}

struct Row<'a> {
    number: usize,
    record: &'a csv::StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl Row<'_> {
    fn field(&self, column: &str) -> &str {
        self.raw_field(column).trim()
    }

    /// Free text is kept exactly as written.
    fn raw_field(&self, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    fn invalid(&self, column: &'static str, value: &str, reason: impl Into<String>) -> LedgerError {
        LedgerError::InvalidField {
            row: self.number,
            column,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn decode(&self) -> Result<LotRecord, LedgerError> {
        let raw_branch = self.field(COL_BRANCH);
        let branch: Branch = raw_branch
            .parse()
            .map_err(|e: String| self.invalid(COL_BRANCH, raw_branch, e))?;

        let raw_number = self.field(COL_LOT_NUM);
        let lot_number = raw_number
            .trim_start_matches(['L', 'l'])
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid(COL_LOT_NUM, raw_number, "expected a positive integer"))?;

        let raw_stage = self.field(COL_STAGE);
        let stage = if raw_stage.is_empty() {
            None
        } else {
            Some(
                raw_stage
                    .parse::<Stage>()
                    .map_err(|e| self.invalid(COL_STAGE, raw_stage, e))?,
            )
        };

        let raw_location = self.field(COL_LOCATION);
        let location = if raw_location.is_empty() {
            None
        } else {
            Some(
                raw_location
                    .parse::<Location>()
                    .map_err(|e| self.invalid(COL_LOCATION, raw_location, e))?,
            )
        };

        let mut date_created = self.date(COL_DATE_CREATED)?;

        // Older files sometimes carry the creation date in the week column.
        let raw_week = self.field(COL_WEEK);
        let week = if raw_week.is_empty() {
            None
        } else if looks_like_date(raw_week) {
            if date_created.is_none() {
                date_created = parse_date(raw_week);
            }
            None
        } else {
            Some(
                raw_week
                    .parse::<u8>()
                    .map_err(|_| self.invalid(COL_WEEK, raw_week, "expected a week number"))?,
            )
        };

        let last_updated = match self.date(COL_LAST_UPDATED)? {
            Some(date) => Some(date),
            None => self.date_in(COL_LAST_UPDATED_LEGACY, COL_LAST_UPDATED)?,
        };

        let id = match self.field(COL_ID) {
            "" => LotRecord::canonical_id(branch, lot_number),
            id => id.to_string(),
        };

        Ok(LotRecord {
            id,
            branch,
            lot_number,
            stage,
            location,
            week,
            date_created,
            last_updated,
            notes: self.raw_field(COL_NOTES).to_string(),
            varieties: self.varieties(),
        })
    }

    fn date(&self, column: &'static str) -> Result<Option<NaiveDate>, LedgerError> {
        self.date_in(column, column)
    }

    fn date_in(
        &self,
        column: &str,
        reported_as: &'static str,
    ) -> Result<Option<NaiveDate>, LedgerError> {
        let raw = self.field(column);
        if raw.is_empty() {
            return Ok(None);
        }
        parse_date(raw)
            .map(Some)
            .ok_or_else(|| self.invalid(reported_as, raw, "expected YYYY-MM-DD"))
    }

    /// Reads the variety slots, merging repeated names and coercing
    /// unreadable counts to 0.
    fn varieties(&self) -> Vec<Variety> {
        let mut varieties: Vec<Variety> = Vec::new();
        for i in 1..=MAX_VARIETIES {
            let name = self.field(&format!("Variedad_{}", i));
            if name.is_empty() {
                continue;
            }
            let count = self
                .field(&format!("Cantidad_{}", i))
                .parse::<u32>()
                .unwrap_or(0);

            match varieties.iter_mut().find(|v| v.name == name) {
                Some(existing) => existing.count = existing.count.saturating_add(count),
                None => varieties.push(Variety::new(name, count)),
            }
        }
        varieties
    }
}

fn looks_like_date(value: &str) -> bool {
    value.contains('-') && value.starts_with(|c: char| c.is_ascii_digit())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| {
            // Tolerate a trailing time component
            value
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok())
        })
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ledger() -> Ledger {
        let created = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let mut first = LotRecord::new(Branch::Fsm, 1, created)
            .with_stage(Stage::Flowering)
            .with_location(Location::Room2)
            .with_week(12)
            .with_notes("north wall, \"tall\" plants");
        first.add_variety("Runtz", 14).unwrap();
        first.add_variety("Apple Fritter", 6).unwrap();
        first.last_updated = NaiveDate::from_ymd_opt(2025, 4, 21);

        let second = LotRecord::new(Branch::Rp, 2, created).with_location(Location::Mothers);

        Ledger::from_lots(vec![first, second])
    }

    #[test]
    fn test_header_layout() {
        let header = header();
        assert_eq!(header.len(), 9 + 2 * MAX_VARIETIES);
        assert_eq!(header[0], "ID");
        assert_eq!(header[7], "LastUpdated");
        assert_eq!(header[9], "Variedad_1");
        assert_eq!(header[10], "Cantidad_1");
        assert_eq!(header[48], "Cantidad_20");
    }

    #[test]
    fn test_encode_then_decode_preserves_ledger() {
        let ledger = sample_ledger();
        let text = encode(&ledger).unwrap();
        assert_eq!(decode(&text).unwrap(), ledger);
    }

    #[test]
    fn test_notes_keep_surrounding_whitespace() {
        let lot = LotRecord::new(Branch::Smb, 4, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
            .with_notes("  indented note ");
        let ledger = Ledger::from_lots(vec![lot]);

        let text = encode(&ledger).unwrap();
        let back = decode(&text).unwrap();
        assert_eq!(back, ledger);
        assert_eq!(encode(&back).unwrap(), text);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let ledger = sample_ledger();
        assert_eq!(encode(&ledger).unwrap(), encode(&ledger).unwrap());
    }

    #[test]
    fn test_encode_rejects_oversized_variety_list() {
        let mut lot =
            LotRecord::new(Branch::Smb, 1, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        lot.varieties = (0..=MAX_VARIETIES)
            .map(|i| Variety::new(format!("V{}", i), 1))
            .collect();

        let err = encode(&Ledger::from_lots(vec![lot])).unwrap_err();
        assert!(matches!(err, LedgerError::TooManyVarieties { count: 21, .. }));
    }

    #[test]
    fn test_decode_tolerates_missing_columns() {
        let text = "ID,Branch,LoteNum\nL5-SMB,SMB,5\n";
        let ledger = decode(text).unwrap();

        let lot = &ledger.lots()[0];
        assert_eq!(lot.id, "L5-SMB");
        assert_eq!(lot.stage, None);
        assert_eq!(lot.week, None);
        assert!(lot.notes.is_empty());
        assert!(lot.varieties.is_empty());
    }

    #[test]
    fn test_decode_coerces_bad_counts_and_merges_names() {
        let text = "Branch,LoteNum,Variedad_1,Cantidad_1,Variedad_2,Cantidad_2,Variedad_3,Cantidad_3\n\
                    FSM,1,Runtz,abc,Runtz,4,Ak-47,-2\n";
        let ledger = decode(text).unwrap();
        let lot = &ledger.lots()[0];

        assert_eq!(lot.id, "L1-FSM");
        assert_eq!(
            lot.varieties,
            vec![Variety::new("Runtz", 4), Variety::new("Ak-47", 0)]
        );
    }

    #[test]
    fn test_decode_accepts_grouped_variety_columns_and_legacy_date_header() {
        let text = "ID,Branch,LoteNum,ÚltimaActualización,Variedad_1,Variedad_2,Cantidad_1,Cantidad_2\n\
                    L1-RP,RP,1,2025-05-05,Runtz,Orangel,3,7\n";
        let ledger = decode(text).unwrap();
        let lot = &ledger.lots()[0];

        assert_eq!(lot.last_updated, NaiveDate::from_ymd_opt(2025, 5, 5));
        assert_eq!(
            lot.varieties,
            vec![Variety::new("Runtz", 3), Variety::new("Orangel", 7)]
        );
    }

    #[test]
    fn test_decode_moves_date_out_of_week_column() {
        let text = "ID,Branch,LoteNum,Semana,DateCreated\nL1-FSM,FSM,1,2025-01-13,\n";
        let ledger = decode(text).unwrap();
        let lot = &ledger.lots()[0];

        assert_eq!(lot.week, None);
        assert_eq!(lot.date_created, NaiveDate::from_ymd_opt(2025, 1, 13));
    }

    #[test]
    fn test_decode_skips_blank_rows() {
        let text = "ID,Branch,LoteNum\n,,\nL1-FSM,FSM,1\n";
        assert_eq!(decode(text).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_reports_row_and_column() {
        let text = "ID,Branch,LoteNum\nL1-FSM,FSM,1\nL2-XX,XX,2\n";
        match decode(text).unwrap_err() {
            LedgerError::InvalidField { row, column, value, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "Branch");
                assert_eq!(value, "XX");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rejects_non_numeric_lot_number() {
        let text = "Branch,LoteNum\nFSM,abc\n";
        assert!(matches!(
            decode(text),
            Err(LedgerError::InvalidField { column: "LoteNum", .. })
        ));
    }

    #[test]
    fn test_count_data_rows() {
        assert_eq!(count_data_rows(""), 0);
        assert_eq!(count_data_rows("ID,Branch,LoteNum\n"), 0);
        assert_eq!(count_data_rows("ID,Branch,LoteNum\n,,\n"), 0);
        assert_eq!(count_data_rows("ID,Branch,LoteNum\nL1-FSM,FSM,1\n,,\nL2-FSM,FSM,2\n"), 2);
    }
}
