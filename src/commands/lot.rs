use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};

use lotes_core::ledger::{LotEdit, NewLot};
use lotes_core::{Branch, LedgerError, Location, LotChange, LotNumber, LotRecord, Stage};

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct LotCommand {
    #[command(subcommand)]
    pub command: LotSubcommand,
}

#[derive(Subcommand)]
pub enum LotSubcommand {
    /// Create a new lot
    Create {
        /// Site code (FSM, SMB, RP)
        #[arg(long)]
        branch: Branch,

        /// Lot number, or "auto" for the next free number in the branch
        #[arg(long, default_value = "auto", value_parser = parse_lot_number)]
        number: LotNumber,

        /// Stage (e.g. CLONADO, "VEG. TEMPRANO", FLORACIÓN)
        #[arg(long)]
        stage: Stage,

        /// Location (e.g. "CUARTO 1", VEGETATIVO, PT)
        #[arg(long)]
        location: Location,

        /// Week of the cycle (1-22)
        #[arg(long)]
        week: u8,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List lots
    List {
        /// Filter by site code
        #[arg(long)]
        branch: Option<Branch>,

        /// Filter by stage
        #[arg(long)]
        stage: Option<Stage>,

        /// Filter by location
        #[arg(long)]
        location: Option<Location>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a lot's details
    Show {
        /// Lot id (L3-FSM) or label (L3-FSM (CUARTO 1))
        selector: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change a lot's stage, location or week
    Edit {
        /// Lot id or label
        selector: String,

        #[arg(long)]
        stage: Option<Stage>,

        #[arg(long)]
        location: Option<Location>,

        /// Weeks 20 and 21 also move the lot to PT / SECADO
        #[arg(long)]
        week: Option<u8>,
    },

    /// Add plants of a variety to a lot
    AddVariety {
        /// Lot id or label
        selector: String,

        /// Variety name; an existing entry with this name is added to
        name: String,

        /// Number of plants
        count: u32,
    },

    /// Remove a variety from a lot
    RemoveVariety {
        /// Lot id or label
        selector: String,

        /// Variety name
        name: String,
    },

    /// Advance every running lot one week (once per calendar week)
    AdvanceWeeks,
}

fn parse_lot_number(s: &str) -> Result<LotNumber, String> {
    if s.trim().eq_ignore_ascii_case("auto") {
        return Ok(LotNumber::Auto);
    }
    match s.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(format!(
            "Invalid lot number '{}'. Use a positive number or 'auto'",
            s
        )),
        Ok(n) => Ok(LotNumber::Fixed(n)),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl LotCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let store = config.store();
        if store.active_path() == store.working_path() {
            eprintln!(
                "Note: uploads are blocked; using local working copy {}",
                store.working_path().display()
            );
        }

        let mut ledger = store.load_ledger()?;

        match &self.command {
            LotSubcommand::Create {
                branch,
                number,
                stage,
                location,
                week,
                notes,
            } => {
                let id = ledger.create_lot(
                    NewLot {
                        branch: *branch,
                        number: *number,
                        stage: Some(*stage),
                        location: Some(*location),
                        week: Some(*week),
                        notes: notes.trim().to_string(),
                    },
                    today(),
                )?;
                store.save_ledger(&ledger)?;

                println!("Created lot {}", id);
                Ok(())
            }

            LotSubcommand::List {
                branch,
                stage,
                location,
                format,
            } => {
                let lots = ledger.filter(*branch, *stage, *location);
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&lots)?);
                    }
                    OutputFormat::Text => print_lot_table(&lots),
                }
                Ok(())
            }

            LotSubcommand::Show { selector, format } => {
                let lot = ledger
                    .get(selector)
                    .ok_or_else(|| LedgerError::LotNotFound(selector.clone()))?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(lot)?);
                    }
                    OutputFormat::Text => print!("{}", lot),
                }
                Ok(())
            }

            LotSubcommand::Edit {
                selector,
                stage,
                location,
                week,
            } => {
                let changes = ledger.edit(
                    selector,
                    LotEdit {
                        stage: *stage,
                        location: *location,
                        week: *week,
                    },
                )?;

                if changes.is_empty() {
                    println!("No changes");
                    return Ok(());
                }
                store.save_ledger(&ledger)?;

                println!("Updated {}:", selector);
                for change in &changes {
                    println!("  {}", describe_change(change));
                }
                Ok(())
            }

            LotSubcommand::AddVariety {
                selector,
                name,
                count,
            } => {
                ledger.add_variety(selector, name, *count)?;
                store.save_ledger(&ledger)?;

                println!("Added {} x {} to {}", count, name.trim(), selector);
                Ok(())
            }

            LotSubcommand::RemoveVariety { selector, name } => {
                ledger.remove_variety(selector, name)?;
                store.save_ledger(&ledger)?;

                println!("Removed {} from {}", name, selector);
                Ok(())
            }

            LotSubcommand::AdvanceWeeks => {
                let advanced = ledger.advance_weeks(today());
                if advanced.is_empty() {
                    println!("No lots to advance this week");
                    return Ok(());
                }
                store.save_ledger(&ledger)?;

                println!("Advanced {} lot(s):", advanced.len());
                for step in &advanced {
                    println!(
                        "  {}: week {} -> {} ({})",
                        step.id,
                        step.from_week,
                        step.to_week,
                        step.to_stage.map_or("-".to_string(), |s| s.to_string())
                    );
                }
                Ok(())
            }
        }
    }
}

fn describe_change(change: &LotChange) -> String {
    match change {
        LotChange::Stage(stage) => format!("stage -> {}", stage),
        LotChange::Location(location) => format!("location -> {}", location),
        LotChange::Week(week) => format!("week -> {}", week),
    }
}

fn print_lot_table(lots: &[&LotRecord]) {
    if lots.is_empty() {
        println!("No lots found.");
        return;
    }

    println!(
        "{:<14} {:<14} {:<12} {:>5} {:>7}",
        "ID", "STAGE", "LOCATION", "WEEK", "PLANTS"
    );
    println!("{}", "-".repeat(56));

    for lot in lots {
        println!(
            "{:<14} {:<14} {:<12} {:>5} {:>7}",
            lot.id,
            lot.stage.map_or(String::new(), |s| s.to_string()),
            lot.location.map_or(String::new(), |l| l.to_string()),
            lot.week.map_or(String::new(), |w| w.to_string()),
            lot.total_plants()
        );
    }

    println!("\n{} lot(s)", lots.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lot_number() {
        assert_eq!(parse_lot_number("auto").unwrap(), LotNumber::Auto);
        assert_eq!(parse_lot_number("AUTO").unwrap(), LotNumber::Auto);
        assert_eq!(parse_lot_number("12").unwrap(), LotNumber::Fixed(12));
        assert!(parse_lot_number("0").is_err());
        assert!(parse_lot_number("twelve").is_err());
    }

    #[test]
    fn test_describe_change() {
        assert_eq!(
            describe_change(&LotChange::Location(Location::Finished)),
            "location -> PT"
        );
        assert_eq!(describe_change(&LotChange::Week(21)), "week -> 21");
    }
}
