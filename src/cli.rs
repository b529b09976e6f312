use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::CatalogLookup;
use crate::configurator::{Configurator, SelectOutcome};
use crate::error::RigError;
use crate::slots::SlotId;

/// rigbuild - PC build configurator
#[derive(Parser)]
#[command(name = "rigbuild")]
#[command(about = "Assemble a compatible PC build from a parts catalog")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog file, overriding the configuration
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Cart file, overriding the configuration
    #[arg(long, global = true)]
    pub cart: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the build slots in order
    Slots,
    /// List in-stock, compatible parts for a slot
    Candidates {
        /// Slot to list (e.g. motherboard)
        slot: String,
        /// Earlier selections that constrain the list, as slot=part_id
        #[arg(short, long = "select")]
        selections: Vec<Selection>,
    },
    /// Apply selections in order and print the build summary
    Build {
        /// Selections to apply, as slot=part_id
        #[arg(short, long = "select")]
        selections: Vec<Selection>,
        /// Add the finished build to the cart
        #[arg(long)]
        finish: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
}

/// A `slot=part_id` pair from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub slot: SlotId,
    pub part_id: String,
}

impl FromStr for Selection {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (slot, part_id) = s
            .split_once('=')
            .ok_or_else(|| RigError::validation(format!("expected slot=part_id, got '{s}'")))?;
        let (slot, part_id) = (slot.trim(), part_id.trim());
        if slot.is_empty() || part_id.is_empty() {
            return Err(RigError::validation(format!(
                "slot and part id must be non-empty in '{s}'"
            )));
        }
        Ok(Self {
            slot: SlotId::new(slot),
            part_id: part_id.to_string(),
        })
    }
}

/// Select a part by id, the way a picker would: list the slot's candidates
/// and pick the matching one. Parts that are out of stock or filtered out by
/// an upstream selection cannot be chosen.
pub fn apply_selection<L>(
    configurator: &mut Configurator,
    lookup: &L,
    selection: &Selection,
) -> crate::error::Result<SelectOutcome>
where
    L: CatalogLookup + ?Sized,
{
    let candidates = configurator.list_candidates(selection.slot.as_str(), lookup)?;
    let part = candidates.find(&selection.part_id).cloned().ok_or_else(|| {
        RigError::validation(format!(
            "{} is not an available candidate for {} ({} of {} in-stock parts offered)",
            selection.part_id,
            selection.slot,
            candidates.candidates.len(),
            candidates.in_stock
        ))
    })?;
    Ok(configurator.select(selection.slot.as_str(), part)?)
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
