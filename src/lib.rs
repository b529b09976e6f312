//! rigbuild library
//!
//! Core of the PC build configurator: the slot table, the selection engine
//! with its compatibility cascade, and the catalog and cart seams it talks to.

pub mod cart;
pub mod catalog;
pub mod cli;
pub mod config_file;
pub mod configurator;
pub mod error;
pub mod lookup_executor;
pub mod money;
pub mod picker;
pub mod slots;

// Re-export main types for convenience
pub use cart::{CartError, CartItem, CartSink, FileCart};
pub use catalog::{CatalogLookup, JsonCatalog, LookupError, Part, TimedLookup};
pub use config_file::BuilderConfig;
pub use configurator::{
    BuildState, BuildSummary, CandidateList, CandidateStatus, Configurator, ConfiguratorError,
    ConfiguratorOptions, FinishMode, FinishReport, SelectOutcome,
};
pub use error::RigError;
pub use lookup_executor::{LookupRequest, LookupResponse, LookupWorker};
pub use money::Price;
pub use picker::PickerSession;
pub use slots::{SlotDefinition, SlotId, SlotTable, StandardSlot};
