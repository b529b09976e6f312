//! PC Build Configurator
//!
//! The configurator owns one build session: which part sits in which slot.
//! It is the only place that enforces compatibility between slots.
//!
//! # Design Principles
//!
//! - **Owned state**: the build lives in a `Configurator` value held by the
//!   caller, never in a global
//! - **Declared edges**: invalidation follows each slot's `depends_on` edge
//!   rather than special-casing CPU and motherboard
//! - **Downstream only**: selecting a slot can clear the slots that depend
//!   on it, never the slot it depends on
//! - **Lookups are read-only**: listing candidates takes `&self`, so a failed
//!   or abandoned lookup cannot corrupt the build
//!
//! # Slot Lifecycle
//!
//! ```text
//! Unselected ──select──▶ Selected ──select──▶ Selected'
//!      ▲                    │
//!      └── upstream change, clear, finish, reset
//! ```

use crate::cart::{CartError, CartItem, CartSink};
use crate::catalog::{CatalogLookup, LookupError, Part};
use crate::money::Price;
use crate::slots::{SlotDefinition, SlotId, SlotTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use thiserror::Error;

/// Errors returned by configurator operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfiguratorError {
    /// The slot id is not part of this configurator's slot table
    #[error("Unknown slot '{slot}'")]
    InvalidSlot { slot: String },

    /// The catalog could not be queried; the build is unchanged
    #[error("Could not load parts for {slot} (category '{category}'): {message}")]
    LookupFailed {
        slot: SlotId,
        category: String,
        message: String,
    },

    /// `finish` was called before anything was selected
    #[error("Build is empty: select at least one part before finishing")]
    EmptyBuild,

    /// Rejected by select-time validation
    #[error("{part_id} cannot be placed in {slot}: {reason}")]
    IncompatibleSelection {
        slot: SlotId,
        part_id: String,
        reason: String,
    },

    /// All-or-nothing handoff aborted and rolled back
    #[error("Cart rejected {part_id} from {slot} ({reason}); nothing was added")]
    CartRejected {
        slot: SlotId,
        part_id: String,
        reason: CartError,
    },
}

impl ConfiguratorError {
    fn invalid_slot(slot: &str) -> Self {
        Self::InvalidSlot {
            slot: slot.to_string(),
        }
    }
}

/// How `finish` treats a cart that refuses some parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishMode {
    /// Add every part independently; keep the ones the cart refused
    #[default]
    BestEffort,
    /// Stop at the first refusal and take back what was already added
    AllOrNothing,
}

/// Tunables for a configurator session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfiguratorOptions {
    /// Re-check stock and compatibility on `select` instead of trusting the
    /// caller to pass a part from `list_candidates`
    pub validate_on_select: bool,
    pub finish_mode: FinishMode,
}

/// Current per-slot selections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildState {
    selections: BTreeMap<SlotId, Part>,
}

impl BuildState {
    pub fn get(&self, slot: &str) -> Option<&Part> {
        self.selections.get(slot)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.selections.contains_key(slot)
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Selections keyed by slot id (id order, not build order)
    pub fn iter(&self) -> impl Iterator<Item = (&SlotId, &Part)> {
        self.selections.iter()
    }
}

/// The dependency filter applied while listing candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityFilter {
    /// Upstream slot providing the key
    pub depends_on: SlotId,
    /// Key as written on the upstream part, trimmed
    pub key: String,
}

/// One selectable part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub part: Part,
    /// The part is the slot's current selection
    pub current: bool,
}

/// Why a candidate list is empty, if it is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Available,
    /// Nothing in the category is in stock
    NoStock,
    /// Parts are in stock but none match the upstream compatibility key
    NoCompatibleCandidates,
}

/// Result of `list_candidates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    pub slot: SlotId,
    pub candidates: Vec<Candidate>,
    pub filter: Option<CompatibilityFilter>,
    /// In-stock parts before compatibility filtering
    pub in_stock: usize,
}

impl CandidateList {
    pub fn status(&self) -> CandidateStatus {
        if !self.candidates.is_empty() {
            CandidateStatus::Available
        } else if self.in_stock > 0 {
            CandidateStatus::NoCompatibleCandidates
        } else {
            CandidateStatus::NoStock
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn find(&self, part_id: &str) -> Option<&Part> {
        self.candidates
            .iter()
            .map(|c| &c.part)
            .find(|part| part.id == part_id)
    }
}

/// A selection removed as a side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub slot: SlotId,
    pub part: Part,
}

/// Result of `select`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOutcome {
    pub slot: SlotId,
    /// Part previously held by the slot, if any
    pub replaced: Option<Part>,
    /// Downstream selections cleared by this change, in cascade order
    pub cleared: Vec<Invalidation>,
}

impl SelectOutcome {
    /// True when the user should be told that other slots were deselected
    pub fn invalidated(&self) -> bool {
        !self.cleared.is_empty()
    }
}

/// One line of the build summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub slot: SlotId,
    pub title: String,
    pub part_id: String,
    pub name: String,
    pub price: Price,
}

/// Snapshot of the build for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub total: Price,
    pub selected: usize,
    /// Selected slots in slot-table order
    pub rows: Vec<SummaryRow>,
    pub can_finish: bool,
}

/// A part the cart refused during `finish`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{part_id} ({slot}) was not added to the cart: {reason}")]
pub struct CartSinkFailure {
    pub slot: SlotId,
    pub part_id: String,
    pub reason: CartError,
}

/// Outcome of `finish`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishReport {
    pub added: Vec<(SlotId, CartItem)>,
    pub failures: Vec<CartSinkFailure>,
}

impl FinishReport {
    /// Every selected part reached the cart
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One build session over a fixed slot table.
///
/// # Example
///
/// ```
/// use rigbuild::catalog::Part;
/// use rigbuild::configurator::Configurator;
/// use rigbuild::money::Price;
///
/// let mut build = Configurator::standard();
/// let am5 = Part::new("cpu-1", "Ryzen 7", Price::from_cents(29999), 3).with_key("AM5");
/// let board = Part::new("mb-1", "B650", Price::from_cents(17999), 2).with_key("AM5");
/// let intel = Part::new("cpu-2", "Core i7", Price::from_cents(37999), 1).with_key("LGA1700");
///
/// build.select("cpu", am5).unwrap();
/// build.select("motherboard", board).unwrap();
///
/// // Switching sockets drops the motherboard
/// let outcome = build.select("cpu", intel).unwrap();
/// assert!(outcome.invalidated());
/// assert!(!build.build_state().contains("motherboard"));
/// ```
#[derive(Debug, Clone)]
pub struct Configurator {
    slots: SlotTable,
    state: BuildState,
    options: ConfiguratorOptions,
}

impl Default for Configurator {
    fn default() -> Self {
        Self::standard()
    }
}

impl Configurator {
    pub fn new(slots: SlotTable) -> Self {
        Self::with_options(slots, ConfiguratorOptions::default())
    }

    pub fn with_options(slots: SlotTable, options: ConfiguratorOptions) -> Self {
        Self {
            slots,
            state: BuildState::default(),
            options,
        }
    }

    /// Configurator over the storefront's seven standard slots
    pub fn standard() -> Self {
        Self::new(SlotTable::standard())
    }

    #[inline]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    #[inline]
    pub fn build_state(&self) -> &BuildState {
        &self.state
    }

    #[inline]
    pub fn options(&self) -> ConfiguratorOptions {
        self.options
    }

    fn slot(&self, slot: &str) -> Result<&SlotDefinition, ConfiguratorError> {
        self.slots
            .get(slot)
            .ok_or_else(|| ConfiguratorError::invalid_slot(slot))
    }

    /// The filter a slot's candidates are subject to right now, if any.
    ///
    /// Only active when the upstream slot holds a part with a non-blank key.
    pub fn active_filter(
        &self,
        slot: &str,
    ) -> Result<Option<CompatibilityFilter>, ConfiguratorError> {
        let def = self.slot(slot)?;
        Ok(def.depends_on.as_ref().and_then(|upstream| {
            self.state
                .get(upstream.as_str())
                .and_then(Part::compatibility_key)
                .map(|key| CompatibilityFilter {
                    depends_on: upstream.clone(),
                    key: key.to_string(),
                })
        }))
    }

    /// Query the catalog for a slot's category and filter the result.
    ///
    /// # Errors
    ///
    /// - `InvalidSlot` if the slot is not in the table
    /// - `LookupFailed` if the catalog query fails
    pub fn list_candidates<L>(
        &self,
        slot: &str,
        lookup: &L,
    ) -> Result<CandidateList, ConfiguratorError>
    where
        L: CatalogLookup + ?Sized,
    {
        let def = self.slot(slot)?;
        tracing::debug!("Listing candidates for {} (category '{}')", def.id, def.category);
        let fetched = lookup.query(&def.category);
        self.candidates_from(slot, fetched)
    }

    /// Filter an already-fetched lookup result for a slot.
    ///
    /// This is the second half of `list_candidates`, split out so lookups can
    /// run elsewhere (see `lookup_executor`) and be applied when they arrive.
    pub fn candidates_from(
        &self,
        slot: &str,
        fetched: Result<Vec<Part>, LookupError>,
    ) -> Result<CandidateList, ConfiguratorError> {
        let def = self.slot(slot)?;
        let parts = fetched.map_err(|e| {
            tracing::warn!("Catalog lookup for {} failed: {}", def.id, e);
            ConfiguratorError::LookupFailed {
                slot: def.id.clone(),
                category: def.category.clone(),
                message: e.to_string(),
            }
        })?;

        let in_stock: Vec<Part> = parts.into_iter().filter(Part::in_stock).collect();
        let in_stock_count = in_stock.len();
        let filter = self.active_filter(slot)?;
        let current_id = self.state.get(slot).map(|part| part.id.as_str());

        let candidates: Vec<Candidate> = in_stock
            .into_iter()
            .filter(|part| filter.as_ref().is_none_or(|f| part.matches_key(&f.key)))
            .map(|part| Candidate {
                current: current_id == Some(part.id.as_str()),
                part,
            })
            .collect();

        if candidates.is_empty() && in_stock_count > 0 {
            if let Some(f) = &filter {
                tracing::info!(
                    "No {} candidates match {} key '{}' ({} in stock)",
                    def.id,
                    f.depends_on,
                    f.key,
                    in_stock_count
                );
            }
        }

        Ok(CandidateList {
            slot: def.id.clone(),
            candidates,
            filter,
            in_stock: in_stock_count,
        })
    }

    /// Put `part` into `slot`, clearing downstream selections it breaks.
    ///
    /// A dependent slot keeps its part only if the part's key equals the new
    /// part's key (trimmed, case-insensitive, absent equal to absent).
    /// Anything cleared cascades further down its own dependents.
    ///
    /// # Errors
    ///
    /// - `InvalidSlot` if the slot is not in the table
    /// - `IncompatibleSelection` if `validate_on_select` is enabled and the
    ///   part is out of stock or does not match its upstream key
    pub fn select(&mut self, slot: &str, part: Part) -> Result<SelectOutcome, ConfiguratorError> {
        let slot_id = self.slot(slot)?.id.clone();

        if self.options.validate_on_select {
            self.check_selectable(&slot_id, &part)?;
        }

        tracing::info!("Selected {} for {}", part.id, slot_id);
        let replaced = self.state.selections.insert(slot_id.clone(), part);

        let mut cleared = Vec::new();
        self.cascade_from(&slot_id, &mut cleared);

        Ok(SelectOutcome {
            slot: slot_id,
            replaced,
            cleared,
        })
    }

    /// Remove a slot's selection along with every downstream selection made
    /// against it. Returns everything removed, the slot itself first.
    pub fn clear(&mut self, slot: &str) -> Result<Vec<Invalidation>, ConfiguratorError> {
        let slot_id = self.slot(slot)?.id.clone();

        let mut removed = Vec::new();
        if let Some(part) = self.state.selections.remove(&slot_id) {
            tracing::info!("Cleared {} from {}", part.id, slot_id);
            removed.push(Invalidation {
                slot: slot_id.clone(),
                part,
            });
            self.cascade_from(&slot_id, &mut removed);
        }
        Ok(removed)
    }

    fn check_selectable(&self, slot: &SlotId, part: &Part) -> Result<(), ConfiguratorError> {
        if !part.in_stock() {
            return Err(ConfiguratorError::IncompatibleSelection {
                slot: slot.clone(),
                part_id: part.id.clone(),
                reason: "out of stock".to_string(),
            });
        }
        if let Some(filter) = self.active_filter(slot.as_str())? {
            if !part.matches_key(&filter.key) {
                return Err(ConfiguratorError::IncompatibleSelection {
                    slot: slot.clone(),
                    part_id: part.id.clone(),
                    reason: format!("does not match {} key '{}'", filter.depends_on, filter.key),
                });
            }
        }
        Ok(())
    }

    // Walks dependents of `upstream`. A dependent survives only while its
    // upstream is selected with an equal key.
    fn cascade_from(&mut self, upstream: &SlotId, cleared: &mut Vec<Invalidation>) {
        let anchor = self
            .state
            .get(upstream.as_str())
            .map(Part::normalized_key);
        let dependents: Vec<SlotId> = self
            .slots
            .dependents_of(upstream.as_str())
            .map(|def| def.id.clone())
            .collect();

        for dependent in dependents {
            let Some(current) = self.state.get(dependent.as_str()) else {
                continue;
            };
            let keep = anchor
                .as_ref()
                .is_some_and(|key| current.normalized_key() == *key);
            if keep {
                continue;
            }

            if let Some(part) = self.state.selections.remove(&dependent) {
                tracing::info!(
                    "{} deselected: {} no longer matches {}",
                    dependent,
                    part.id,
                    upstream
                );
                cleared.push(Invalidation {
                    slot: dependent.clone(),
                    part,
                });
                self.cascade_from(&dependent, cleared);
            }
        }
    }

    /// Selected parts in slot-table order
    pub fn selections(&self) -> impl Iterator<Item = (&SlotDefinition, &Part)> {
        self.slots
            .iter()
            .filter_map(|def| self.state.get(def.id.as_str()).map(|part| (def, part)))
    }

    pub fn compute_summary(&self) -> BuildSummary {
        let rows: Vec<SummaryRow> = self
            .selections()
            .map(|(def, part)| SummaryRow {
                slot: def.id.clone(),
                title: def.title.clone(),
                part_id: part.id.clone(),
                name: part.name.clone(),
                price: part.price,
            })
            .collect();

        BuildSummary {
            total: rows.iter().map(|row| row.price).sum(),
            selected: rows.len(),
            can_finish: !rows.is_empty(),
            rows,
        }
    }

    /// Hand every selected part to `sink`, one unit each, in slot order.
    ///
    /// In `BestEffort` mode each part is added independently: parts the sink
    /// accepted leave the build, parts it refused stay selected and are listed
    /// in the report. A fully accepted build leaves the configurator empty.
    ///
    /// In `AllOrNothing` mode the first refusal removes everything added by
    /// this call from the sink and returns `CartRejected`; the build is kept.
    ///
    /// # Errors
    ///
    /// - `EmptyBuild` if nothing is selected (the sink is not called)
    /// - `CartRejected` in `AllOrNothing` mode
    pub fn finish<S>(&mut self, sink: &mut S) -> Result<FinishReport, ConfiguratorError>
    where
        S: CartSink + ?Sized,
    {
        if self.state.is_empty() {
            return Err(ConfiguratorError::EmptyBuild);
        }

        let items: Vec<(SlotId, CartItem)> = self
            .selections()
            .map(|(def, part)| (def.id.clone(), part.to_cart_item()))
            .collect();

        let report = match self.options.finish_mode {
            FinishMode::BestEffort => self.finish_best_effort(items, sink),
            FinishMode::AllOrNothing => self.finish_all_or_nothing(items, sink)?,
        };

        tracing::info!(
            "Build handed to cart: {} added, {} refused",
            report.added.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn finish_best_effort<S>(
        &mut self,
        items: Vec<(SlotId, CartItem)>,
        sink: &mut S,
    ) -> FinishReport
    where
        S: CartSink + ?Sized,
    {
        let mut report = FinishReport::default();
        for (slot, item) in items {
            match sink.add(&item, 1) {
                Ok(()) => {
                    self.state.selections.remove(&slot);
                    report.added.push((slot, item));
                }
                Err(reason) => {
                    tracing::warn!("Cart refused {} from {}: {}", item.id, slot, reason);
                    report.failures.push(CartSinkFailure {
                        slot,
                        part_id: item.id,
                        reason,
                    });
                }
            }
        }
        report
    }

    fn finish_all_or_nothing<S>(
        &mut self,
        items: Vec<(SlotId, CartItem)>,
        sink: &mut S,
    ) -> Result<FinishReport, ConfiguratorError>
    where
        S: CartSink + ?Sized,
    {
        let mut added: Vec<(SlotId, CartItem)> = Vec::with_capacity(items.len());
        for (slot, item) in items {
            if let Err(reason) = sink.add(&item, 1) {
                for (_, done) in added.iter().rev() {
                    if let Err(e) = sink.remove(&done.id, 1) {
                        tracing::error!("Failed to roll back {} from cart: {}", done.id, e);
                    }
                }
                return Err(ConfiguratorError::CartRejected {
                    slot,
                    part_id: item.id,
                    reason,
                });
            }
            added.push((slot, item));
        }

        self.state.selections.clear();
        Ok(FinishReport {
            added,
            failures: Vec::new(),
        })
    }

    /// Discard every selection
    pub fn reset(&mut self) {
        self.state.selections.clear();
    }
}
