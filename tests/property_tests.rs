//! Property-based tests for rigbuild
//!
//! These tests verify:
//! - Socket compatibility holds after any sequence of picker-driven selections
//! - Build totals are the exact sum of the selected prices
//! - Price parsing accepts exactly the two-decimal, non-negative strings

use proptest::prelude::*;

use rigbuild::catalog::{CatalogLookup, LookupError, Part};
use rigbuild::configurator::Configurator;
use rigbuild::money::Price;

const SOCKETS: [&str; 4] = ["AM5", "am5", "LGA1700", "AM4"];

#[derive(Debug)]
struct GeneratedCatalog {
    cpus: Vec<Part>,
    boards: Vec<Part>,
    gpus: Vec<Part>,
}

impl CatalogLookup for GeneratedCatalog {
    fn query(&self, category: &str) -> Result<Vec<Part>, LookupError> {
        Ok(match category {
            "cpu" => self.cpus.clone(),
            "motherboard" => self.boards.clone(),
            "gpu" => self.gpus.clone(),
            _ => Vec::new(),
        })
    }
}

#[derive(Debug, Clone)]
enum Step {
    Pick { slot: &'static str, index: usize },
    Clear(&'static str),
}

fn part_strategy(prefix: &'static str, keyed: bool) -> impl Strategy<Value = Vec<Part>> {
    prop::collection::vec((0u64..200_000, 0u32..4, 0usize..SOCKETS.len()), 1..6).prop_map(
        move |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (cents, stock, socket))| {
                    let part = Part::new(
                        format!("{prefix}-{i}"),
                        format!("{prefix} {i}"),
                        Price::from_cents(cents),
                        stock,
                    );
                    if keyed { part.with_key(SOCKETS[socket]) } else { part }
                })
                .collect()
        },
    )
}

fn catalog_strategy() -> impl Strategy<Value = GeneratedCatalog> {
    (
        part_strategy("cpu", true),
        part_strategy("mb", true),
        part_strategy("gpu", false),
    )
        .prop_map(|(cpus, boards, gpus)| GeneratedCatalog { cpus, boards, gpus })
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (prop::sample::select(vec!["cpu", "motherboard", "gpu"]), 0usize..8)
            .prop_map(|(slot, index)| Step::Pick { slot, index }),
        1 => prop::sample::select(vec!["cpu", "motherboard", "gpu"]).prop_map(Step::Clear),
    ]
}

fn run(configurator: &mut Configurator, catalog: &GeneratedCatalog, step: &Step) {
    match step {
        Step::Pick { slot, index } => {
            let list = configurator.list_candidates(slot, catalog).unwrap();
            if list.candidates.is_empty() {
                return;
            }
            let part = list.candidates[index % list.candidates.len()].part.clone();
            configurator.select(slot, part).unwrap();
        }
        Step::Clear(slot) => {
            configurator.clear(slot).unwrap();
        }
    }
}

proptest! {
    /// A selected motherboard always matches the selected CPU's socket
    #[test]
    fn motherboard_matches_cpu(
        catalog in catalog_strategy(),
        steps in prop::collection::vec(step_strategy(), 1..30),
    ) {
        let mut configurator = Configurator::standard();
        for step in &steps {
            run(&mut configurator, &catalog, step);

            let state = configurator.build_state();
            if let (Some(cpu), Some(board)) = (state.get("cpu"), state.get("motherboard")) {
                prop_assert_eq!(cpu.normalized_key(), board.normalized_key());
            }
            // Nothing out of stock ever makes it into the build
            prop_assert!(state.iter().all(|(_, part)| part.stock_count > 0));
        }
    }

    /// The summary total is the exact sum of what is selected
    #[test]
    fn summary_total_is_exact_sum(
        catalog in catalog_strategy(),
        steps in prop::collection::vec(step_strategy(), 1..30),
    ) {
        let mut configurator = Configurator::standard();
        for step in &steps {
            run(&mut configurator, &catalog, step);
        }

        let summary = configurator.compute_summary();
        let expected: u64 = configurator
            .build_state()
            .iter()
            .map(|(_, part)| part.price.cents())
            .sum();
        prop_assert_eq!(summary.total.cents(), expected);
        prop_assert_eq!(summary.selected, configurator.build_state().len());
        prop_assert_eq!(summary.can_finish, summary.selected > 0);
    }

    /// Two-decimal strings parse to exactly the cents they spell
    #[test]
    fn price_parses_exact_cents(dollars in 0u64..1_000_000, cents in 0u64..100) {
        let parsed: Price = format!("{dollars}.{cents:02}").parse().unwrap();
        prop_assert_eq!(parsed.cents(), dollars * 100 + cents);
    }

    /// Negative and sub-cent prices never parse
    #[test]
    fn price_rejects_negative_and_sub_cent(dollars in 0u64..1_000, mills in 0u64..1_000) {
        let negative = format!("-{dollars}");
        let sub_cent = format!("{dollars}.{mills:03}");
        prop_assert!(negative.parse::<Price>().is_err());
        prop_assert!(sub_cent.parse::<Price>().is_err());
    }
}
