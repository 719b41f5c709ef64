// crates/transfer-mesh-core/tests/filter_props.rs
// ============================================================================
// Module: Filter Property Tests
// Description: Randomized checks of catalog filter semantics.
// Purpose: Keep in-memory matching and SQL predicates in agreement.
// Dependencies: transfer-mesh-core, proptest
// ============================================================================

//! ## Overview
//! For arbitrary entries and every subset of filter fields, an entry matches
//! exactly when each non-empty field equals the entry's value, and the records
//! query binds exactly those non-empty fields in file, block, dataset order.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use proptest::prelude::*;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::RecordsQuery;
use transfer_mesh_core::SqlDialect;
use transfer_mesh_core::TransferRequest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an entry from small name indices so filters collide often.
fn entry(dataset: usize, block: usize, file: usize) -> CatalogEntry {
    CatalogEntry {
        lfn: format!("/store/file{file}.root"),
        pfn: format!("/data/file{file}.root"),
        dataset: format!("/prim{dataset}/proc/tier"),
        block: format!("/prim{dataset}/proc/tier#{block}"),
        bytes: 1,
        hash: "00".to_string(),
    }
}

/// Picks the filter value for one field: empty when unused, else a name
/// that equals the entry's value when `same` holds.
fn pick(used: bool, same: bool, actual: &str) -> String {
    match (used, same) {
        (false, _) => String::new(),
        (true, true) => actual.to_string(),
        (true, false) => format!("{actual}-other"),
    }
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn matches_agrees_with_field_equality(
        dataset in 0_usize..3,
        block in 0_usize..3,
        file in 0_usize..3,
        used in proptest::array::uniform3(any::<bool>()),
        same in proptest::array::uniform3(any::<bool>()),
    ) {
        let entry = entry(dataset, block, file);
        let filter = TransferRequest::filter(
            &pick(used[0], same[0], &entry.dataset),
            &pick(used[1], same[1], &entry.block),
            &pick(used[2], same[2], &entry.lfn),
        );
        let expected = (0..3).all(|field| !used[field] || same[field]);
        prop_assert_eq!(entry.matches(&filter), expected);
    }

    #[test]
    fn records_query_binds_only_non_empty_fields(
        dataset in proptest::option::of("[a-z]{1,6}"),
        block in proptest::option::of("[a-z]{1,6}"),
        file in proptest::option::of("[a-z]{1,6}"),
    ) {
        let filter = TransferRequest::filter(
            dataset.as_deref().unwrap_or_default(),
            block.as_deref().unwrap_or_default(),
            file.as_deref().unwrap_or_default(),
        );
        let expected: Vec<&str> =
            [&file, &block, &dataset].into_iter().filter_map(|value| value.as_deref()).collect();
        for dialect in [SqlDialect::SQLITE, SqlDialect::POSTGRES, SqlDialect::ORACLE] {
            let query = RecordsQuery::build(&dialect, &filter);
            prop_assert_eq!(query.values(), expected.clone());
            prop_assert_eq!(query.sql.contains(" WHERE "), !expected.is_empty());
            prop_assert_eq!(query.sql.matches(" AND ").count(), expected.len().saturating_sub(1));
        }
    }
}
