// Catalog merge
//
// Combines the filesystem scan output with annotation-derived query records
// into one document. The merge is append-only at query granularity: an
// annotation entry lands under its own category/subconcept without touching
// unrelated entries, and re-merging the same sources does not duplicate.

use crate::catalog::{CatalogDocument, QueryRecord};

/// A query record carried together with its destination in the hierarchy.
#[derive(Debug, Clone)]
pub struct PlacedQuery {
    pub category: String,
    pub subconcept: String,
    pub record: QueryRecord,
}

/// Merge annotation-derived queries into the freshly scanned document.
pub fn combine(mut scanned: CatalogDocument, annotations: Vec<PlacedQuery>) -> CatalogDocument {
    for placed in annotations {
        scanned.upsert_query(&placed.category, &placed.subconcept, placed.record);
    }
    scanned
}

/// Fold a fresh document over a previously persisted one.
///
/// Every fresh entry replaces its stale counterpart (same folder key and
/// annotation flag); entries the fresh document does not mention are kept.
pub fn fold_into_previous(previous: CatalogDocument, fresh: CatalogDocument) -> CatalogDocument {
    let mut merged = previous;
    for (category, subconcepts) in fresh.categories {
        for (subconcept, entry) in subconcepts {
            for record in entry.queries {
                merged.upsert_query(&category, &subconcept, record);
            }
        }
    }
    merged
}
