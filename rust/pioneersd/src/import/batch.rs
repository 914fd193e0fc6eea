use crate::records::{Collection, Row};
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub batches: usize,
    pub errors: Vec<String>,
}

/// Insert `rows` in sequential chunks of `chunk_size`. A rejected chunk is
/// recorded and skipped; later chunks still run. Only accepted chunks count
/// towards `inserted`.
pub fn insert_in_chunks(
    store: &dyn RecordStore,
    collection: Collection,
    rows: &[Row],
    chunk_size: usize,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (k, chunk) in rows.chunks(chunk_size.max(1)).enumerate() {
        outcome.batches += 1;
        let start = k * chunk_size.max(1);
        match store.insert_batch(collection, chunk) {
            Ok(_) => outcome.inserted += chunk.len(),
            Err(e) => {
                tracing::warn!(
                    table = collection.table(),
                    batch = k + 1,
                    size = chunk.len(),
                    "batch insert rejected: {}",
                    e
                );
                outcome.errors.push(format!(
                    "batch {} (records {}-{}): {}",
                    k + 1,
                    start + 1,
                    start + chunk.len(),
                    e
                ));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn characters(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                json!({ "last_name": format!("Name {i}"), "main_character": false })
                    .as_object()
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }

    #[test]
    fn twelve_hundred_rows_go_out_in_three_calls() {
        let store = MemoryStore::new();
        let out = insert_in_chunks(&store, Collection::Characters, &characters(1200), 500);
        assert_eq!(store.insert_calls(), vec![500, 500, 200]);
        assert_eq!(out.batches, 3);
        assert_eq!(out.inserted, 1200);
        assert!(out.errors.is_empty());
        assert_eq!(store.count(Collection::Characters), 1200);
    }

    #[test]
    fn rejected_chunk_is_reported_and_not_counted() {
        let store = MemoryStore::new().rejecting(1);
        let out = insert_in_chunks(&store, Collection::Characters, &characters(1200), 500);
        assert_eq!(store.insert_calls(), vec![500, 500, 200]);
        assert_eq!(out.inserted, 700);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].starts_with("batch 2 (records 501-1000)"), "{}", out.errors[0]);
        assert_eq!(store.count(Collection::Characters), 700);
    }

    #[test]
    fn empty_input_issues_no_calls() {
        let store = MemoryStore::new();
        let out = insert_in_chunks(&store, Collection::Towns, &[], 500);
        assert_eq!(out, BatchOutcome::default());
        assert!(store.insert_calls().is_empty());
    }
}
