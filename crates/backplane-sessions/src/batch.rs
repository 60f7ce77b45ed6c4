//! `splitIngestBatchForDO` (spec §8 round-trip law): chunk a batch of ingest
//! items for forwarding to a per-session actor, dropping only items whose
//! individually serialized JSON exceeds a per-item byte cap.
//!
//! The per-item cap (`MAX_INGEST_ITEM_BYTES`) and per-chunk cap
//! (`MAX_INGEST_BATCH_BYTES`) aren't named by a concrete number anywhere in
//! the surviving spec text; chosen here as a conservative single-DO-call
//! budget and documented as a decision in DESIGN.md rather than guessed at
//! the call site.

use crate::types::{Item, ToolPart, ToolStatus};

/// Per-item serialized-JSON size cap; oversized items are dropped rather
/// than forwarded, so one malformed item can't block the whole stream.
pub const MAX_INGEST_ITEM_BYTES: usize = 32 * 1024;

/// Per-chunk cumulative size cap, so a single forwarded batch stays within
/// a reasonable request size for the per-session actor's ingest call.
pub const MAX_INGEST_BATCH_BYTES: usize = 256 * 1024;

pub struct SplitResult {
    pub chunks: Vec<Vec<Item>>,
    /// Count of items dropped for exceeding `MAX_INGEST_ITEM_BYTES`.
    pub dropped: usize,
}

/// Splits `items` into order-preserving chunks no larger than
/// `max_batch_bytes`, dropping only items whose own serialized size exceeds
/// `max_item_bytes`. Concatenating `chunks` back together yields exactly the
/// input with oversized items removed, in original order.
pub fn split_ingest_batch_for_do(
    items: Vec<Item>,
    max_item_bytes: usize,
    max_batch_bytes: usize,
) -> SplitResult {
    let mut chunks: Vec<Vec<Item>> = Vec::new();
    let mut current: Vec<Item> = Vec::new();
    let mut current_bytes = 0usize;
    let mut dropped = 0usize;

    for item in items {
        let size = serde_json::to_vec(&item).map(|v| v.len()).unwrap_or(usize::MAX);
        if size > max_item_bytes {
            dropped += 1;
            continue;
        }
        if !current.is_empty() && current_bytes + size > max_batch_bytes {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(item);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    SplitResult { chunks, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session_item() -> Item {
        Item::Session { created: Utc::now(), updated: Utc::now() }
    }

    #[test]
    fn concatenated_chunks_preserve_order_excluding_only_oversized_items() {
        let items: Vec<Item> = (0..5).map(|_| session_item()).collect();
        let result = split_ingest_batch_for_do(items.clone(), MAX_INGEST_ITEM_BYTES, MAX_INGEST_BATCH_BYTES);
        let flattened: Vec<Item> = result.chunks.into_iter().flatten().collect();
        assert_eq!(
            serde_json::to_string(&flattened).unwrap(),
            serde_json::to_string(&items).unwrap()
        );
        assert_eq!(result.dropped, 0);
    }

    #[test]
    fn oversized_item_is_dropped_and_neighbors_survive_in_order() {
        let small_a = session_item();
        let small_b = session_item();
        let huge = Item::ToolPart(ToolPart {
            tool: "big".into(),
            status: ToolStatus::Completed,
            input: serde_json::json!({ "padding": "x".repeat(MAX_INGEST_ITEM_BYTES + 1) }),
        });
        let items = vec![small_a.clone(), huge, small_b.clone()];

        let result = split_ingest_batch_for_do(items, MAX_INGEST_ITEM_BYTES, MAX_INGEST_BATCH_BYTES);
        assert_eq!(result.dropped, 1);
        let flattened: Vec<Item> = result.chunks.into_iter().flatten().collect();
        assert_eq!(flattened.len(), 2);
        assert_eq!(serde_json::to_string(&flattened[0]).unwrap(), serde_json::to_string(&small_a).unwrap());
        assert_eq!(serde_json::to_string(&flattened[1]).unwrap(), serde_json::to_string(&small_b).unwrap());
    }

    #[test]
    fn chunk_boundaries_respect_the_batch_byte_cap() {
        let items: Vec<Item> = (0..10).map(|_| session_item()).collect();
        let item_size = serde_json::to_vec(&items[0]).unwrap().len();
        let small_batch_cap = item_size * 3;

        let result = split_ingest_batch_for_do(items.clone(), MAX_INGEST_ITEM_BYTES, small_batch_cap);
        assert!(result.chunks.len() > 1);
        for chunk in &result.chunks {
            let chunk_bytes: usize = chunk.iter().map(|i| serde_json::to_vec(i).unwrap().len()).sum();
            assert!(chunk_bytes <= small_batch_cap);
        }
        let flattened: Vec<Item> = result.chunks.into_iter().flatten().collect();
        assert_eq!(
            serde_json::to_string(&flattened).unwrap(),
            serde_json::to_string(&items).unwrap()
        );
    }
}
