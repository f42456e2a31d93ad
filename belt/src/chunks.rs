//! Deterministic distribution of ordered items over reader chunks.

/// Splits `items` in order into chunks of size `max(len / num_chunks, 1)`,
/// with everything left over landing in the final chunk.
///
/// An empty input yields a single empty chunk; when there are fewer items
/// than requested chunks, each item gets a chunk of its own. Concatenating
/// the chunks always reproduces the input.
pub fn build_equal_chunks<I>(mut items: Vec<I>, num_chunks: usize) -> Vec<Vec<I>> {
    let chunk_size = (items.len() / num_chunks.max(1)).max(1);
    let mut chunks = Vec::with_capacity(items.len() / chunk_size + 1);
    while chunk_size < items.len() {
        let rest = items.split_off(chunk_size);
        chunks.push(items);
        items = rest;
    }
    chunks.push(items);
    chunks
}
