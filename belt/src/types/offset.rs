use serde::Serialize;

/// Position reached by a partition after producing a batch.
///
/// The serialized form feeds the batch continuation id, so two batches of the
/// same partition ending at the same offset share an id. Each source picks
/// the variant matching its pagination scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Offset {
    /// Count of records consumed so far.
    Index(u64),
    /// Byte position within the partition's backing store.
    Bytes(u64),
    /// Last primary-key value seen by a keyset-paginated reader.
    Key(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_serializes_as_number() {
        let text = serde_json::to_string(&Offset::Index(42)).unwrap();
        assert_eq!(text, "42");
    }

    #[test]
    fn key_serializes_as_value() {
        let text = serde_json::to_string(&Offset::Key(serde_json::json!("pk-9"))).unwrap();
        assert_eq!(text, "\"pk-9\"");
    }
}
