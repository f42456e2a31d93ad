use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier attached to every record written to a sink.
///
/// Ids are only required to be stable within a single job; cross-run
/// stability is not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ElementId {
    fn from(value: String) -> Self {
        ElementId(value)
    }
}

impl From<&str> for ElementId {
    fn from(value: &str) -> Self {
        ElementId(value.to_owned())
    }
}

/// Behavior the pipeline needs from a record type beyond moving it around:
/// an optional stable identifier carried by the record itself.
///
/// Records without a natural id keep the default; the producer then derives
/// one from the batch continuation.
pub trait Element {
    /// Returns the record's own id, when it carries one.
    fn element_id(&self) -> Option<ElementId> {
        None
    }
}

impl Element for String {}

impl Element for serde_json::Value {
    /// JSON records carry their id in the `Id` field, matching the contract
    /// of transform endpoints.
    fn element_id(&self) -> Option<ElementId> {
        self.get("Id").map(id_from_value)
    }
}

/// Converts an id-bearing JSON value into an [`ElementId`]: strings are used
/// as-is, anything else through its JSON text.
pub(crate) fn id_from_value(value: &serde_json::Value) -> ElementId {
    match value {
        serde_json::Value::String(text) => ElementId::from(text.as_str()),
        other => ElementId::from(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_value_id_from_string_field() {
        let record = json!({"Id": "user-7", "name": "ada"});
        assert_eq!(record.element_id(), Some(ElementId::from("user-7")));
    }

    #[test]
    fn json_value_id_from_numeric_field() {
        let record = json!({"Id": 7});
        assert_eq!(record.element_id(), Some(ElementId::from("7")));
    }

    #[test]
    fn json_value_without_id_field() {
        let record = json!({"name": "ada"});
        assert_eq!(record.element_id(), None);
    }

    #[test]
    fn strings_carry_no_id() {
        assert_eq!("hello".to_string().element_id(), None);
    }
}
