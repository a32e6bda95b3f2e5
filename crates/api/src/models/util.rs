use serde::{Deserialize, Deserializer, Serializer};
use std::sync::Arc;

pub mod serde_arc_str {
    use super::*;

    pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

/// Serializes any collection of `Arc<str>` as a string sequence.
pub mod serde_arc_str_seq {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<'a, S, C>(items: &'a C, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        &'a C: IntoIterator<Item = &'a Arc<str>>,
    {
        let iter = items.into_iter();
        let mut seq = serializer.serialize_seq(None)?;
        for item in iter {
            seq.serialize_element(item.as_ref())?;
        }
        seq.end()
    }
}
