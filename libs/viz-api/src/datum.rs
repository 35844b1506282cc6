use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

/// A node of a response tree: properties keyed by interned string index,
/// plus ordered children.
///
/// Wire form is `[[[key, Value], ...], [Datum, ...]]`, properties ascending
/// by key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Datum {
    pub properties: BTreeMap<i64, Value>,
    pub children: Vec<Datum>,
}

impl Datum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let props: Vec<(&i64, &Value)> = self.properties.iter().collect();
        (props, &self.children).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Datum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (props, children): (Vec<(i64, Value)>, Vec<Datum>) =
            Deserialize::deserialize(deserializer)?;
        // Repeated keys: last one wins.
        Ok(Datum {
            properties: props.into_iter().collect(),
            children,
        })
    }
}
