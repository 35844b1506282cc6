use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::TimeDelta;

use crate::datum::Datum;
use crate::error::VizError;
use crate::response::Shared;
use crate::string_table::StringTable;
use crate::value::{Timestamp, Value, ValueTag};

// ═══════════════════════════════════════════════════════════════
//  Tree nodes under construction
// ═══════════════════════════════════════════════════════════════

pub(crate) type NodeRef = Arc<Mutex<Node>>;

#[derive(Debug, Default)]
pub(crate) struct Node {
    properties: BTreeMap<i64, Value>,
    children: Vec<NodeRef>,
}

fn lock(node: &NodeRef) -> MutexGuard<'_, Node> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot a node and its subtree.
pub(crate) fn render(node: &NodeRef) -> Datum {
    let (properties, children) = {
        let guard = lock(node);
        (guard.properties.clone(), guard.children.clone())
    };
    Datum {
        properties,
        children: children.iter().map(render).collect(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  PropertyWriter — what an update sees of one node
// ═══════════════════════════════════════════════════════════════

/// Mutable view of one node's properties, routing every string through the
/// response's string table.
pub struct PropertyWriter<'a> {
    properties: &'a mut BTreeMap<i64, Value>,
    strings: &'a StringTable,
}

impl<'a> PropertyWriter<'a> {
    pub fn intern(&self, s: &str) -> i64 {
        self.strings.intern(s)
    }

    /// Current value under `key`. Never interns.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.strings.lookup(key).and_then(|idx| self.properties.get(&idx))
    }

    /// Overwrite `key` with `value`.
    pub fn set(&mut self, key: &str, value: Value) {
        let idx = self.strings.intern(key);
        self.properties.insert(idx, value);
    }

    /// Store `value` as a string-index.
    pub fn set_string(&mut self, key: &str, value: &str) {
        let idx = self.strings.intern(key);
        let value = Value::StrIndex(self.strings.intern(value));
        self.properties.insert(idx, value);
    }

    /// Store `values` as a string-index list.
    pub fn set_strings<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let idx = self.strings.intern(key);
        let indices = values.into_iter().map(|v| self.strings.intern(v.as_ref())).collect();
        self.properties.insert(idx, Value::StrIndices(indices));
    }

    /// Append to the string-index list under `key`, creating it if absent.
    pub fn extend_strings<I, S>(&mut self, key: &str, values: I) -> Result<(), VizError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let idx = self.strings.intern(key);
        let indices: Vec<i64> =
            values.into_iter().map(|v| self.strings.intern(v.as_ref())).collect();
        match self.properties.get_mut(&idx) {
            None => {
                self.properties.insert(idx, Value::StrIndices(indices));
                Ok(())
            }
            Some(Value::StrIndices(existing)) => {
                existing.extend(indices);
                Ok(())
            }
            Some(other) => Err(VizError::type_mismatch(ValueTag::StrIndices, other.tag())
                .with_context(format!("extending property '{key}'"))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  PropertyUpdate
// ═══════════════════════════════════════════════════════════════

type UpdateFn = Box<dyn FnOnce(&mut PropertyWriter<'_>) -> Result<(), VizError> + Send>;

/// One composable change to a node's properties, or an injected error.
///
/// Updates are applied strictly in order by [`DatumBuilder::apply`]; the
/// first failure stops the rest of that call.
pub struct PropertyUpdate(Op);

enum Op {
    Nothing,
    Set { key: String, value: Value },
    SetString { key: String, value: String },
    SetStrings { key: String, values: Vec<String> },
    ExtendStrings { key: String, values: Vec<String> },
    Chain(Vec<PropertyUpdate>),
    Fail(VizError),
    Custom(UpdateFn),
}

impl PropertyUpdate {
    /// An update that does nothing.
    pub fn nothing() -> Self {
        Self(Op::Nothing)
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(Op::SetString { key: key.into(), value: value.into() })
    }

    pub fn strings<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Op::SetStrings {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Append to an existing string list property rather than replacing it.
    pub fn extend_strings<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Op::ExtendStrings {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn integer(key: impl Into<String>, value: i64) -> Self {
        Self::value(key, Value::Int(value))
    }

    pub fn integers(key: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::value(key, Value::ints(values))
    }

    pub fn double(key: impl Into<String>, value: f64) -> Self {
        Self::value(key, Value::Double(value))
    }

    pub fn duration(key: impl Into<String>, value: TimeDelta) -> Self {
        Self::value(key, Value::duration(value))
    }

    pub fn timestamp(key: impl Into<String>, value: impl Into<Timestamp>) -> Self {
        Self::value(key, Value::timestamp(value))
    }

    /// Store a pre-built Value as-is.
    pub fn value(key: impl Into<String>, value: Value) -> Self {
        Self(Op::Set { key: key.into(), value })
    }

    /// Apply `updates` in order, stopping at the first failure.
    pub fn chain(updates: impl IntoIterator<Item = PropertyUpdate>) -> Self {
        Self(Op::Chain(updates.into_iter().collect()))
    }

    pub fn when(predicate: bool, update: PropertyUpdate) -> Self {
        if predicate { update } else { Self::nothing() }
    }

    pub fn either(predicate: bool, then: PropertyUpdate, otherwise: PropertyUpdate) -> Self {
        if predicate { then } else { otherwise }
    }

    /// An update that always fails with `err`.
    pub fn error(err: impl Into<VizError>) -> Self {
        Self(Op::Fail(err.into()))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: FnOnce(&mut PropertyWriter<'_>) -> Result<(), VizError> + Send + 'static,
    {
        Self(Op::Custom(Box::new(f)))
    }

    pub fn apply_to(self, w: &mut PropertyWriter<'_>) -> Result<(), VizError> {
        match self.0 {
            Op::Nothing => Ok(()),
            Op::Set { key, value: Value::Double(d) } if !d.is_finite() => Err(VizError::new(
                format!("property '{key}': non-finite double {d} cannot be sent"),
            )),
            Op::Set { key, value } => {
                w.set(&key, value);
                Ok(())
            }
            Op::SetString { key, value } => {
                w.set_string(&key, &value);
                Ok(())
            }
            Op::SetStrings { key, values } => {
                w.set_strings(&key, &values);
                Ok(())
            }
            Op::ExtendStrings { key, values } => w.extend_strings(&key, &values),
            Op::Chain(updates) => {
                for update in updates {
                    update.apply_to(w)?;
                }
                Ok(())
            }
            Op::Fail(err) => Err(err),
            Op::Custom(f) => f(w),
        }
    }
}

impl Default for PropertyUpdate {
    fn default() -> Self {
        Self::nothing()
    }
}

impl fmt::Debug for PropertyUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Op::Nothing => f.write_str("Nothing"),
            Op::Set { key, value } => f.debug_struct("Set").field("key", key).field("value", value).finish(),
            Op::SetString { key, value } => {
                f.debug_struct("SetString").field("key", key).field("value", value).finish()
            }
            Op::SetStrings { key, values } => {
                f.debug_struct("SetStrings").field("key", key).field("values", values).finish()
            }
            Op::ExtendStrings { key, values } => {
                f.debug_struct("ExtendStrings").field("key", key).field("values", values).finish()
            }
            Op::Chain(updates) => f.debug_tuple("Chain").field(updates).finish(),
            Op::Fail(err) => f.debug_tuple("Fail").field(err).finish(),
            Op::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  PendingValue — a value whose key comes later
// ═══════════════════════════════════════════════════════════════

/// A value to set, not yet bound to a key. Lets helpers take "what to set"
/// as a parameter and decide the key themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingValue {
    Nothing,
    Str(String),
    Strs(Vec<String>),
    Int(i64),
    Ints(Vec<i64>),
    Double(f64),
    Duration(TimeDelta),
    Timestamp(Timestamp),
    Error(VizError),
}

impl PendingValue {
    pub fn for_key(self, key: impl Into<String>) -> PropertyUpdate {
        match self {
            PendingValue::Nothing => PropertyUpdate::nothing(),
            PendingValue::Str(v) => PropertyUpdate::string(key, v),
            PendingValue::Strs(v) => PropertyUpdate::strings(key, v),
            PendingValue::Int(v) => PropertyUpdate::integer(key, v),
            PendingValue::Ints(v) => PropertyUpdate::integers(key, v),
            PendingValue::Double(v) => PropertyUpdate::double(key, v),
            PendingValue::Duration(v) => PropertyUpdate::duration(key, v),
            PendingValue::Timestamp(v) => PropertyUpdate::timestamp(key, v),
            PendingValue::Error(e) => PropertyUpdate::error(e),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  DatumBuilder
// ═══════════════════════════════════════════════════════════════

/// Builds one node of a response tree.
///
/// Each builder has a single owner; builders for different nodes may be used
/// from different threads at once. Failures go to the response's error sink.
pub struct DatumBuilder {
    node: NodeRef,
    shared: Arc<Shared>,
}

impl DatumBuilder {
    pub(crate) fn new(node: NodeRef, shared: Arc<Shared>) -> Self {
        Self { node, shared }
    }

    /// Apply `updates` in order. The first failure is recorded and the rest
    /// of this call is skipped; earlier updates stay applied.
    pub fn apply<I>(&self, updates: I) -> &Self
    where
        I: IntoIterator<Item = PropertyUpdate>,
    {
        if let Err(err) = self.try_apply(updates) {
            tracing::debug!(error = %err, "property update failed");
            self.shared.errors.push(err);
        }
        self
    }

    pub fn with(&self, update: PropertyUpdate) -> &Self {
        self.apply([update])
    }

    fn try_apply<I>(&self, updates: I) -> Result<(), VizError>
    where
        I: IntoIterator<Item = PropertyUpdate>,
    {
        let mut node = lock(&self.node);
        let mut writer = PropertyWriter {
            properties: &mut node.properties,
            strings: &self.shared.strings,
        };
        for update in updates {
            update.apply_to(&mut writer)?;
        }
        Ok(())
    }

    /// Append a new empty child and return its builder.
    pub fn child(&self) -> DatumBuilder {
        let child = NodeRef::default();
        lock(&self.node).children.push(Arc::clone(&child));
        DatumBuilder::new(child, Arc::clone(&self.shared))
    }

    /// Copy `datum` (rendered against `strings`) into this node, re-interning
    /// keys and string payloads. New children are appended after existing ones.
    pub fn import(&self, datum: &Datum, strings: &[String]) -> &Self {
        self.apply(
            datum
                .properties
                .iter()
                .map(|(key, value)| imported_property(*key, value, strings)),
        );
        for child in &datum.children {
            self.child().import(child, strings);
        }
        self
    }

    /// Snapshot of this node's subtree, whatever errors were recorded.
    pub fn render(&self) -> Datum {
        render(&self.node)
    }
}

fn resolve(strings: &[String], index: i64) -> Result<&String, VizError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| strings.get(i))
        .ok_or_else(|| {
            VizError::wire(format!(
                "string index {index} outside table of {} strings",
                strings.len()
            ))
        })
}

fn imported_property(key: i64, value: &Value, strings: &[String]) -> PropertyUpdate {
    let key = match resolve(strings, key) {
        Ok(key) => key.clone(),
        Err(err) => return PropertyUpdate::error(err),
    };
    match value {
        Value::StrIndex(idx) => match resolve(strings, *idx) {
            Ok(s) => PropertyUpdate::string(key, s.clone()),
            Err(err) => PropertyUpdate::error(err),
        },
        Value::StrIndices(idxs) => {
            match idxs.iter().map(|i| resolve(strings, *i).cloned()).collect::<Result<Vec<_>, _>>() {
                Ok(values) => PropertyUpdate::strings(key, values),
                Err(err) => PropertyUpdate::error(err),
            }
        }
        other => PropertyUpdate::value(key, other.clone()),
    }
}
