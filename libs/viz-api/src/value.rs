use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{self, Deserialize, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeTuple, Serializer};

use crate::error::VizError;

const NANOS_PER_SEC: i64 = 1_000_000_000;

// ═══════════════════════════════════════════════════════════════
//  ValueTag
// ═══════════════════════════════════════════════════════════════

/// Wire tag of a [`Value`]. The numeric codes are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueTag {
    Str = 1,
    StrIndex = 2,
    Strs = 3,
    StrIndices = 4,
    Int = 5,
    Ints = 6,
    Double = 7,
    Duration = 8,
    Timestamp = 9,
}

impl ValueTag {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => ValueTag::Str,
            2 => ValueTag::StrIndex,
            3 => ValueTag::Strs,
            4 => ValueTag::StrIndices,
            5 => ValueTag::Int,
            6 => ValueTag::Ints,
            7 => ValueTag::Double,
            8 => ValueTag::Duration,
            9 => ValueTag::Timestamp,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Str => "str",
            ValueTag::StrIndex => "str_idx",
            ValueTag::Strs => "strs",
            ValueTag::StrIndices => "str_idxs",
            ValueTag::Int => "int",
            ValueTag::Ints => "ints",
            ValueTag::Double => "dbl",
            ValueTag::Duration => "dur",
            ValueTag::Timestamp => "ts",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Timestamp
// ═══════════════════════════════════════════════════════════════

/// Point in time as Unix seconds plus a nanosecond remainder in `[0, 1e9)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Build from wire parts. The remainder must already be normalised.
    pub fn from_parts(secs: i64, nanos: i64) -> Result<Self, VizError> {
        if !(0..NANOS_PER_SEC).contains(&nanos) {
            return Err(VizError::wire(format!(
                "timestamp nanosecond remainder {nanos} outside [0, {NANOS_PER_SEC})"
            )));
        }
        Ok(Self { secs, nanos: nanos as u32 })
    }

    /// Split a nanosecond epoch offset; negative offsets borrow from seconds.
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            secs: nanos.div_euclid(NANOS_PER_SEC),
            nanos: nanos.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }

    pub fn unix_seconds(&self) -> i64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// `None` when outside chrono's representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        // Leap seconds are reported as nanos >= 1e9.
        let nanos = dt.timestamp_subsec_nanos().min(NANOS_PER_SEC as u32 - 1);
        Self { secs: dt.timestamp(), nanos }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            None => write!(f, "{}.{:09}s", self.secs, self.nanos),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Value
// ═══════════════════════════════════════════════════════════════

/// Immutable tagged scalar used as a property value, a request option or a
/// global filter. The variant is the tag; reading with the wrong expectation
/// is a [`crate::ErrorKind::Type`] error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    /// Index into the response's string table.
    StrIndex(i64),
    Strs(Vec<String>),
    StrIndices(Vec<i64>),
    Int(i64),
    Ints(Vec<i64>),
    Double(f64),
    /// Signed nanoseconds.
    Duration(i64),
    Timestamp(Timestamp),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    pub fn string_index(index: i64) -> Self {
        Value::StrIndex(index)
    }

    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Strs(values.into_iter().map(Into::into).collect())
    }

    pub fn string_indices(indices: impl IntoIterator<Item = i64>) -> Self {
        Value::StrIndices(indices.into_iter().collect())
    }

    pub fn int(value: i64) -> Self {
        Value::Int(value)
    }

    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Value::Ints(values.into_iter().collect())
    }

    pub fn double(value: f64) -> Self {
        Value::Double(value)
    }

    /// Durations beyond ±292 years saturate at the i64 nanosecond bounds.
    pub fn duration(value: TimeDelta) -> Self {
        let nanos = value.num_nanoseconds().unwrap_or(if value < TimeDelta::zero() {
            i64::MIN
        } else {
            i64::MAX
        });
        Value::Duration(nanos)
    }

    pub fn duration_nanos(nanos: i64) -> Self {
        Value::Duration(nanos)
    }

    pub fn timestamp(value: impl Into<Timestamp>) -> Self {
        Value::Timestamp(value.into())
    }

    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Str(_) => ValueTag::Str,
            Value::StrIndex(_) => ValueTag::StrIndex,
            Value::Strs(_) => ValueTag::Strs,
            Value::StrIndices(_) => ValueTag::StrIndices,
            Value::Int(_) => ValueTag::Int,
            Value::Ints(_) => ValueTag::Ints,
            Value::Double(_) => ValueTag::Double,
            Value::Duration(_) => ValueTag::Duration,
            Value::Timestamp(_) => ValueTag::Timestamp,
        }
    }

    fn mismatch(&self, expected: ValueTag) -> VizError {
        VizError::type_mismatch(expected, self.tag())
    }

    pub fn expect_str(&self) -> Result<&str, VizError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch(ValueTag::Str)),
        }
    }

    pub fn expect_string_index(&self) -> Result<i64, VizError> {
        match self {
            Value::StrIndex(i) => Ok(*i),
            other => Err(other.mismatch(ValueTag::StrIndex)),
        }
    }

    pub fn expect_strs(&self) -> Result<&[String], VizError> {
        match self {
            Value::Strs(v) => Ok(v),
            other => Err(other.mismatch(ValueTag::Strs)),
        }
    }

    pub fn expect_string_indices(&self) -> Result<&[i64], VizError> {
        match self {
            Value::StrIndices(v) => Ok(v),
            other => Err(other.mismatch(ValueTag::StrIndices)),
        }
    }

    pub fn expect_int(&self) -> Result<i64, VizError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch(ValueTag::Int)),
        }
    }

    pub fn expect_ints(&self) -> Result<&[i64], VizError> {
        match self {
            Value::Ints(v) => Ok(v),
            other => Err(other.mismatch(ValueTag::Ints)),
        }
    }

    pub fn expect_double(&self) -> Result<f64, VizError> {
        match self {
            Value::Double(d) => Ok(*d),
            other => Err(other.mismatch(ValueTag::Double)),
        }
    }

    pub fn expect_duration(&self) -> Result<TimeDelta, VizError> {
        match self {
            Value::Duration(nanos) => Ok(TimeDelta::nanoseconds(*nanos)),
            other => Err(other.mismatch(ValueTag::Duration)),
        }
    }

    pub fn expect_timestamp(&self) -> Result<Timestamp, VizError> {
        match self {
            Value::Timestamp(ts) => Ok(*ts),
            other => Err(other.mismatch(ValueTag::Timestamp)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Wire encoding: [tag, payload]
// ═══════════════════════════════════════════════════════════════

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(2)?;
        t.serialize_element(&self.tag().code())?;
        match self {
            Value::Str(s) => t.serialize_element(s)?,
            Value::StrIndex(i) | Value::Int(i) | Value::Duration(i) => t.serialize_element(i)?,
            Value::Strs(v) => t.serialize_element(v)?,
            Value::StrIndices(v) | Value::Ints(v) => t.serialize_element(v)?,
            Value::Double(d) if !d.is_finite() => {
                return Err(ser::Error::custom(format!("non-finite double {d} has no wire form")));
            }
            Value::Double(d) => t.serialize_element(d)?,
            Value::Timestamp(ts) => t.serialize_element(&(ts.secs, ts.nanos))?,
        }
        t.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(ValueVisitor)
    }
}

struct ValueVisitor;

fn payload<'de, A, T>(seq: &mut A, tag: ValueTag) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::custom(format!("missing payload for '{tag}' value")))
}

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [tag, payload] value pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let code: u8 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let tag = ValueTag::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown value tag {code}")))?;
        let value = match tag {
            ValueTag::Str => Value::Str(payload(&mut seq, tag)?),
            ValueTag::StrIndex => Value::StrIndex(payload(&mut seq, tag)?),
            ValueTag::Strs => Value::Strs(payload(&mut seq, tag)?),
            ValueTag::StrIndices => Value::StrIndices(payload(&mut seq, tag)?),
            ValueTag::Int => Value::Int(payload(&mut seq, tag)?),
            ValueTag::Ints => Value::Ints(payload(&mut seq, tag)?),
            ValueTag::Double => Value::Double(payload(&mut seq, tag)?),
            ValueTag::Duration => Value::Duration(payload(&mut seq, tag)?),
            ValueTag::Timestamp => {
                let (secs, nanos): (i64, i64) = payload(&mut seq, tag)?;
                Value::Timestamp(Timestamp::from_parts(secs, nanos).map_err(de::Error::custom)?)
            }
        };
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(3, &self));
        }
        Ok(value)
    }
}
