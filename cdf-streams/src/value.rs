use std::fmt::{self, Display};

use crate::follow::FollowFlags;

/// One decoded record. Its length matches the stream definition, or the
/// projection it was read with.
pub type Row = Vec<Value>;

/// Build a [`Row`] from anything convertible into a [`Value`].
///
/// ```
/// use cdf_streams::{row, Value};
///
/// let row = row![1, "http://www.site.com/"];
/// assert_eq!(row[0], Value::Int(1));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::Value::from($value)),+]
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Str(String),
    Follow(FollowFlags),
}

impl Value {
    /// Numeric view of the value. Strings count when they parse as integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Str(value) => value.parse().ok(),
            Value::Follow(flags) => Some(flags.mask()),
        }
    }

    /// Text view of the value. Follow flags read as their label.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Int(_) => None,
            Value::Str(value) => Some(value),
            Value::Follow(flags) => Some(flags.label()),
        }
    }

    pub fn as_follow(&self) -> Option<FollowFlags> {
        match self {
            Value::Follow(flags) => Some(*flags),
            _ => None,
        }
    }
}

/// Canonical on-disk text of a value.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::Follow(flags) => write!(f, "{}", flags.mask()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<FollowFlags> for Value {
    fn from(value: FollowFlags) -> Self {
        Value::Follow(value)
    }
}

/// How a column turns its text into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Int,
    Str,
    FollowMask,
}

impl ColumnKind {
    /// Decode one cell. The error carries the reason only; the caller knows
    /// which field it was decoding.
    pub fn decode(self, raw: &str) -> Result<Value, String> {
        match self {
            ColumnKind::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("not a valid {} value: {e}", self.name())),
            ColumnKind::Str => Ok(Value::Str(raw.to_string())),
            ColumnKind::FollowMask => raw
                .parse::<i64>()
                .map(|mask| Value::Follow(FollowFlags::new(mask)))
                .map_err(|e| format!("not a valid {} value: {e}", self.name())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnKind::Int => "int",
            ColumnKind::Str => "str",
            ColumnKind::FollowMask => "follow_mask",
        }
    }
}
