//! Comma-separated list columns.
//!
//! Some schemas store small scalar lists as comma-joined text (`"1,2,3"`).
//! These newtypes round-trip that encoding: `Display`/`FromStr` for the text
//! form, `Into<Value>` for binding, `TryGetable` for decoding. An empty
//! string decodes to an empty list.

use super::try_getable::{TryGetable, ValueExtractionError};
use sea_query::Value;
use std::fmt;
use std::str::FromStr;

macro_rules! comma_list {
    ($name:ident, $elem:ty, $label:expr) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(pub Vec<$elem>);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                for item in &self.0 {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                    first = false;
                }
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = ValueExtractionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Ok(Self(Vec::new()));
                }
                let mut items = Vec::new();
                for part in s.split(',') {
                    let item = part.parse::<$elem>().map_err(|e| {
                        ValueExtractionError::ConversionError(format!(
                            "invalid {} element '{}': {}",
                            $label, part, e
                        ))
                    })?;
                    items.push(item);
                }
                Ok(Self(items))
            }
        }

        impl From<$name> for Value {
            fn from(list: $name) -> Self {
                Value::String(Some(list.to_string()))
            }
        }

        impl TryGetable for $name {
            fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
                let text = String::try_get(value)?;
                text.parse()
            }
        }
    };
}

comma_list!(IntList, i64, "IntList");
comma_list!(StringList, String, "StringList");
comma_list!(DecimalList, rust_decimal::Decimal, "DecimalList");
