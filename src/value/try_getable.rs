//! Typed extraction from `sea_query::Value`.
//!
//! `TryGetable` turns a row cell into a concrete Rust type with errors that
//! distinguish NULL, a missing column, a type mismatch, and a failed
//! conversion.

use sea_query::Value;

/// Error type for value extraction failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExtractionError {
    /// The value is null (None variant)
    NullValue,
    /// The row has no column of the requested name
    MissingColumn(String),
    /// The value type doesn't match the expected type
    TypeMismatch { expected: String, actual: String },
    /// Value conversion failed (e.g., overflow, invalid format)
    ConversionError(String),
}

impl std::fmt::Display for ValueExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExtractionError::NullValue => write!(f, "Value is null"),
            ValueExtractionError::MissingColumn(name) => {
                write!(f, "Row has no column named '{}'", name)
            }
            ValueExtractionError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, actual)
            }
            ValueExtractionError::ConversionError(msg) => {
                write!(f, "Conversion error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValueExtractionError {}

/// Trait for safe value extraction with error handling
///
/// ## Usage
///
/// ```rust
/// use skiff::{TryGetable, ValueExtractionError};
/// use sea_query::Value;
///
/// let value = Value::Int(Some(42));
/// let result: Result<i32, ValueExtractionError> = TryGetable::try_get(value);
/// assert_eq!(result, Ok(42));
///
/// let null_value = Value::Int(None);
/// let result: Result<i32, ValueExtractionError> = TryGetable::try_get(null_value);
/// assert!(matches!(result, Err(ValueExtractionError::NullValue)));
/// ```
pub trait TryGetable: Sized {
    /// Try to extract a value from `sea_query::Value`, returning an error if extraction fails.
    ///
    /// Returns:
    /// - `Ok(T)` if the value matches the expected type and is not null
    /// - `Err(ValueExtractionError::NullValue)` if the value is null
    /// - `Err(ValueExtractionError::TypeMismatch)` if the value type doesn't match
    /// - `Err(ValueExtractionError::ConversionError)` if conversion fails (e.g., overflow)
    fn try_get(value: Value) -> Result<Self, ValueExtractionError>;

    /// Try to extract a value, allowing null values to return `None`.
    fn try_get_opt(value: Value) -> Result<Option<Self>, ValueExtractionError> {
        match Self::try_get(value) {
            Ok(v) => Ok(Some(v)),
            Err(ValueExtractionError::NullValue) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

macro_rules! impl_try_getable {
    ($type:ty, $variant:ident, $expected:expr) => {
        impl TryGetable for $type {
            fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
                match value {
                    Value::$variant(Some(v)) => Ok(v),
                    Value::$variant(None) => Err(ValueExtractionError::NullValue),
                    _ => Err(ValueExtractionError::TypeMismatch {
                        expected: $expected.to_string(),
                        actual: format!("{:?}", value),
                    }),
                }
            }
        }
    };
}

impl_try_getable!(i8, TinyInt, "TinyInt");
impl_try_getable!(i16, SmallInt, "SmallInt");
impl_try_getable!(i32, Int, "Int");
impl_try_getable!(i64, BigInt, "BigInt");
impl_try_getable!(f32, Float, "Float");
impl_try_getable!(f64, Double, "Double");
impl_try_getable!(bool, Bool, "Bool");
impl_try_getable!(String, String, "String");
impl_try_getable!(Vec<u8>, Bytes, "Bytes");

// Types whose Value payload representation is feature-dependent go through
// sea_query's own ValueType conversion instead of direct pattern binding.
macro_rules! impl_try_getable_value_type {
    ($type:ty, $variant:ident, $expected:expr) => {
        impl TryGetable for $type {
            fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
                match value {
                    Value::$variant(Some(_)) => <$type as sea_query::ValueType>::try_from(value)
                        .map_err(|_| {
                            ValueExtractionError::ConversionError(format!(
                                "cannot convert value to {}",
                                $expected
                            ))
                        }),
                    Value::$variant(None) => Err(ValueExtractionError::NullValue),
                    _ => Err(ValueExtractionError::TypeMismatch {
                        expected: $expected.to_string(),
                        actual: format!("{:?}", value),
                    }),
                }
            }
        }
    };
}

impl_try_getable_value_type!(uuid::Uuid, Uuid, "Uuid");
impl_try_getable_value_type!(rust_decimal::Decimal, Decimal, "Decimal");
impl_try_getable_value_type!(chrono::NaiveDate, ChronoDate, "ChronoDate");
impl_try_getable_value_type!(chrono::NaiveTime, ChronoTime, "ChronoTime");
impl_try_getable_value_type!(chrono::NaiveDateTime, ChronoDateTime, "ChronoDateTime");
impl_try_getable_value_type!(
    chrono::DateTime<chrono::Utc>,
    ChronoDateTimeUtc,
    "ChronoDateTimeUtc"
);

// Unsigned types accept the widened signed variant the driver may hand back.
impl TryGetable for u8 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::TinyUnsigned(Some(v)) => Ok(v),
            Value::TinyUnsigned(None) => Err(ValueExtractionError::NullValue),
            Value::SmallInt(Some(v)) if v >= 0 && v <= u8::MAX as i16 => Ok(v as u8),
            Value::SmallInt(None) => Err(ValueExtractionError::NullValue),
            _ => Err(ValueExtractionError::TypeMismatch {
                expected: "TinyUnsigned or SmallInt".to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }
}

impl TryGetable for u16 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::SmallUnsigned(Some(v)) => Ok(v),
            Value::SmallUnsigned(None) => Err(ValueExtractionError::NullValue),
            Value::Int(Some(v)) if v >= 0 && v <= u16::MAX as i32 => Ok(v as u16),
            Value::Int(None) => Err(ValueExtractionError::NullValue),
            _ => Err(ValueExtractionError::TypeMismatch {
                expected: "SmallUnsigned or Int".to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }
}

impl TryGetable for u32 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Unsigned(Some(v)) => Ok(v),
            Value::Unsigned(None) => Err(ValueExtractionError::NullValue),
            Value::BigInt(Some(v)) if v >= 0 && v <= u32::MAX as i64 => Ok(v as u32),
            Value::BigInt(None) => Err(ValueExtractionError::NullValue),
            _ => Err(ValueExtractionError::TypeMismatch {
                expected: "Unsigned or BigInt".to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }
}

impl TryGetable for u64 {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::BigUnsigned(Some(v)) => Ok(v),
            Value::BigUnsigned(None) => Err(ValueExtractionError::NullValue),
            Value::BigInt(Some(v)) if v >= 0 => Ok(v as u64),
            Value::BigInt(None) => Err(ValueExtractionError::NullValue),
            _ => Err(ValueExtractionError::TypeMismatch {
                expected: "BigUnsigned or BigInt".to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }
}

impl TryGetable for serde_json::Value {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match value {
            Value::Json(Some(v)) => Ok(*v),
            Value::Json(None) => Err(ValueExtractionError::NullValue),
            _ => Err(ValueExtractionError::TypeMismatch {
                expected: "Json".to_string(),
                actual: format!("{:?}", value),
            }),
        }
    }
}

impl<T: TryGetable> TryGetable for Option<T> {
    fn try_get(value: Value) -> Result<Self, ValueExtractionError> {
        match T::try_get(value) {
            Ok(v) => Ok(Some(v)),
            Err(ValueExtractionError::NullValue) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn try_get_opt(value: Value) -> Result<Option<Self>, ValueExtractionError> {
        // For Option<Option<T>>, we flatten
        match T::try_get(value) {
            Ok(v) => Ok(Some(Some(v))),
            Err(ValueExtractionError::NullValue) => Ok(Some(None)),
            Err(e) => Err(e),
        }
    }
}

/// Extract a whole column of values at once, as pluck does.
///
/// ## Usage
///
/// ```rust
/// use skiff::TryGetableMany;
/// use sea_query::Value;
///
/// let values = vec![Value::Int(Some(1)), Value::Int(Some(2)), Value::Int(Some(3))];
/// let result: Result<Vec<i32>, _> = TryGetableMany::try_get_many(values);
/// assert_eq!(result, Ok(vec![1, 2, 3]));
/// ```
pub trait TryGetableMany: TryGetable {
    /// Extract every value, failing on the first bad cell.
    fn try_get_many<I>(values: I) -> Result<Vec<Self>, ValueExtractionError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut result = Vec::new();
        for value in values {
            result.push(Self::try_get(value)?);
        }
        Ok(result)
    }

    /// Extract every value, mapping NULL cells to `None`.
    fn try_get_many_opt<I>(values: I) -> Result<Vec<Option<Self>>, ValueExtractionError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut result = Vec::new();
        for value in values {
            result.push(Self::try_get_opt(value)?);
        }
        Ok(result)
    }
}

impl<T: TryGetable> TryGetableMany for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_extraction() {
        assert_eq!(i32::try_get(Value::Int(Some(42))), Ok(42));
        assert_eq!(i64::try_get(Value::BigInt(Some(-3))), Ok(-3));
        assert_eq!(bool::try_get(Value::Bool(Some(true))), Ok(true));
        assert_eq!(
            String::try_get(Value::String(Some("abc".to_string()))),
            Ok("abc".to_string())
        );
    }

    #[test]
    fn test_null_and_mismatch() {
        assert!(matches!(
            i32::try_get(Value::Int(None)),
            Err(ValueExtractionError::NullValue)
        ));
        assert!(matches!(
            i32::try_get(Value::String(Some("x".to_string()))),
            Err(ValueExtractionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unsigned_widening() {
        assert_eq!(u8::try_get(Value::SmallInt(Some(200))), Ok(200));
        assert!(u8::try_get(Value::SmallInt(Some(300))).is_err());
        assert_eq!(u32::try_get(Value::BigInt(Some(70000))), Ok(70000));
        assert_eq!(u64::try_get(Value::BigInt(Some(9))), Ok(9));
        assert!(u64::try_get(Value::BigInt(Some(-1))).is_err());
    }

    #[test]
    fn test_option_transparency() {
        assert_eq!(Option::<i32>::try_get(Value::Int(Some(5))), Ok(Some(5)));
        assert_eq!(Option::<i32>::try_get(Value::Int(None)), Ok(None));
        assert!(Option::<i32>::try_get(Value::Bool(Some(true))).is_err());
    }

    #[test]
    fn test_value_type_backed_extraction() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(uuid::Uuid::try_get(Value::from(id)), Ok(id));
        assert!(matches!(
            uuid::Uuid::try_get(Value::Uuid(None)),
            Err(ValueExtractionError::NullValue)
        ));

        let now = chrono::Utc::now();
        assert_eq!(
            chrono::DateTime::<chrono::Utc>::try_get(Value::from(now)),
            Ok(now)
        );

        let d = rust_decimal::Decimal::new(1234, 2);
        assert_eq!(rust_decimal::Decimal::try_get(Value::from(d)), Ok(d));
    }

    #[test]
    fn test_json_extraction() {
        let json = serde_json::json!({"a": 1});
        let value = Value::Json(Some(Box::new(json.clone())));
        assert_eq!(serde_json::Value::try_get(value), Ok(json));
    }

    #[test]
    fn test_try_get_many() {
        let values = vec![
            Value::Int(Some(1)),
            Value::Int(None),
            Value::Int(Some(3)),
        ];
        let result: Vec<Option<i32>> = TryGetableMany::try_get_many_opt(values).unwrap();
        assert_eq!(result, vec![Some(1), None, Some(3)]);
    }
}
