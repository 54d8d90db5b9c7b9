use crate::{Error, Result, Value};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use std::any;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`]
/// used for bound arguments and decoded row cells.
///
/// # Contract
/// - `as_empty_value` returns the NULL variant of the canonical type, it is
///   used to type empty lists and absent optionals.
/// - `try_from_value` accepts the canonical variant, may accept other widths
///   after a range check, and fails with a decode error otherwise. A NULL is
///   accepted only by `Option<T>`.
///
/// # Examples
/// ```rust
/// use keel_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn mismatch<T>(value: &Value) -> Error {
    if value.is_null() {
        Error::decode::<T>("unexpected NULL, use an Option to accept it")
    } else {
        Error::decode::<T>(format!("cannot convert {:?}", value))
    }
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self.into()))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v.into()),
                    $($pat_rest => $expr_rest,)*
                    #[allow(unreachable_patterns)]
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}

macro_rules! narrow {
    ($v:ident, $from:ty => $to:ty) => {
        <$to>::try_from($v).map_err(|_| {
            Error::decode::<$to>(format!(
                "value {} of type {} is out of range",
                $v,
                stringify!($from)
            ))
        })
    };
}

impl_as_value!(bool, Value::Boolean);
impl_as_value!(
    i16,
    Value::Int16,
    Value::Int32(Some(v)) => narrow!(v, i32 => i16),
    Value::Int64(Some(v)) => narrow!(v, i64 => i16),
);
impl_as_value!(
    i32,
    Value::Int32,
    Value::Int16(Some(v)) => Ok(v.into()),
    Value::Int64(Some(v)) => narrow!(v, i64 => i32),
);
impl_as_value!(
    i64,
    Value::Int64,
    Value::Int32(Some(v)) => Ok(v.into()),
    Value::Int16(Some(v)) => Ok(v.into()),
    Value::Decimal(Some(v)) => {
        if !v.is_integer() {
            return Err(Error::decode::<i64>(format!("decimal {v} is not an integer")));
        }
        v.to_i64()
            .ok_or_else(|| Error::decode::<i64>(format!("decimal {v} does not fit into i64")))
    }
);
impl_as_value!(
    f32,
    Value::Float32,
    Value::Int16(Some(v)) => Ok(v.into()),
);
impl_as_value!(
    f64,
    Value::Float64,
    Value::Float32(Some(v)) => Ok(v.into()),
    Value::Int32(Some(v)) => Ok(v.into()),
    Value::Int16(Some(v)) => Ok(v.into()),
    Value::Decimal(Some(v)) => v
        .to_f64()
        .ok_or_else(|| Error::decode::<f64>(format!("decimal {v} does not fit into f64"))),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Int64(Some(v)) => Ok(v.into()),
    Value::Int32(Some(v)) => Ok(v.into()),
    Value::Int16(Some(v)) => Ok(v.into()),
    Value::Float64(Some(v)) => Decimal::from_f64(v)
        .ok_or_else(|| Error::decode::<Decimal>(format!("{v} cannot be represented as a decimal"))),
);
impl_as_value!(String, Value::Varchar);
impl_as_value!(Box<[u8]>, Value::Blob);
impl_as_value!(Date, Value::Date);
impl_as_value!(Time, Value::Time);
impl_as_value!(
    PrimitiveDateTime,
    Value::Timestamp,
    Value::TimestampWithTimezone(Some(v)) => Ok(PrimitiveDateTime::new(v.date(), v.time())),
);
impl_as_value!(OffsetDateTime, Value::TimestampWithTimezone);
impl_as_value!(
    Uuid,
    Value::Uuid,
    Value::Varchar(Some(ref v)) => Uuid::parse_str(v)
        .map_err(|e| Error::decode::<Uuid>(format!("`{v}` is not a valid uuid: {e}"))),
);

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::try_from_value(value).map(Some)
        }
    }
}

impl<T: AsValue> AsValue for Vec<T> {
    fn as_empty_value() -> Value {
        Value::List(None, Box::new(T::as_empty_value()))
    }
    fn as_value(self) -> Value {
        Value::List(
            Some(self.into_iter().map(AsValue::as_value).collect()),
            Box::new(T::as_empty_value()),
        )
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(Some(values), ..) => values.into_iter().map(T::try_from_value).collect(),
            _ => Err(Error::decode::<Self>(format!(
                "cannot convert {:?} to {}",
                value,
                any::type_name::<Self>()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn widening_and_narrowing() {
        assert_eq!(i64::try_from_value(Value::Int16(Some(-3))).unwrap(), -3);
        assert_eq!(i16::try_from_value(Value::Int64(Some(300))).unwrap(), 300);
        let error = i16::try_from_value(Value::Int64(Some(1 << 40))).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode);
        assert_eq!(f64::try_from_value(Value::Float32(Some(1.5))).unwrap(), 1.5);
    }

    #[test]
    fn null_needs_option() {
        assert_eq!(Option::<i32>::try_from_value(Value::Int32(None)).unwrap(), None);
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::try_from_value(Value::Varchar(Some("a".into()))).unwrap(),
            Some("a".to_string())
        );
        let error = i32::try_from_value(Value::Int32(None)).unwrap_err();
        assert!(error.to_string().contains("unexpected NULL"));
        assert!(matches!(None::<i64>.as_value(), Value::Int64(None)));
    }

    #[test]
    fn type_mismatch() {
        let error = String::try_from_value(Value::Int32(Some(1))).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode);
        assert!(bool::try_from_value(Value::Varchar(Some("true".into()))).is_err());
    }

    #[test]
    fn lists() {
        let value = vec![1i32, 2, 3].as_value();
        assert!(matches!(&value, Value::List(Some(v), ty) if v.len() == 3 && matches!(**ty, Value::Int32(None))));
        assert_eq!(Vec::<i64>::try_from_value(value).unwrap(), vec![1, 2, 3]);
        assert!(Vec::<i32>::try_from_value(Value::Int32(Some(1))).is_err());
    }

    #[test]
    fn uuid_from_text() {
        let id = Uuid::from_u128(0x1234);
        assert_eq!(Uuid::try_from_value(Value::Varchar(Some(id.to_string()))).unwrap(), id);
    }
}
