use bytes::BytesMut;
use keel_core::Value;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::Decimal;
use std::{error::Error, io::Read};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Carries a [`Value`] across the tokio-postgres binding and decoding traits.
#[derive(Debug)]
pub(crate) struct ValueHolder(pub(crate) Value);

impl From<Value> for ValueHolder {
    fn from(value: Value) -> Self {
        ValueHolder(value)
    }
}

impl<'a> FromSql<'a> for ValueHolder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, Some(raw))
    }
    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, None)
    }
    fn from_sql_nullable(
        ty: &Type,
        raw: Option<&'a [u8]>,
    ) -> Result<Self, Box<dyn Error + Sync + Send>> {
        macro_rules! to_value {
            ($ty_var:ident, $raw:ident, $($($ty:path)|+ => ( $value:path, $source:ty $(, $additional:expr)* ) ,)+) => {
                match *$ty_var {
                    $($($ty)|+ => $value(if let Some($raw) = $raw { Some(<$source>::from_sql($ty_var, $raw)?.into()) } else { None } $(, $additional)*),)+
                    _ => {
                        if let Some(mut raw) = $raw {
                            let mut buf = String::new();
                            let _ = raw.read_to_string(&mut buf);
                            return Err(keel_core::Error::decode::<Value>(format!(
                                "cannot decode sql type `{}`, value: `{}`",
                                $ty_var, buf
                            ))
                            .into());
                        }
                        Value::Null
                    }
                }
            };
        }
        let value = to_value!(ty, raw,
            Type::BOOL => (Value::Boolean, bool),
            Type::INT2 => (Value::Int16, i16),
            Type::INT4 => (Value::Int32, i32),
            Type::INT8 => (Value::Int64, i64),
            Type::OID => (Value::Int64, u32),
            Type::FLOAT4 => (Value::Float32, f32),
            Type::FLOAT8 => (Value::Float64, f64),
            Type::NUMERIC => (Value::Decimal, Decimal),
            Type::VARCHAR
            | Type::TEXT
            | Type::NAME
            | Type::BPCHAR
            | Type::JSON
            | Type::XML
            | Type::UNKNOWN => (Value::Varchar, String),
            Type::BYTEA => (Value::Blob, Vec<u8>),
            Type::DATE => (Value::Date, Date),
            Type::TIME => (Value::Time, Time),
            Type::TIMESTAMP => (Value::Timestamp, PrimitiveDateTime),
            Type::TIMESTAMPTZ => (Value::TimestampWithTimezone, OffsetDateTime),
            Type::UUID => (Value::Uuid, Uuid),
            Type::BOOL_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Boolean(None))),
            Type::INT2_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Int16(None))),
            Type::INT4_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Int32(None))),
            Type::INT8_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Int64(None))),
            Type::FLOAT4_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Float32(None))),
            Type::FLOAT8_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Float64(None))),
            Type::NUMERIC_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Decimal(None))),
            Type::TEXT_ARRAY
            | Type::VARCHAR_ARRAY
            | Type::BPCHAR_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Varchar(None))),
            Type::DATE_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Date(None))),
            Type::TIMESTAMP_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Timestamp(None))),
            Type::TIMESTAMPTZ_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::TimestampWithTimezone(None))),
            Type::UUID_ARRAY => (Value::List, VecWrap<ValueHolder>, Box::new(Value::Uuid(None))),
        );
        Ok(value.into())
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for ValueHolder {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>>
    where
        Self: Sized,
    {
        // Integers adapt to the parameter type the server inferred
        if let Some(v) = self.0.as_i64() {
            match *ty {
                Type::INT2 => return v.map(i16::try_from).transpose()?.to_sql(ty, out),
                Type::INT4 => return v.map(i32::try_from).transpose()?.to_sql(ty, out),
                Type::INT8 => return v.to_sql(ty, out),
                Type::FLOAT8 => return v.map(|v| v as f64).to_sql(ty, out),
                Type::NUMERIC => return v.map(Decimal::from).to_sql(ty, out),
                _ => {}
            }
        }
        match &self.0 {
            Value::Null => None::<String>.to_sql(ty, out),
            Value::Boolean(v) => v.to_sql(ty, out),
            Value::Int16(v) => v.to_sql(ty, out),
            Value::Int32(v) => v.to_sql(ty, out),
            Value::Int64(v) => v.to_sql(ty, out),
            Value::Float32(v) if *ty == Type::FLOAT8 => v.map(f64::from).to_sql(ty, out),
            Value::Float32(v) => v.to_sql(ty, out),
            Value::Float64(v) => v.to_sql(ty, out),
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Varchar(Some(v)) if *ty == Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
            Value::Varchar(v) => v.to_sql(ty, out),
            Value::Blob(v) => v.as_deref().to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampWithTimezone(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::List(v, ..) => v
                .as_ref()
                .map(|v| v.iter().cloned().map(ValueHolder).collect::<Vec<_>>())
                .to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool
    where
        Self: Sized,
    {
        true
    }

    to_sql_checked!();
}

struct VecWrap<T>(pub Vec<T>);

impl<'a, T: FromSql<'a>> FromSql<'a> for VecWrap<T> {
    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Vec::<T>::from_sql_null(ty).map(VecWrap)
    }
    fn from_sql_nullable(
        ty: &Type,
        raw: Option<&'a [u8]>,
    ) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Vec::<T>::from_sql_nullable(ty, raw).map(VecWrap)
    }
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Vec::<T>::from_sql(ty, raw).map(VecWrap)
    }
    fn accepts(ty: &Type) -> bool {
        Vec::<T>::accepts(ty)
    }
}

impl From<VecWrap<ValueHolder>> for Vec<Value> {
    fn from(value: VecWrap<ValueHolder>) -> Self {
        value.0.into_iter().map(|v| v.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: Value, ty: &Type) -> BytesMut {
        let mut out = BytesMut::new();
        ValueHolder(value).to_sql(ty, &mut out).unwrap();
        out
    }

    #[test]
    fn integers_follow_the_parameter_type() {
        assert_eq!(&encode(Value::Int64(Some(7)), &Type::INT2)[..], &7i16.to_be_bytes());
        assert_eq!(&encode(Value::Int16(Some(7)), &Type::INT8)[..], &7i64.to_be_bytes());
        let mut out = BytesMut::new();
        assert!(
            ValueHolder(Value::Int64(Some(1 << 40)))
                .to_sql(&Type::INT4, &mut out)
                .is_err()
        );
    }

    #[test]
    fn decode_null_and_text() {
        let null = ValueHolder::from_sql_null(&Type::INT4).unwrap();
        assert_eq!(null.0, Value::Int32(None));
        let text = ValueHolder::from_sql(&Type::TEXT, b"keel").unwrap();
        assert_eq!(text.0, Value::Varchar(Some("keel".into())));
        let bigint = ValueHolder::from_sql(&Type::INT8, &42i64.to_be_bytes()).unwrap();
        assert_eq!(bigint.0, Value::Int64(Some(42)));
    }
}
