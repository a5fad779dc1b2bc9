//! Column-name to field mapping tables for plain data records

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::error::DecodeError;
use super::row::{decode_i64, decode_string, wrong_type};
use super::value::Value;

#[doc(hidden)]
pub use once_cell::sync::Lazy;

/// A record type that rows can be populated into.
///
/// Implement it with [`record_mapping!`](crate::record_mapping); the mapping
/// table is built and validated once per type.
pub trait Record: Sized + 'static {
    fn mapping() -> &'static Result<RecordMapping<Self>, DecodeError>;
}

/// Check the mapping of `T` without reading any row
pub fn validate<T: Record>() -> Result<(), DecodeError> {
    T::mapping().as_ref().map(|_| ()).map_err(|e| e.clone())
}

/// Field types a mapping can declare.
///
/// Only strings and signed integers are supported; the other kinds exist so
/// that declaring them fails with [`DecodeError::Unsupported`].
pub trait FieldValue: Sized {
    const KIND: &'static str;
    const SUPPORTED: bool;

    fn decode(column: &str, value: &Value) -> Result<Self, DecodeError>;
}

impl FieldValue for String {
    const KIND: &'static str = "string";
    const SUPPORTED: bool = true;

    fn decode(column: &str, value: &Value) -> Result<Self, DecodeError> {
        decode_string(column, value)
    }
}

macro_rules! signed_field {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: &'static str = stringify!($ty);
                const SUPPORTED: bool = true;

                fn decode(column: &str, value: &Value) -> Result<Self, DecodeError> {
                    let wide = decode_i64(column, value)?;
                    <$ty>::try_from(wide).map_err(|_| wrong_type(column, stringify!($ty), value))
                }
            }
        )*
    };
}

signed_field!(i8, i16, i32, i64, isize);

macro_rules! unsupported_field {
    ($($ty:ty => $kind:literal),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: &'static str = $kind;
                const SUPPORTED: bool = false;

                fn decode(column: &str, _value: &Value) -> Result<Self, DecodeError> {
                    Err(DecodeError::Unsupported {
                        field: column.to_string(),
                        kind: $kind,
                    })
                }
            }
        )*
    };
}

unsupported_field!(f32 => "f32", f64 => "f64", bool => "bool", u32 => "u32", u64 => "u64", DateTime<Utc> => "timestamp");

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: &'static str = T::KIND;
    const SUPPORTED: bool = T::SUPPORTED;

    fn decode(column: &str, value: &Value) -> Result<Self, DecodeError> {
        T::decode(column, value).map(Some)
    }
}

type SetFn<T> = Box<dyn Fn(&mut T, &str, &Value) -> Result<(), DecodeError> + Send + Sync>;

/// Setter for one field
pub struct FieldSetter<T> {
    kind: &'static str,
    set: SetFn<T>,
}

impl<T> FieldSetter<T> {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn apply(&self, target: &mut T, column: &str, value: &Value) -> Result<(), DecodeError> {
        (self.set)(target, column, value)
    }
}

/// Name to setter table for one record type
pub struct RecordMapping<T> {
    setters: HashMap<&'static str, FieldSetter<T>>,
}

impl<T: 'static> RecordMapping<T> {
    pub fn builder() -> RecordMappingBuilder<T> {
        RecordMappingBuilder {
            setters: HashMap::new(),
            error: None,
        }
    }

    /// Setter for the field named exactly `column`
    pub fn setter(&self, column: &str) -> Option<&FieldSetter<T>> {
        self.setters.get(column)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.setters.keys().copied()
    }
}

pub struct RecordMappingBuilder<T> {
    setters: HashMap<&'static str, FieldSetter<T>>,
    error: Option<DecodeError>,
}

impl<T: 'static> RecordMappingBuilder<T> {
    pub fn field<F: FieldValue + 'static>(mut self, name: &'static str, set: fn(&mut T, F)) -> Self {
        if !F::SUPPORTED {
            self.error.get_or_insert(DecodeError::Unsupported {
                field: name.to_string(),
                kind: F::KIND,
            });
            return self;
        }

        let setter = FieldSetter {
            kind: F::KIND,
            set: Box::new(move |target: &mut T, column: &str, value: &Value| {
                set(target, F::decode(column, value)?);
                Ok(())
            }),
        };
        self.setters.insert(name, setter);
        self
    }

    pub fn build(self) -> Result<RecordMapping<T>, DecodeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(RecordMapping {
                setters: self.setters,
            }),
        }
    }
}

/// Declare the column mapping of a record struct.
///
/// ```ignore
/// record_mapping!(BookDetails {
///     "BookId" => book_id: String,
///     "Description" => description: Option<String>,
/// });
/// ```
#[macro_export]
macro_rules! record_mapping {
    ($record:ty { $($column:literal => $field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::db::Record for $record {
            fn mapping() -> &'static ::std::result::Result<
                $crate::db::RecordMapping<Self>,
                $crate::db::DecodeError,
            > {
                static MAPPING: $crate::db::record::Lazy<
                    ::std::result::Result<$crate::db::RecordMapping<$record>, $crate::db::DecodeError>,
                > = $crate::db::record::Lazy::new(|| {
                    $crate::db::RecordMapping::<$record>::builder()
                        $(.field::<$ty>($column, |record: &mut $record, value: $ty| record.$field = value))*
                        .build()
                });
                &MAPPING
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Widths {
        tiny: i8,
        small: i16,
        wide: isize,
        label: Option<String>,
    }

    record_mapping!(Widths {
        "Tiny" => tiny: i8,
        "Small" => small: i16,
        "Wide" => wide: isize,
        "Label" => label: Option<String>,
    });

    #[derive(Debug, Default)]
    struct Stamped {
        created_at: DateTime<Utc>,
    }

    record_mapping!(Stamped {
        "CreatedAt" => created_at: DateTime<Utc>,
    });

    #[test]
    fn test_mapping_lists_declared_fields() {
        let mapping = Widths::mapping().as_ref().unwrap();
        let mut names: Vec<_> = mapping.field_names().collect();
        names.sort();
        assert_eq!(names, vec!["Label", "Small", "Tiny", "Wide"]);
        assert_eq!(mapping.setter("Tiny").unwrap().kind(), "i8");
        assert_eq!(mapping.setter("Label").unwrap().kind(), "string");
        assert!(mapping.setter("tiny").is_none());
    }

    #[test]
    fn test_setters_decode_each_width() {
        let mapping = Widths::mapping().as_ref().unwrap();
        let mut w = Widths::default();
        mapping.setter("Tiny").unwrap().apply(&mut w, "Tiny", &Value::Integer(-5)).unwrap();
        mapping.setter("Small").unwrap().apply(&mut w, "Small", &Value::Bytes(b"300".to_vec())).unwrap();
        mapping.setter("Wide").unwrap().apply(&mut w, "Wide", &Value::Integer(1 << 40)).unwrap();
        mapping.setter("Label").unwrap().apply(&mut w, "Label", &Value::from("x")).unwrap();
        assert_eq!((w.tiny, w.small, w.wide), (-5, 300, 1 << 40));
        assert_eq!(w.label.as_deref(), Some("x"));

        let err = mapping
            .setter("Tiny")
            .unwrap()
            .apply(&mut w, "Tiny", &Value::Integer(300))
            .unwrap_err();
        assert!(matches!(err, DecodeError::WrongType { expected: "i8", .. }));
        assert_eq!(w.tiny, -5);
    }

    #[test]
    fn test_validate_reports_unsupported_kind() {
        assert!(validate::<Widths>().is_ok());
        assert_eq!(
            validate::<Stamped>(),
            Err(DecodeError::Unsupported {
                field: "CreatedAt".into(),
                kind: "timestamp",
            })
        );
    }
}
