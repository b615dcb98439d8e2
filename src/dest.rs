//! Destination objects: a uniform field-access facade over map-like and
//! record-like values.
//!
//! The pipeline core and the path resolver never care whether a value
//! stores its fields in a string-keyed map or in a plain struct. Both
//! shapes are wrapped into a [`DestObject`], which exposes get/set/contains
//! by field name. Struct-backed values opt in by implementing [`Record`];
//! there is no runtime reflection involved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// Capability contract for record-backed values: named-field access over
/// an ordinary struct.
///
/// `set_field` returns `false` when the record has no writable field of
/// that name; [`DestObject::set`] turns that into a [`DestError`].
///
/// # Examples
///
/// ```
/// use ducto::{Record, Value};
///
/// #[derive(Debug)]
/// struct Book {
///     title: String,
///     year: i64,
/// }
///
/// impl Record for Book {
///     fn get_field(&self, name: &str) -> Option<Value> {
///         match name {
///             "title" => Some(Value::String(self.title.clone())),
///             "year" => Some(Value::Integer(self.year)),
///             _ => None,
///         }
///     }
///
///     fn set_field(&mut self, name: &str, value: Value) -> bool {
///         match (name, value) {
///             ("title", Value::String(s)) => {
///                 self.title = s;
///                 true
///             }
///             ("year", Value::Integer(n)) => {
///                 self.year = n;
///                 true
///             }
///             _ => false,
///         }
///     }
///
///     fn has_field(&self, name: &str) -> bool {
///         matches!(name, "title" | "year")
///     }
///
///     fn field_names(&self) -> Vec<&str> {
///         vec!["title", "year"]
///     }
/// }
/// ```
pub trait Record: fmt::Debug {
    /// Read a field by name. `None` if the record has no such field.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Write a field by name. `false` if the field is absent or not
    /// writable for the given value shape.
    fn set_field(&mut self, name: &str, value: Value) -> bool;

    /// Whether a writable field of this name exists.
    fn has_field(&self, name: &str) -> bool;

    /// All field names, in declaration order. Used when a record has to
    /// be rendered as a map (e.g. JSON output).
    fn field_names(&self) -> Vec<&str>;
}

/// Shared handle to a record, as stored in [`Value::Record`].
pub type RecordRef = Rc<RefCell<dyn Record>>;

/// Errors raised by destination-object field access.
#[derive(Debug, Clone, PartialEq)]
pub enum DestError {
    /// The named field does not exist (or is not writable, for `set`)
    FieldNotFound(String),
}

impl fmt::Display for DestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestError::FieldNotFound(name) => write!(f, "field \"{}\" not found", name),
        }
    }
}

impl std::error::Error for DestError {}

/// A field-access facade over a value, selected by the value's shape.
///
/// - **MapBacked**: wraps a string-keyed map; field access operates on
///   map entries. The map is owned, so writes are local until the
///   object is turned back into a value with [`DestObject::origin`].
/// - **RecordBacked**: wraps a shared record handle; writes go through
///   the handle and are visible to every holder.
pub enum DestObject {
    MapBacked(HashMap<String, Value>),
    RecordBacked(RecordRef),
}

impl DestObject {
    /// Wrap a value. Map and record shapes wrap; everything else is an
    /// opaque scalar and is handed back untouched in `Err`.
    ///
    /// Wrapping is idempotent: a record handle wraps to the same handle.
    pub fn create(value: Value) -> Result<DestObject, Value> {
        match value {
            Value::Object(map) => Ok(DestObject::MapBacked(map)),
            Value::Record(rec) => Ok(DestObject::RecordBacked(rec)),
            other => Err(other),
        }
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> Result<Value, DestError> {
        match self {
            DestObject::MapBacked(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| DestError::FieldNotFound(name.to_string())),
            DestObject::RecordBacked(rec) => rec
                .borrow()
                .get_field(name)
                .ok_or_else(|| DestError::FieldNotFound(name.to_string())),
        }
    }

    /// Write a field by name.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), DestError> {
        match self {
            DestObject::MapBacked(map) => {
                map.insert(name.to_string(), value);
                Ok(())
            }
            DestObject::RecordBacked(rec) => {
                if rec.borrow_mut().set_field(name, value) {
                    Ok(())
                } else {
                    Err(DestError::FieldNotFound(name.to_string()))
                }
            }
        }
    }

    /// Whether a field of this name exists. Never fails.
    pub fn contains_key(&self, name: &str) -> bool {
        match self {
            DestObject::MapBacked(map) => map.contains_key(name),
            DestObject::RecordBacked(rec) => rec.borrow().has_field(name),
        }
    }

    /// Unwrap back to the underlying value.
    pub fn origin(self) -> Value {
        match self {
            DestObject::MapBacked(map) => Value::Object(map),
            DestObject::RecordBacked(rec) => Value::Record(rec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl Record for Point {
        fn get_field(&self, name: &str) -> Option<Value> {
            match name {
                "x" => Some(Value::Integer(self.x)),
                "y" => Some(Value::Integer(self.y)),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match (name, value.as_int()) {
                ("x", Some(n)) => {
                    self.x = n;
                    true
                }
                ("y", Some(n)) => {
                    self.y = n;
                    true
                }
                _ => false,
            }
        }

        fn has_field(&self, name: &str) -> bool {
            matches!(name, "x" | "y")
        }

        fn field_names(&self) -> Vec<&str> {
            vec!["x", "y"]
        }
    }

    #[test]
    fn test_map_backed_roundtrip() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::String("A".into()));
        let mut dest = DestObject::create(Value::Object(map)).unwrap();

        assert!(dest.contains_key("name"));
        assert!(!dest.contains_key("missing"));
        assert_eq!(dest.get("name").unwrap(), Value::String("A".into()));
        assert_eq!(
            dest.get("missing"),
            Err(DestError::FieldNotFound("missing".into()))
        );

        dest.set("name", Value::String("B".into())).unwrap();
        let Value::Object(map) = dest.origin() else {
            panic!("expected object origin");
        };
        assert_eq!(map["name"], Value::String("B".into()));
    }

    #[test]
    fn test_record_writes_are_shared() {
        let handle = Value::record(Point { x: 1, y: 2 });
        let mirror = handle.clone();

        let mut dest = DestObject::create(handle).unwrap();
        assert!(dest.contains_key("x"));
        dest.set("x", Value::Integer(9)).unwrap();
        assert_eq!(
            dest.set("z", Value::Integer(0)),
            Err(DestError::FieldNotFound("z".into()))
        );

        let Value::Record(rec) = mirror else {
            panic!("expected record");
        };
        assert_eq!(rec.borrow().get_field("x"), Some(Value::Integer(9)));
    }

    #[test]
    fn test_scalar_refuses_to_wrap() {
        match DestObject::create(Value::Integer(5)) {
            Err(v) => assert_eq!(v, Value::Integer(5)),
            Ok(_) => panic!("scalar should not wrap"),
        }
    }

    #[test]
    fn test_wrapping_is_idempotent() {
        let handle = Value::record(Point { x: 0, y: 0 });
        let before = handle.clone();
        let dest = match DestObject::create(handle) {
            Ok(d) => d,
            Err(_) => panic!("record should wrap"),
        };
        assert_eq!(dest.origin(), before);
    }
}
