use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::dest::Record;

/// A runtime value flowing through a conversion pipeline.
///
/// This is a tagged union over every shape the accumulator can take:
/// scalars, ordered sequences, string-keyed maps, and handles to
/// record-backed objects (named-field structs implementing [`Record`]).
///
/// Integers and floats are kept distinct; converters and the expression
/// evaluator preserve integer results when they are whole.
///
/// # Examples
///
/// ```
/// use ducto::Value;
/// use std::collections::HashMap;
///
/// let scalar = Value::Integer(42);
/// let seq = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
///
/// let mut map = HashMap::new();
/// map.insert("title".to_string(), Value::String("Mysterious Island".to_string()));
/// let obj = Value::Object(map);
/// # let _ = (scalar, seq, obj);
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    Null,

    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Ordered sequence of values
    Array(Vec<Value>),

    /// String-keyed mapping
    Object(HashMap<String, Value>),

    /// Shared handle to a record-backed object with named fields.
    ///
    /// Handles compare by identity and clone by reference, so writes
    /// made through a [`crate::DestObject`] stay visible to every
    /// holder of the handle.
    Record(Rc<RefCell<dyn Record>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Wrap a record-backed object into a shared [`Value::Record`] handle.
    pub fn record<R: Record + 'static>(record: R) -> Value {
        Value::Record(Rc::new(RefCell::new(record)))
    }

    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Integer(n) => *n > 0,
            Float(n) => *n > 0.0,
            String(s) => !s.is_empty(),
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
            Record(_) => true,
        }
    }

    /// Convert to boolean for conditions
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            _ => self.is_truthy(),
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    /// Get as string (display form; arrays and maps use the debug form)
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            _ => format!("{:?}", self),
        }
    }

    /// Human-readable shape name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Record(_) => "record",
        }
    }
}

/// A resolvable element type used by `type[...]` selectors, typed-variant
/// dispatch (`Name[Type]`) and the `Convert To<Type>` converter family.
///
/// A fixed set of primitive shapes; resolution is case-insensitive and
/// accepts the usual aliases (`int`, `long`, `uint`, `ulong`, `bool`,
/// `str`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Boolean => "Boolean",
            TypeTag::Int32 => "Int32",
            TypeTag::UInt32 => "UInt32",
            TypeTag::Int64 => "Int64",
            TypeTag::UInt64 => "UInt64",
            TypeTag::Float32 => "Float32",
            TypeTag::Float64 => "Float64",
            TypeTag::String => "String",
        };
        write!(f, "{}", name)
    }
}

impl TypeTag {
    /// Resolve a type name to a tag. Returns `None` for unknown names.
    pub fn resolve(name: &str) -> Option<TypeTag> {
        match name.to_lowercase().as_str() {
            "bool" | "boolean" => Some(TypeTag::Boolean),
            "int" | "int32" => Some(TypeTag::Int32),
            "uint" | "uint32" => Some(TypeTag::UInt32),
            "long" | "int64" => Some(TypeTag::Int64),
            "ulong" | "uint64" => Some(TypeTag::UInt64),
            "single" | "float32" => Some(TypeTag::Float32),
            "float" | "double" | "float64" => Some(TypeTag::Float64),
            "str" | "string" => Some(TypeTag::String),
            _ => None,
        }
    }

    /// The value seeding a reduce fold for this element type: zero for
    /// numeric tags, false for booleans, and absence for strings.
    pub fn default_value(&self) -> Value {
        match self {
            TypeTag::Boolean => Value::Boolean(false),
            TypeTag::Int32 | TypeTag::UInt32 | TypeTag::Int64 | TypeTag::UInt64 => {
                Value::Integer(0)
            }
            TypeTag::Float32 | TypeTag::Float64 => Value::Float(0.0),
            TypeTag::String => Value::Null,
        }
    }

    /// Coerce a value into this type's shape.
    ///
    /// `Null` passes through untouched. Returns `None` when the value
    /// has no sensible representation under the tag (non-numeric string,
    /// negative value for an unsigned tag, array for a scalar tag, ...).
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if let Value::Null = value {
            return Some(Value::Null);
        }
        match self {
            TypeTag::Boolean => match value {
                Value::Boolean(_) => Some(value),
                Value::Integer(n) => Some(Value::Boolean(n != 0)),
                Value::Float(n) => Some(Value::Boolean(n != 0.0)),
                Value::String(s) => s.trim().parse::<bool>().ok().map(Value::Boolean),
                _ => None,
            },
            TypeTag::Int32 => Self::coerce_integer(value).map(|n| Value::Integer(n as i32 as i64)),
            TypeTag::UInt32 => Self::coerce_integer(value).and_then(|n| {
                if n < 0 {
                    None
                } else {
                    Some(Value::Integer(n as u32 as i64))
                }
            }),
            TypeTag::Int64 => Self::coerce_integer(value).map(Value::Integer),
            TypeTag::UInt64 => Self::coerce_integer(value)
                .and_then(|n| if n < 0 { None } else { Some(Value::Integer(n)) }),
            TypeTag::Float32 => Self::coerce_float(value).map(|n| Value::Float(n as f32 as f64)),
            TypeTag::Float64 => Self::coerce_float(value).map(Value::Float),
            TypeTag::String => match value {
                Value::Array(_) | Value::Object(_) | Value::Record(_) => None,
                other => Some(Value::String(other.as_string())),
            },
        }
    }

    fn coerce_integer(value: Value) -> Option<i64> {
        match value {
            Value::Integer(n) => Some(n),
            Value::Float(n) => Some(n.round() as i64),
            Value::Boolean(b) => Some(b as i64),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    fn coerce_float(value: Value) -> Option<f64> {
        match value {
            Value::Integer(n) => Some(n as f64),
            Value::Float(n) => Some(n),
            Value::Boolean(b) => Some(b as i64 as f64),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Infer the element tag of an array from its contents, for the
    /// `typeof` selector. Returns `None` when nothing can be inferred;
    /// broadcasting then skips coercion entirely.
    pub fn infer(items: &[Value]) -> Option<TypeTag> {
        for item in items {
            match item {
                Value::Null => continue,
                Value::Boolean(_) => return Some(TypeTag::Boolean),
                Value::Integer(_) => return Some(TypeTag::Int64),
                Value::Float(_) => return Some(TypeTag::Float64),
                Value::String(_) => return Some(TypeTag::String),
                _ => return None,
            }
        }
        None
    }
}

#[test]
fn test_resolve_aliases() {
    assert_eq!(TypeTag::resolve("Int64"), Some(TypeTag::Int64));
    assert_eq!(TypeTag::resolve("long"), Some(TypeTag::Int64));
    assert_eq!(TypeTag::resolve("INT32"), Some(TypeTag::Int32));
    assert_eq!(TypeTag::resolve("double"), Some(TypeTag::Float64));
    assert_eq!(TypeTag::resolve("str"), Some(TypeTag::String));
    assert_eq!(TypeTag::resolve("Vector3"), None);
}

#[test]
fn test_coerce_int32_wraps() {
    let v = TypeTag::Int32.coerce(Value::Integer(i64::from(i32::MAX) + 1));
    assert_eq!(v, Some(Value::Integer(i64::from(i32::MIN))));
}

#[test]
fn test_coerce_string_parse() {
    assert_eq!(
        TypeTag::Int64.coerce(Value::String("17".into())),
        Some(Value::Integer(17))
    );
    assert_eq!(TypeTag::Int64.coerce(Value::String("x".into())), None);
    assert_eq!(TypeTag::UInt32.coerce(Value::Integer(-1)), None);
}

#[test]
fn test_null_passes_through() {
    assert_eq!(TypeTag::UInt64.coerce(Value::Null), Some(Value::Null));
}

#[test]
fn test_default_values() {
    assert_eq!(TypeTag::Int64.default_value(), Value::Integer(0));
    assert_eq!(TypeTag::String.default_value(), Value::Null);
    assert_eq!(TypeTag::Boolean.default_value(), Value::Boolean(false));
}
