//! The standard converter set: type conversion, string helpers, array
//! plumbing, and field access on objects.
//!
//! Null flows through untouched wherever a converter has nothing sensible
//! to do with it, which lets soft path misses propagate down a pipeline
//! without failing it.

use crate::dest::DestObject;
use crate::registry::{ConvError, ConverterProvider, ConverterRegistry};
use crate::tokenizer::trim_quotes;
use crate::value::{TypeTag, Value};

/// Installs the standard converters.
pub struct StdConverters;

fn require_arg<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str, ConvError> {
    args.get(index)
        .map(|s| s.as_str())
        .ok_or_else(|| ConvError::Argument(format!("missing argument: {}", what)))
}

/// Resolves a `ToInt32`-style conversion target to a type tag.
fn target_tag(name: &str) -> Result<TypeTag, ConvError> {
    let bare = name.strip_prefix("To").unwrap_or(name);
    TypeTag::resolve(bare)
        .ok_or_else(|| ConvError::Argument(format!("unknown conversion target \"{}\"", name)))
}

fn coerce_to(tag: TypeTag, value: Value) -> Result<Value, ConvError> {
    let shown = value.type_name();
    tag.coerce(value)
        .ok_or_else(|| ConvError::Value(format!("cannot convert {} to {}", shown, tag)))
}

/// Interprets the escapes a pipeline author can spell inside a quoted
/// argument.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn string_arg(args: &[String], index: usize, what: &str) -> Result<String, ConvError> {
    Ok(unescape(trim_quotes(require_arg(args, index, what)?)))
}

fn const_value(_: Value, args: &[String]) -> Result<Value, ConvError> {
    Ok(Value::String(string_arg(args, 0, "constant value")?))
}

/// Visiting order for a tuple of `count` values: identity, or the order
/// spelled by trailing integer arguments (one per value).
fn reorder_indices(count: usize, args: &[String]) -> Result<Vec<usize>, ConvError> {
    let mut order: Vec<usize> = (0..count).collect();
    if args.is_empty() {
        return Ok(order);
    }
    if args.len() != count {
        return Err(ConvError::Argument(format!(
            "expected 0 or {} reorder arguments, got {}",
            count,
            args.len()
        )));
    }
    for (i, arg) in args.iter().enumerate() {
        let index = arg
            .parse::<usize>()
            .map_err(|_| ConvError::Argument(format!("bad reorder index \"{}\"", arg)))?;
        if index >= count {
            return Err(ConvError::Argument(format!(
                "reorder index {} out of range",
                index
            )));
        }
        order[i] = index;
    }
    Ok(order)
}

fn first_non_null(vals: &[Value], args: &[String]) -> Result<Value, ConvError> {
    let order = reorder_indices(vals.len(), args)?;
    Ok(order
        .into_iter()
        .map(|i| &vals[i])
        .find(|v| !matches!(v, Value::Null))
        .cloned()
        .unwrap_or(Value::Null))
}

/// Join with an optional delimiter (first argument) and optional reorder
/// indices after it. Nulls are skipped, not rendered.
fn join(vals: &[Value], args: &[String]) -> Result<Value, ConvError> {
    if args.len() > 1 && args.len() != vals.len() + 1 {
        return Err(ConvError::Argument(format!(
            "expected 0, 1 or {} arguments, got {}",
            vals.len() + 1,
            args.len()
        )));
    }
    let separator = match args.first() {
        Some(arg) => unescape(trim_quotes(arg)),
        None => String::new(),
    };
    let order = reorder_indices(vals.len(), args.get(1..).unwrap_or(&[]))?;
    let parts: Vec<String> = order
        .into_iter()
        .map(|i| &vals[i])
        .filter(|v| !matches!(v, Value::Null))
        .map(|v| v.as_string())
        .collect();
    Ok(Value::String(parts.join(&separator)))
}

fn convert_array_items(items: &[Value], args: &[String]) -> Result<Value, ConvError> {
    let target = args
        .get(1)
        .or_else(|| args.first())
        .ok_or_else(|| ConvError::Argument("missing conversion target".into()))?;
    let tag = target_tag(target)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(coerce_to(tag, item.clone())?);
    }
    Ok(Value::Array(out))
}

fn property_of(value: &Value, name: &str) -> Value {
    match DestObject::create(value.clone()) {
        Ok(dest) => {
            if dest.contains_key(name) {
                dest.get(name).unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        Err(_) => Value::Null,
    }
}

impl ConverterProvider for StdConverters {
    fn register_into(self, registry: &mut ConverterRegistry) {
        registry.register_unary("Convert", |value, args| {
            if matches!(value, Value::Null) {
                return Ok(Value::Null);
            }
            let tag = target_tag(require_arg(args, 0, "conversion target")?)?;
            coerce_to(tag, value)
        });

        registry.register_unary("ConvertArray", |value, args| match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => convert_array_items(&items, args),
            other => Err(ConvError::Value(format!(
                "ConvertArray expects an array, got {}",
                other.type_name()
            ))),
        });
        registry.register_nary("ConvertArray", |vals, args| {
            convert_array_items(vals, args)
        });

        registry.register_unary("ToString", |value, _| match value {
            Value::Null => Ok(Value::Null),
            other => Ok(Value::String(other.as_string())),
        });

        registry.register_unary("ToLower", |value, _| match value {
            Value::Null => Ok(Value::Null),
            other => Ok(Value::String(other.as_string().to_lowercase())),
        });

        registry.register_unary("ToUpper", |value, _| match value {
            Value::Null => Ok(Value::Null),
            other => Ok(Value::String(other.as_string().to_uppercase())),
        });

        registry.register_unary("AsArrayWithOneItem", |value, _| {
            Ok(Value::Array(vec![value]))
        });

        registry.register_unary("AsFirstItemOfArray", |value, _| match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            other => Err(ConvError::Value(format!(
                "AsFirstItemOfArray expects an array, got {}",
                other.type_name()
            ))),
        });

        registry.register_unary("Split", |value, args| {
            let separator = string_arg(args, 0, "separator")?;
            match value {
                Value::Null => Ok(Value::Null),
                other => {
                    let text = other.as_string();
                    let parts = text
                        .split(separator.as_str())
                        .map(|p| Value::String(p.to_string()))
                        .collect();
                    Ok(Value::Array(parts))
                }
            }
        });

        registry.register_unary("ConstValue", const_value);
        registry.register_unary("Const", const_value);

        registry.register_unary("Property", |value, args| {
            let name = string_arg(args, 0, "property name")?;
            Ok(property_of(&value, &name))
        });

        registry.register_unary("ItemProperty", |value, args| {
            let name = string_arg(args, 0, "property name")?;
            match value {
                Value::Null => Ok(Value::Null),
                Value::Array(items) => Ok(Value::Array(
                    items.iter().map(|item| property_of(item, &name)).collect(),
                )),
                other => Err(ConvError::Value(format!(
                    "ItemProperty expects an array, got {}",
                    other.type_name()
                ))),
            }
        });

        registry.register_unary("First", |value, _| match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => Ok(items.into_iter().next().unwrap_or(Value::Null)),
            other => Err(ConvError::Value(format!(
                "First expects an array, got {}",
                other.type_name()
            ))),
        });
        registry.register_nary("First", |vals, _| {
            Ok(vals.first().cloned().unwrap_or(Value::Null))
        });

        registry.register_unary("Last", |value, _| match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => Ok(items.into_iter().next_back().unwrap_or(Value::Null)),
            other => Err(ConvError::Value(format!(
                "Last expects an array, got {}",
                other.type_name()
            ))),
        });
        registry.register_nary("Last", |vals, _| {
            Ok(vals.last().cloned().unwrap_or(Value::Null))
        });

        registry.register_nary("Join", join);

        // OneOf and IfThenElse share behavior but stay separate names so
        // either can be overridden independently.
        registry.register_nary("OneOf", first_non_null);
        registry.register_nary("IfThenElse", first_non_null);
    }
}
