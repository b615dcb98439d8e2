//! Dotted-path navigation over destination objects, with predicate-based
//! collection filtering.
//!
//! A path is a dot-separated list of segments. A plain segment names a
//! field; a segment shaped like `container[key=value]` is an item finder
//! that filters into a nested collection. The resolver never mutates the
//! structure it walks.
//!
//! Missing middle elements are reported softly through [`PathLookup`]
//! (a null value plus the name of the missing segment) so callers can
//! apply their own fallback. Only `@name` globals that are not declared
//! and unresolvable typed literals abort a lookup.

use std::collections::HashMap;
use std::fmt;

use crate::dest::DestObject;
use crate::registry::ConvError;
use crate::tokenizer::trim_quotes;
use crate::value::{TypeTag, Value};

/// A predicate segment `container[key=value]`.
///
/// An empty `container` means "filter the current value's own elements".
/// The `value` spec is resolved at match time: `@name` reads a global,
/// `Type(literal)` coerces the literal to a typed value, anything else
/// is compared verbatim as a string.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFinder {
    pub container: String,
    pub key: String,
    pub value: String,
}

/// Outcome of a path lookup.
///
/// `has_elem` distinguishes "resolved to null" from "the last segment was
/// absent"; `missing_segment` names the segment where a soft miss
/// happened partway through the path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathLookup {
    pub value: Value,
    pub has_elem: bool,
    pub missing_segment: Option<String>,
}

impl PathLookup {
    fn found(value: Value) -> Self {
        PathLookup {
            value,
            has_elem: true,
            missing_segment: None,
        }
    }

    fn missing(segment: &str) -> Self {
        PathLookup {
            value: Value::Null,
            has_elem: false,
            missing_segment: Some(segment.to_string()),
        }
    }
}

/// Fatal path-resolution errors. Soft misses are not errors; they are
/// reported through [`PathLookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathError {
    /// `@name` value spec references a global that was never supplied
    GlobalNotDeclared(String),

    /// A `Type(literal)` value spec names an unknown type or the literal
    /// does not convert
    BadTypedLiteral(String),

    /// Item-finder segment is not of the form `container[key=value]`
    BadSegment(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::GlobalNotDeclared(name) => write!(f, "unknown global \"{}\"", name),
            PathError::BadTypedLiteral(spec) => {
                write!(f, "cannot resolve typed literal \"{}\"", spec)
            }
            PathError::BadSegment(seg) => write!(f, "malformed item finder \"{}\"", seg),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for ConvError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::GlobalNotDeclared(name) => ConvError::Global(name),
            other => ConvError::Provider(other.to_string()),
        }
    }
}

/// Dotted-path resolver over destination objects.
pub struct PathFinder {
    globals: HashMap<String, Value>,
}

impl PathFinder {
    pub fn new(globals: HashMap<String, Value>) -> Self {
        PathFinder { globals }
    }

    /// Resolve `path` against `root`.
    ///
    /// Single-result mode (`multi == false`) descends into the first
    /// match of each item finder and returns one value. Multi mode keeps the
    /// whole filtered subset: at a final item finder it returns the
    /// filtered array, and at a middle one it resolves the remaining path
    /// against each match independently, one result per match.
    pub fn get_value(
        &self,
        root: &Value,
        path: &str,
        multi: bool,
    ) -> Result<PathLookup, PathError> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut current = root.clone();

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();

            if is_item_finder(segment) {
                let finder = parse_item_finder(segment)?;
                let Some(items) = self.finder_collection(&current, &finder) else {
                    return Ok(PathLookup::missing(segment));
                };
                let wanted = self.resolve_finder_value(&finder.value)?;
                let matched: Vec<Value> = items
                    .into_iter()
                    .filter(|item| finder_matches(item, &finder.key, &wanted))
                    .collect();

                if multi {
                    if is_last {
                        return Ok(PathLookup {
                            has_elem: !matched.is_empty(),
                            value: Value::Array(matched),
                            missing_segment: None,
                        });
                    }
                    let rest = segments[i + 1..].join(".");
                    let mut results = Vec::with_capacity(matched.len());
                    for item in matched {
                        results.push(self.get_value(&item, &rest, false)?.value);
                    }
                    return Ok(PathLookup::found(Value::Array(results)));
                }

                let Some(first) = matched.into_iter().next() else {
                    return Ok(PathLookup::missing(segment));
                };
                if is_last {
                    return Ok(PathLookup::found(first));
                }
                current = first;
                continue;
            }

            let dest = match DestObject::create(current) {
                Ok(dest) => dest,
                // Opaque scalar partway through a path: nothing to descend into.
                Err(_) => return Ok(PathLookup::missing(segment)),
            };

            if is_last {
                return Ok(if dest.contains_key(segment) {
                    PathLookup::found(dest.get(segment).unwrap_or(Value::Null))
                } else {
                    PathLookup {
                        value: Value::Null,
                        has_elem: false,
                        missing_segment: None,
                    }
                });
            }

            if !dest.contains_key(segment) {
                return Ok(PathLookup::missing(segment));
            }
            current = dest.get(segment).unwrap_or(Value::Null);
        }

        Ok(PathLookup::found(current))
    }

    /// The collection an item finder filters: the named container field,
    /// or the current value's own elements when the container is empty.
    /// `None` means a soft miss (absent or non-iterable container).
    fn finder_collection(&self, current: &Value, finder: &ItemFinder) -> Option<Vec<Value>> {
        if finder.container.is_empty() {
            return match current {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            };
        }
        let dest = DestObject::create(current.clone()).ok()?;
        if !dest.contains_key(&finder.container) {
            return None;
        }
        match dest.get(&finder.container).ok()? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Resolve a finder value spec: `@name` global, `Type(literal)` typed
    /// literal, or verbatim (possibly quoted) string.
    fn resolve_finder_value(&self, spec: &str) -> Result<Value, PathError> {
        if let Some(name) = spec.strip_prefix('@') {
            let value = self
                .globals
                .get(name)
                .ok_or_else(|| PathError::GlobalNotDeclared(name.to_string()))?;
            return match value {
                Value::String(s) => convert_literal(trim_quotes(s)),
                other => Ok(other.clone()),
            };
        }
        convert_literal(trim_quotes(spec))
    }
}

fn is_item_finder(segment: &str) -> bool {
    !segment.is_empty() && segment.contains('[') && segment.ends_with(']')
}

fn parse_item_finder(segment: &str) -> Result<ItemFinder, PathError> {
    let open = segment
        .find('[')
        .ok_or_else(|| PathError::BadSegment(segment.to_string()))?;
    let eq = segment[open..]
        .find('=')
        .map(|j| open + j)
        .ok_or_else(|| PathError::BadSegment(segment.to_string()))?;
    Ok(ItemFinder {
        container: segment[..open].trim().to_string(),
        key: segment[open + 1..eq].trim().to_string(),
        value: segment[eq + 1..segment.len() - 1].trim().to_string(),
    })
}

/// Interpret a `Type(value)` literal, e.g. `Int32(1875)`; anything not of
/// that shape stays a verbatim string.
fn convert_literal(spec: &str) -> Result<Value, PathError> {
    let Some(open) = spec.find('(') else {
        return Ok(Value::String(spec.to_string()));
    };
    if open == 0 || !spec.ends_with(')') {
        return Ok(Value::String(spec.to_string()));
    }
    let type_name = &spec[..open];
    let literal = &spec[open + 1..spec.len() - 1];
    let tag =
        TypeTag::resolve(type_name).ok_or_else(|| PathError::BadTypedLiteral(spec.to_string()))?;
    tag.coerce(Value::String(literal.to_string()))
        .ok_or_else(|| PathError::BadTypedLiteral(spec.to_string()))
}

/// Whether an element's field matches the wanted value: membership when
/// the wanted value is a list, equality otherwise.
fn finder_matches(item: &Value, key: &str, wanted: &Value) -> bool {
    let Ok(dest) = DestObject::create(item.clone()) else {
        return false;
    };
    if !dest.contains_key(key) {
        return false;
    }
    let Ok(actual) = dest.get(key) else {
        return false;
    };
    match wanted {
        Value::Array(list) => list.contains(&actual),
        other => actual == *other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_finder() {
        let f = parse_item_finder("book[author=Jules]").unwrap();
        assert_eq!(
            f,
            ItemFinder {
                container: "book".into(),
                key: "author".into(),
                value: "Jules".into(),
            }
        );

        let f = parse_item_finder("[id=@ids]").unwrap();
        assert_eq!(f.container, "");
        assert_eq!(f.value, "@ids");

        assert!(parse_item_finder("book[oops]").is_err());
    }

    #[test]
    fn test_convert_literal() {
        assert_eq!(convert_literal("Int32(1875)"), Ok(Value::Integer(1875)));
        assert_eq!(
            convert_literal("plain"),
            Ok(Value::String("plain".into()))
        );
        // Unknown type or bad literal is fatal.
        assert!(convert_literal("Vector3(1)").is_err());
        assert!(convert_literal("Int32(x)").is_err());
    }

    #[test]
    fn test_is_item_finder() {
        assert!(is_item_finder("book[author=X]"));
        assert!(is_item_finder("[author=X]"));
        assert!(!is_item_finder("book"));
        assert!(!is_item_finder("book[author=X].title"));
    }
}
