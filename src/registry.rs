//! The converter registry: two name-keyed maps of conversion functions,
//! populated by providers before any pipeline runs.
//!
//! Registration overwrites silently, so a later provider can override a
//! default converter by reusing its name. A stage name of the form
//! `Name[Type]` is rewritten at lookup time to the key `Name_Typed` with
//! `Type` prepended to the argument list, letting one registry slot serve
//! a family of typed behaviors.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::dest::DestError;
use crate::value::Value;

/// A named transform over one value.
pub type UnaryFn = Box<dyn Fn(Value, &[String]) -> Result<Value, ConvError>>;

/// A named transform over a tuple of values.
pub type NAryFn = Box<dyn Fn(&[Value], &[String]) -> Result<Value, ConvError>>;

/// Errors raised inside converters and propagated unchanged through the
/// pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvError {
    /// Missing or malformed converter arguments
    Argument(String),

    /// The input value cannot be transformed as requested
    Value(String),

    /// Field access through a destination object failed
    Field(String),

    /// `@name` reference not present in the global-variable set
    Global(String),

    /// An underlying provider (expression evaluator, path finder, ...)
    /// failed; the message is the provider's own
    Provider(String),
}

impl fmt::Display for ConvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvError::Argument(msg) => write!(f, "argument error: {}", msg),
            ConvError::Value(msg) => write!(f, "value error: {}", msg),
            ConvError::Field(name) => write!(f, "field \"{}\" not found", name),
            ConvError::Global(name) => write!(f, "unknown global \"{}\"", name),
            ConvError::Provider(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

impl std::error::Error for ConvError {}

impl From<DestError> for ConvError {
    fn from(e: DestError) -> Self {
        match e {
            DestError::FieldNotFound(name) => ConvError::Field(name),
        }
    }
}

/// Something that can populate a registry with named converters.
///
/// Providers run once during a setup phase; the registry is read-only
/// while pipelines execute.
pub trait ConverterProvider {
    fn register_into(self, registry: &mut ConverterRegistry);
}

/// Name-keyed converter maps, one for unary and one for n-ary converters.
#[derive(Default)]
pub struct ConverterRegistry {
    unary: HashMap<String, UnaryFn>,
    nary: HashMap<String, NAryFn>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unary converter. Last registration wins on collision.
    pub fn register_unary<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, &[String]) -> Result<Value, ConvError> + 'static,
    {
        self.unary.insert(name.into(), Box::new(f));
    }

    /// Register an n-ary converter. Last registration wins on collision.
    pub fn register_nary<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value], &[String]) -> Result<Value, ConvError> + 'static,
    {
        self.nary.insert(name.into(), Box::new(f));
    }

    pub fn unary(&self, name: &str) -> Option<&UnaryFn> {
        self.unary.get(name)
    }

    pub fn nary(&self, name: &str) -> Option<&NAryFn> {
        self.nary.get(name)
    }

    /// Whether the leading converter name of a stage expression resolves
    /// to an n-ary converter. Typed-variant names are rewritten first.
    pub fn is_nary(&self, expr: &str) -> bool {
        let head = expr.split_whitespace().next().unwrap_or(expr);
        let (name, _) = resolve_typed_name(head, &[]);
        self.nary.contains_key(&name)
    }
}

fn typed_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+)\[([^\]]+)\]$").expect("typed name pattern is valid"))
}

/// Rewrite a `Name[Type]` stage head into its registry key `Name_Typed`
/// with `Type` prepended to the argument list. Plain names pass through
/// with their arguments unchanged.
pub fn resolve_typed_name(head: &str, args: &[String]) -> (String, Vec<String>) {
    if let Some(caps) = typed_name_regex().captures(head) {
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(caps[2].to_string());
        full_args.extend(args.iter().cloned());
        (format!("{}_Typed", &caps[1]), full_args)
    } else {
        (head.to_string(), args.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_name_rewrite() {
        let (name, args) = resolve_typed_name("ExprEval[Int64]", &["'a + 1'".to_string()]);
        assert_eq!(name, "ExprEval_Typed");
        assert_eq!(args, vec!["Int64", "'a + 1'"]);
    }

    #[test]
    fn test_plain_name_untouched() {
        let (name, args) = resolve_typed_name("ToUpper", &[]);
        assert_eq!(name, "ToUpper");
        assert!(args.is_empty());
    }

    #[test]
    fn test_overwrite_wins() {
        let mut reg = ConverterRegistry::new();
        reg.register_unary("C", |_, _| Ok(Value::Integer(1)));
        reg.register_unary("C", |_, _| Ok(Value::Integer(2)));
        let f = reg.unary("C").unwrap();
        assert_eq!(f(Value::Null, &[]).unwrap(), Value::Integer(2));
    }

    #[test]
    fn test_is_nary_sees_typed_variants() {
        let mut reg = ConverterRegistry::new();
        reg.register_nary("Join", |_, _| Ok(Value::Null));
        reg.register_nary("ExprEval_Typed", |_, _| Ok(Value::Null));
        assert!(reg.is_nary("Join \",\""));
        assert!(reg.is_nary("ExprEval[Int64] 'a' a"));
        assert!(!reg.is_nary("ToUpper"));
    }
}
