//! The pipeline interpreter.
//!
//! A pipeline is a `|`-separated chain of converter stages applied left to
//! right, e.g. `Convert ToInt32 | AsArrayWithOneItem`. [`Pipe`] expands
//! shorthand, tokenizes, and runs each stage against the value produced by
//! the previous one.
//!
//! Two stage keywords change how a value flows:
//!
//! * `Each` broadcasts the following converter over the elements of an
//!   array. Bare `Each` turns broadcasting on for every remaining stage.
//! * `Reduce` folds an array into a single value through an n-ary
//!   converter called with `(accumulator, item)`.
//!
//! Both accept an optional leading element selector, `Type[T]` or
//! `typeof`, which coerces element results (and seeds the fold for
//! `Reduce`) to a concrete type.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::converters::{EvalConverters, StdConverters};
use crate::path::PathFinder;
use crate::registry::{resolve_typed_name, ConvError, ConverterProvider, ConverterRegistry};
use crate::shorthand;
use crate::tokenizer::{self, Stage};
use crate::value::{TypeTag, Value};

/// Errors raised while running a pipeline.
#[derive(Debug)]
pub enum PipeError {
    UnknownConverter(String),
    UnknownNAryConverter(String),
    UnknownType(String),
    EmptyStage,
    ExpectedArray(String),
    Converter(ConvError),
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeError::UnknownConverter(name) => {
                write!(f, "unknown converter \"{}\"", name)
            }
            PipeError::UnknownNAryConverter(name) => {
                write!(f, "unknown n-ary converter \"{}\"", name)
            }
            PipeError::UnknownType(name) => write!(f, "unknown type \"{}\"", name),
            PipeError::EmptyStage => write!(f, "stage has no converter to apply"),
            PipeError::ExpectedArray(ctx) => {
                write!(f, "{} expects an array value", ctx)
            }
            PipeError::Converter(e) => write!(f, "converter failed: {}", e),
        }
    }
}

impl std::error::Error for PipeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipeError::Converter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConvError> for PipeError {
    fn from(e: ConvError) -> Self {
        PipeError::Converter(e)
    }
}

fn type_selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^type\[(\S+)\]$").unwrap())
}

/// How an `Each` or `Reduce` stage picks the element type.
enum ElementSelector {
    /// `Type[T]`: a fixed tag.
    Fixed(TypeTag),
    /// `typeof`: infer the tag from the array contents.
    Infer,
    /// No selector token present.
    None,
}

fn parse_selector(token: &str) -> Result<ElementSelector, PipeError> {
    if let Some(caps) = type_selector_regex().captures(token) {
        let name = &caps[1];
        let tag = TypeTag::resolve(name).ok_or_else(|| PipeError::UnknownType(name.to_string()))?;
        return Ok(ElementSelector::Fixed(tag));
    }
    if token.eq_ignore_ascii_case("typeof") {
        return Ok(ElementSelector::Infer);
    }
    Ok(ElementSelector::None)
}

/// The pipeline runner. Owns the converter registry the stages resolve
/// against.
///
/// # Examples
///
/// ```
/// use ducto::{Pipe, Value};
///
/// let pipe = Pipe::with_defaults();
/// let out = pipe
///     .run("Convert ToInt32 | AsArrayWithOneItem", Value::String("123".into()))
///     .unwrap();
/// assert_eq!(out, Value::Array(vec![Value::Integer(123)]));
/// ```
pub struct Pipe {
    registry: ConverterRegistry,
}

impl Pipe {
    /// An empty pipe with no converters registered.
    pub fn new() -> Self {
        Pipe {
            registry: ConverterRegistry::default(),
        }
    }

    /// A pipe preloaded with the standard converters and the expression
    /// evaluator.
    pub fn with_defaults() -> Self {
        let mut pipe = Pipe::new();
        pipe.register(StdConverters);
        pipe.register(EvalConverters);
        pipe
    }

    /// Installs a provider's converters. Later registrations overwrite
    /// earlier ones of the same name.
    pub fn register<P: ConverterProvider>(&mut self, provider: P) {
        provider.register_into(&mut self.registry);
    }

    /// Convenience: installs path lookup converters bound to a set of
    /// named globals.
    pub fn register_path_finder(&mut self, finder: PathFinder) {
        self.register(crate::converters::PathConverters::new(finder));
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    /// Whether the head converter of `expr` resolves to an n-ary
    /// registration.
    pub fn is_nary(&self, expr: &str) -> bool {
        self.registry.is_nary(expr)
    }

    /// Runs a pipeline expression against an input value.
    pub fn run(&self, pipe_expr: &str, value: Value) -> Result<Value, PipeError> {
        let expanded = shorthand::expand(pipe_expr);
        let stages = tokenizer::tokenize(&expanded);
        self.run_stages(&stages, value)
    }

    fn run_stages(&self, stages: &[Stage], mut value: Value) -> Result<Value, PipeError> {
        let mut each_mode = false;
        for stage in stages {
            let head = stage[0].as_str();
            if head.eq_ignore_ascii_case("each") {
                if stage.len() == 1 {
                    each_mode = true;
                } else {
                    value = self.convert_each(&stage[1..], value)?;
                }
                continue;
            }
            if head.eq_ignore_ascii_case("reduce") {
                value = self.convert_reduce(&stage[1..], value)?;
                continue;
            }
            if each_mode {
                value = self.convert_each(stage, value)?;
                continue;
            }
            // In Normal state an array accumulator always dispatches
            // through the n-ary path; a converter without an n-ary
            // registration is a fatal miss, never a unary fallback.
            value = match value {
                Value::Array(items) => self.convert_expr_array(stage, &items)?,
                other => self.convert_expr(stage, other)?,
            };
        }
        Ok(value)
    }

    /// Applies a converter to every element of an array.
    fn convert_each(&self, tokens: &[String], value: Value) -> Result<Value, PipeError> {
        if tokens.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let items = match value {
            Value::Array(items) => items,
            other => return Err(PipeError::ExpectedArray(format!("Each (got {})", other.type_name()))),
        };
        let (selector, rest) = self.split_selector(tokens)?;
        if rest.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let tag = match selector {
            ElementSelector::Fixed(tag) => Some(tag),
            ElementSelector::Infer => TypeTag::infer(&items),
            ElementSelector::None => None,
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let converted = self.convert_expr(rest, item)?;
            out.push(self.coerce_tagged(tag, converted)?);
        }
        Ok(Value::Array(out))
    }

    /// Folds an array into one value through an n-ary converter called
    /// with `(accumulator, item)`.
    fn convert_reduce(&self, tokens: &[String], value: Value) -> Result<Value, PipeError> {
        if tokens.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(PipeError::ExpectedArray(format!(
                    "Reduce (got {})",
                    other.type_name()
                )))
            }
        };
        let (selector, rest) = self.split_selector(tokens)?;
        let tag = match selector {
            ElementSelector::Fixed(tag) => Some(tag),
            ElementSelector::Infer => TypeTag::infer(&items),
            ElementSelector::None => None,
        };
        if rest.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let mut acc = match tag {
            Some(tag) => tag.default_value(),
            None => Value::Null,
        };
        for item in items {
            let step = self.convert_expr_array(rest, &[acc, item])?;
            acc = self.coerce_tagged(tag, step)?;
        }
        Ok(acc)
    }

    fn split_selector<'a>(
        &self,
        tokens: &'a [String],
    ) -> Result<(ElementSelector, &'a [String]), PipeError> {
        let selector = parse_selector(&tokens[0])?;
        match selector {
            ElementSelector::None => Ok((selector, tokens)),
            _ => Ok((selector, &tokens[1..])),
        }
    }

    fn coerce_tagged(&self, tag: Option<TypeTag>, value: Value) -> Result<Value, PipeError> {
        match tag {
            None => Ok(value),
            Some(tag) => {
                let shown = value.type_name();
                tag.coerce(value).ok_or_else(|| {
                    PipeError::Converter(ConvError::Value(format!(
                        "cannot coerce {} to {}",
                        shown, tag
                    )))
                })
            }
        }
    }

    /// Runs one converter expression against a single value.
    fn convert_expr(&self, tokens: &[String], value: Value) -> Result<Value, PipeError> {
        if tokens.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let (name, args) = resolve_typed_name(&tokens[0], &tokens[1..]);
        let f = self
            .registry
            .unary(&name)
            .ok_or_else(|| PipeError::UnknownConverter(name.clone()))?;
        Ok(f(value, &args)?)
    }

    /// Runs one n-ary converter expression against a slice of values.
    fn convert_expr_array(&self, tokens: &[String], vals: &[Value]) -> Result<Value, PipeError> {
        if tokens.is_empty() {
            return Err(PipeError::EmptyStage);
        }
        let (name, args) = resolve_typed_name(&tokens[0], &tokens[1..]);
        let f = self
            .registry
            .nary(&name)
            .ok_or_else(|| PipeError::UnknownNAryConverter(name.clone()))?;
        Ok(f(vals, &args)?)
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Pipe::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_pipe() -> Pipe {
        let mut pipe = Pipe::with_defaults();
        pipe.registry_mut().register_unary("Plus1IfOdd", |v, _| {
            let n = v
                .as_int()
                .ok_or_else(|| ConvError::Value("expected an integer".into()))?;
            Ok(Value::Integer(if n % 2 == 1 { n + 1 } else { n }))
        });
        pipe.registry_mut().register_nary("SumInt64", |vals, _| {
            let mut total = 0i64;
            for v in vals {
                total += v
                    .as_int()
                    .ok_or_else(|| ConvError::Value("expected an integer".into()))?;
            }
            Ok(Value::Integer(total))
        });
        pipe
    }

    #[test]
    fn test_single_stage() {
        let pipe = Pipe::with_defaults();
        let out = pipe.run("Convert ToInt32", Value::String("42".into())).unwrap();
        assert_eq!(out, Value::Integer(42));
    }

    #[test]
    fn test_two_stages() {
        let pipe = Pipe::with_defaults();
        let out = pipe
            .run("Convert ToInt32 | AsArrayWithOneItem", Value::Integer(123))
            .unwrap();
        assert_eq!(out, Value::Array(vec![Value::Integer(123)]));
    }

    #[test]
    fn test_each_one_shot() {
        let pipe = counting_pipe();
        let input = Value::Array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
        ]);
        let out = pipe.run("Each Plus1IfOdd", input).unwrap();
        assert_eq!(
            out,
            Value::Array(vec![
                Value::Integer(2),
                Value::Integer(2),
                Value::Integer(4),
            ])
        );
    }

    #[test]
    fn test_bare_each_is_sticky() {
        let pipe = counting_pipe();
        let input = Value::Array(vec![Value::Integer(1), Value::Integer(3)]);
        let out = pipe.run("Each | Plus1IfOdd | Plus1IfOdd", input).unwrap();
        assert_eq!(out, Value::Array(vec![Value::Integer(2), Value::Integer(4)]));
    }

    #[test]
    fn test_typed_broadcast_then_sum() {
        let pipe = counting_pipe();
        let input = Value::Array((1..=100).map(Value::Integer).collect());
        let out = pipe
            .run("Each Type[Int64] Plus1IfOdd | SumInt64", input)
            .unwrap();
        assert_eq!(out, Value::Integer(5100));
    }

    #[test]
    fn test_reduce_fold() {
        let pipe = Pipe::with_defaults();
        let input = Value::Array((1..=100).map(Value::Integer).collect());
        let out = pipe
            .run("Reduce Type[Int64] ExprEval 'acc + v' acc v", input)
            .unwrap();
        assert_eq!(out, Value::Integer(5050));
    }

    #[test]
    fn test_reduce_without_selector_seeds_null() {
        let pipe = Pipe::with_defaults();
        let input = Value::Array(vec![Value::Integer(2), Value::Integer(3)]);
        // Null counts as zero inside the fold expression.
        let out = pipe.run("Reduce ExprEval 'acc + v' acc v", input).unwrap();
        assert_eq!(out, Value::Integer(5));
    }

    #[test]
    fn test_unknown_converter() {
        let pipe = Pipe::with_defaults();
        let err = pipe.run("NoSuchThing", Value::Integer(1)).unwrap_err();
        assert!(matches!(err, PipeError::UnknownConverter(name) if name == "NoSuchThing"));
    }

    #[test]
    fn test_each_on_scalar_fails() {
        let pipe = counting_pipe();
        let err = pipe.run("Each Plus1IfOdd", Value::Integer(1)).unwrap_err();
        assert!(matches!(err, PipeError::ExpectedArray(_)));
    }

    #[test]
    fn test_array_in_normal_state_requires_nary() {
        let pipe = Pipe::with_defaults();
        let input = Value::Array(vec![Value::String("a".into()), Value::String("b".into())]);
        let err = pipe.run("ToUpper", input).unwrap_err();
        assert!(matches!(err, PipeError::UnknownNAryConverter(name) if name == "ToUpper"));
    }

    #[test]
    fn test_selector_only_each_is_an_error() {
        let pipe = Pipe::with_defaults();
        let err = pipe.run("Each Type[Int64]", Value::Array(vec![])).unwrap_err();
        assert!(matches!(err, PipeError::EmptyStage));
    }

    #[test]
    fn test_unknown_type_selector() {
        let pipe = counting_pipe();
        let input = Value::Array(vec![Value::Integer(1)]);
        let err = pipe.run("Each Type[Int13] Plus1IfOdd", input).unwrap_err();
        assert!(matches!(err, PipeError::UnknownType(name) if name == "Int13"));
    }
}
