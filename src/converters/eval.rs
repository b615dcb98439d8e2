//! Converters wrapping the expression evaluator.
//!
//! `ExprEval <expr> <var>` evaluates `<expr>` with the pipeline value
//! bound to `<var>`. The n-ary form binds one variable name per incoming
//! value, which is what `Reduce` uses for its `(accumulator, item)` fold.
//! Typed variants (`ExprEval[Int64]`) coerce the result.

use std::collections::HashMap;

use crate::expr::Expression;
use crate::registry::{ConvError, ConverterProvider, ConverterRegistry};
use crate::tokenizer::trim_quotes;
use crate::value::{TypeTag, Value};

/// Installs the `ExprEval` converter family.
pub struct EvalConverters;

fn expr_arg<'a>(args: &'a [String], index: usize) -> Result<&'a str, ConvError> {
    args.get(index)
        .map(|s| trim_quotes(s))
        .ok_or_else(|| ConvError::Argument("missing expression".into()))
}

fn tag_arg(args: &[String]) -> Result<TypeTag, ConvError> {
    let name = args
        .first()
        .ok_or_else(|| ConvError::Argument("missing type name".into()))?;
    TypeTag::resolve(name).ok_or_else(|| ConvError::Argument(format!("unknown type \"{}\"", name)))
}

/// Absent values read as zero inside expressions, so an unseeded fold
/// can accumulate from nothing.
fn bound(value: Value) -> Value {
    match value {
        Value::Null => Value::Integer(0),
        other => other,
    }
}

fn eval_unary(value: Value, expr_src: &str, var: Option<&String>) -> Result<Value, ConvError> {
    let expr = Expression::parse(expr_src)?;
    let mut vars = HashMap::new();
    if let Some(name) = var {
        vars.insert(name.clone(), bound(value));
    }
    Ok(expr.eval(&vars)?)
}

fn eval_nary(vals: &[Value], expr_src: &str, names: &[String]) -> Result<Value, ConvError> {
    let expr = Expression::parse(expr_src)?;
    let mut vars = HashMap::new();
    for (i, name) in names.iter().enumerate() {
        let value = vals
            .get(i)
            .cloned()
            .ok_or_else(|| ConvError::Argument(format!("expected a value for \"{}\"", name)))?;
        vars.insert(name.clone(), bound(value));
    }
    Ok(expr.eval(&vars)?)
}

fn expr_eval_n(vals: &[Value], args: &[String]) -> Result<Value, ConvError> {
    eval_nary(vals, expr_arg(args, 0)?, &args[1..])
}

fn expr_eval_n_typed(vals: &[Value], args: &[String]) -> Result<Value, ConvError> {
    let tag = tag_arg(args)?;
    let out = eval_nary(vals, expr_arg(args, 1)?, &args[2..])?;
    coerce_result(tag, out)
}

fn coerce_result(tag: TypeTag, value: Value) -> Result<Value, ConvError> {
    let shown = value.type_name();
    tag.coerce(value)
        .ok_or_else(|| ConvError::Value(format!("cannot coerce {} to {}", shown, tag)))
}

impl ConverterProvider for EvalConverters {
    fn register_into(self, registry: &mut ConverterRegistry) {
        registry.register_unary("ExprEval", |value, args| {
            eval_unary(value, expr_arg(args, 0)?, args.get(1))
        });

        registry.register_unary("ExprEval_Typed", |value, args| {
            let tag = tag_arg(args)?;
            let out = eval_unary(value, expr_arg(args, 1)?, args.get(2))?;
            coerce_result(tag, out)
        });

        registry.register_nary("ExprEvalN", expr_eval_n);
        // Alias so `Reduce ... ExprEval ...` reads the same as the unary
        // form.
        registry.register_nary("ExprEval", expr_eval_n);

        registry.register_nary("ExprEvalN_Typed", expr_eval_n_typed);
        registry.register_nary("ExprEval_Typed", expr_eval_n_typed);
    }
}
