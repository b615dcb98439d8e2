//! Shorthand expansion: compact stage notations rewritten into canonical
//! stage text before tokenizing.
//!
//! Applied per stage, in fixed order:
//!
//! 1. `ReduceEval[T] ...` → `Reduce Type[T] ExprEval[T] ...`
//! 2. `EachEval[T] ...`   → `Each Type[T] ExprEval[T] ...`
//! 3. a bare primitive type name (`Int64`) → `Convert ToInt64`
//! 4. the array form (`Int64[]`) → `ConvertArray Int64 ToInt64`
//!
//! Anything else passes through unchanged; expansion never rejects input.

use std::sync::OnceLock;

use regex::Regex;

const PRIMITIVE_TYPES: &[&str] = &[
    "String", "Boolean", "Int32", "UInt32", "Int64", "UInt64", "Float32", "Float64",
];

fn each_eval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^EachEval\[([^\]\s]+)\]$").expect("shorthand pattern is valid"))
}

fn reduce_eval_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ReduceEval\[([^\]\s]+)\]$").expect("shorthand pattern is valid")
    })
}

/// Rewrite every stage of a pipeline expression into canonical form.
///
/// # Examples
///
/// ```
/// use ducto::shorthand::expand;
///
/// assert_eq!(
///     expand("Int64[] | Each PlusOneIfOdd | Max"),
///     "ConvertArray Int64 ToInt64 | Each PlusOneIfOdd | Max"
/// );
/// ```
pub fn expand(pipe_expr: &str) -> String {
    pipe_expr
        .split('|')
        .map(expand_stage)
        .collect::<Vec<_>>()
        .join(" | ")
        .trim()
        .to_string()
}

fn expand_stage(stage: &str) -> String {
    let stage = stage.trim();

    // Eval shorthands rewrite only the head token; arguments stay as-is.
    let (head, rest) = match stage.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (stage, ""),
    };
    if let Some(caps) = reduce_eval_regex().captures(head) {
        return join_stage(&format!("Reduce Type[{t}] ExprEval[{t}]", t = &caps[1]), rest);
    }
    if let Some(caps) = each_eval_regex().captures(head) {
        return join_stage(&format!("Each Type[{t}] ExprEval[{t}]", t = &caps[1]), rest);
    }

    for t in PRIMITIVE_TYPES {
        if stage == *t {
            return format!("Convert To{}", t);
        }
        let array_form = format!(r"^{}\s*\[\s*\]$", t);
        if Regex::new(&array_form)
            .map(|re| re.is_match(stage))
            .unwrap_or(false)
        {
            return format!("ConvertArray {t} To{t}", t = t);
        }
    }

    stage.to_string()
}

fn join_stage(head: &str, rest: &str) -> String {
    if rest.is_empty() {
        head.to_string()
    } else {
        format!("{} {}", head, rest)
    }
}

#[test]
fn test_bare_type() {
    assert_eq!(expand("Int32"), "Convert ToInt32");
    assert_eq!(expand("String"), "Convert ToString");
}

#[test]
fn test_array_type() {
    assert_eq!(expand("Int64[]"), "ConvertArray Int64 ToInt64");
    assert_eq!(expand("Int64 [ ]"), "ConvertArray Int64 ToInt64");
}

#[test]
fn test_each_eval() {
    assert_eq!(
        expand("EachEval[Int64] 'a + 1' a"),
        "Each Type[Int64] ExprEval[Int64] 'a + 1' a"
    );
}

#[test]
fn test_reduce_eval() {
    assert_eq!(
        expand("ReduceEval[Int64] 'acc + v' acc v"),
        "Reduce Type[Int64] ExprEval[Int64] 'acc + v' acc v"
    );
}

#[test]
fn test_passthrough_and_mixed() {
    assert_eq!(expand("Convert ToUpper"), "Convert ToUpper");
    assert_eq!(
        expand("Int64[] | Each PlusOneIfOdd | Max"),
        "ConvertArray Int64 ToInt64 | Each PlusOneIfOdd | Max"
    );
    // Unrecognized text is returned as-is.
    assert_eq!(expand("Int128"), "Int128");
}
