use ducto::{from_json, ConvError, Pipe, PipeError, Value};
use serde_json::json;

fn run(pipe_expr: &str, value: Value) -> Result<Value, PipeError> {
    Pipe::with_defaults().run(pipe_expr, value)
}

#[test]
fn test_convert_then_wrap() {
    let result = run("Convert ToInt32 | AsArrayWithOneItem", Value::String("123".into())).unwrap();
    assert_eq!(result, Value::Array(vec![Value::Integer(123)]));
}

#[test]
fn test_bare_type_shorthand() {
    assert_eq!(run("Int32", Value::String("7".into())).unwrap(), Value::Integer(7));
    assert_eq!(run("Boolean", Value::String("true".into())).unwrap(), Value::Boolean(true));
}

#[test]
fn test_array_type_shorthand() {
    let input = from_json(&json!(["1", "2", "3"]));
    let result = run("Int64[]", input).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
    );
}

#[test]
fn test_each_broadcast_keeps_length_and_order() {
    let input = from_json(&json!(["a", "b", "c"]));
    let result = run("Each ToUpper", input).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![
            Value::String("A".into()),
            Value::String("B".into()),
            Value::String("C".into()),
        ])
    );
}

#[test]
fn test_odd_plus_one_sum() {
    let mut pipe = Pipe::with_defaults();
    pipe.registry_mut().register_unary("Int64OddPlusOne", |v, _| {
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

    let input = Value::Array((1..=100).map(|n| Value::String(n.to_string())).collect());
    let result = pipe
        .run("Int64[] | Each Type[Int64] Int64OddPlusOne | SumInt64", input)
        .unwrap();
    assert_eq!(result, Value::Integer(5100));
}

#[test]
fn test_eval_shorthand_matches_custom_converters() {
    let input = Value::Array((1..=100).map(Value::Integer).collect());
    let result = run(
        "EachEval[Int64] 'IF(v%2==1, v+1, v)' v | ReduceEval[Int64] 'acc + v' acc v",
        input,
    )
    .unwrap();
    assert_eq!(result, Value::Integer(5100));
}

#[test]
fn test_expr_eval_forms() {
    assert_eq!(run("ExprEval '4 - 1'", Value::Null).unwrap(), Value::Integer(3));
    assert_eq!(run("ExprEval 'a - 1' a", Value::Integer(7)).unwrap(), Value::Integer(6));

    let result = run(
        "ExprEvalN 'a - b' a b",
        Value::Array(vec![Value::Integer(7), Value::Integer(3)]),
    )
    .unwrap();
    assert_eq!(result, Value::Integer(4));
}

#[test]
fn test_typeof_selector_infers_element_type() {
    let input = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
    let result = run("Each typeof ExprEval 'v * 2' v", input).unwrap();
    assert_eq!(result, Value::Array(vec![Value::Integer(2), Value::Integer(4)]));
}

#[test]
fn test_reduce_fold_sums() {
    let input = Value::Array((1..=10).map(Value::Integer).collect());
    let result = run("Reduce Type[Int64] ExprEval 'acc + v' acc v", input).unwrap();
    assert_eq!(result, Value::Integer(55));
}

#[test]
fn test_reduce_without_selector_starts_from_nothing() {
    let input = Value::Array(vec![Value::Integer(4), Value::Integer(6)]);
    let result = run("Reduce ExprEval 'acc + v' acc v", input).unwrap();
    assert_eq!(result, Value::Integer(10));
}

#[test]
fn test_sticky_each_applies_to_all_later_stages() {
    let input = from_json(&json!(["a,b", "c,d"]));
    let result = run("Each | Split ',' | AsFirstItemOfArray", input).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![Value::String("a".into()), Value::String("c".into())])
    );
}

#[test]
fn test_quoted_argument_stays_one_token() {
    let result = run("ConstValue 'hello world'", Value::Null).unwrap();
    assert_eq!(result, Value::String("hello world".into()));
}

#[test]
fn test_one_of_picks_first_non_null() {
    let input = Value::Array(vec![Value::Null, Value::Null, Value::String("x".into())]);
    assert_eq!(run("OneOf", input).unwrap(), Value::String("x".into()));
}

#[test]
fn test_property_chain_over_objects() {
    let input = from_json(&json!({"user": {"name": "ada"}}));
    let result = run("Property user | Property name | ToUpper", input).unwrap();
    assert_eq!(result, Value::String("ADA".into()));
}

#[test]
fn test_item_property_plucks_fields() {
    let input = from_json(&json!([[{"n": 1}, {"n": 2}, {"other": 3}]]));
    let result = run("Each ItemProperty n", input).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![Value::Array(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Null,
        ])])
    );
}

#[test]
fn test_array_stage_dispatches_nary() {
    // An array accumulator resolves the stage against the n-ary map;
    // a unary-only converter is a fatal miss rather than a fallback.
    let input = from_json(&json!(["10", "20"]));
    let result = run("Int64[]", input.clone()).unwrap();
    assert_eq!(result, Value::Array(vec![Value::Integer(10), Value::Integer(20)]));

    let err = run("ToUpper", input).unwrap_err();
    assert!(matches!(err, PipeError::UnknownNAryConverter(name) if name == "ToUpper"));
}

#[test]
fn test_registered_converter_overwrites() {
    let mut pipe = Pipe::with_defaults();
    pipe.registry_mut()
        .register_unary("ToUpper", |_, _| Ok(Value::String("overridden".into())));
    let result = pipe.run("ToUpper", Value::String("abc".into())).unwrap();
    assert_eq!(result, Value::String("overridden".into()));
}

#[test]
fn test_unknown_converter_names_the_typed_variant() {
    let err = run("Missing[Int64] x", Value::Integer(1)).unwrap_err();
    assert!(matches!(err, PipeError::UnknownConverter(name) if name == "Missing_Typed"));
}

#[test]
fn test_null_flows_through_conversions() {
    assert_eq!(run("Convert ToInt32 | ToUpper", Value::Null).unwrap(), Value::Null);
}

#[test]
fn test_empty_stages_are_skipped() {
    let result = run("Convert ToInt32 | | AsArrayWithOneItem", Value::String("9".into())).unwrap();
    assert_eq!(result, Value::Array(vec![Value::Integer(9)]));
}
