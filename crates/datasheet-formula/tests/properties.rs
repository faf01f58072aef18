//! Property tests for the formula engine

use chrono::{TimeZone, Utc};
use datasheet_core::{Field, FieldKind, FieldMap, FormulaProperty, NumberProperty, Record};
use datasheet_formula::format::format_precision;
use datasheet_formula::parser::{MAX_HEIGHT, MAX_NESTING};
use datasheet_formula::{evaluate, parse_expression, tokenize, EvaluationContext, Value};
use proptest::prelude::*;

fn field_map() -> FieldMap {
    FieldMap::from_fields([
        Field::new("fldA", "a", FieldKind::Number(NumberProperty::default())),
        Field::new("fldB", "b", FieldKind::Number(NumberProperty::with_precision(2))),
        Field::new("fldX", "x", FieldKind::Formula(FormulaProperty::new("", "dst1"))),
    ])
    .unwrap()
}

fn eval_with(expression: &str, a: f64, b: f64) -> Value {
    let map = field_map();
    let record = Record::new("rec1").with_cell("fldA", a).with_cell("fldB", b);
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
    let ctx = EvaluationContext::new(&map, &record, now);
    evaluate(expression, &ctx, map.get("fldX").unwrap())
        .unwrap()
        .value
}

/// Functions taking counts, positions or digits from `{a}` and `{b}`
const COUNT_FUNCTIONS: [&str; 8] = [
    "LEFT(\"abc\", {a})",
    "RIGHT(\"abc\", {a})",
    "MID(\"abc\", {a}, {b})",
    "REPLACE(\"abc\", {a}, {b}, \"x\")",
    "REPT(\"ab\", {a})",
    "FIND(\"c\", \"abc\", {a})",
    "ROUND(1.5, {a})",
    "DATEADD(TODAY(), {a}, \"days\")",
];

proptest! {
    #[test]
    fn lexer_never_panics(input in "\\PC*") {
        let _ = tokenize(&input);
    }

    #[test]
    fn parser_never_panics(input in "[-+*/%^&|=<>!(){},\"' a-z0-9\\\\.]{0,40}") {
        let _ = parse_expression(&input);
    }

    #[test]
    fn long_operator_chains_never_overflow(
        ops in prop::collection::vec(
            prop::sample::select(vec!["+", "-", "*", "/", "^", "&", "<", "=", "&&"]),
            0..3000,
        ),
        parens in 0usize..300,
    ) {
        let mut expression = "(".repeat(parens);
        expression.push_str("{a}");
        for op in &ops {
            expression.push_str(op);
            expression.push_str("{b}");
        }
        expression.push_str(&")".repeat(parens));

        if let Ok(parsed) = parse_expression(&expression) {
            prop_assert!(parsed.ast().nesting() <= MAX_NESTING);
            prop_assert!(parsed.ast().height() <= MAX_HEIGHT);
            let _ = eval_with(&expression, 1.0, 1.0);
        }
    }

    #[test]
    fn extreme_counts_never_panic(n in prop::num::f64::ANY, m in -1e30f64..1e30) {
        for function in COUNT_FUNCTIONS {
            let _ = eval_with(function, n, m);
            let _ = eval_with(function, m, n);
        }
    }

    #[test]
    fn evaluation_is_idempotent(a in -1e6f64..1e6, b in -1e6f64..1e6) {
        let expression = "ROUND({a} * {b} / 7, 3) & \"|\" & IF({a} > {b}, \"gt\", \"le\")";
        prop_assert_eq!(eval_with(expression, a, b), eval_with(expression, a, b));
    }

    #[test]
    fn addition_and_multiplication_commute(a in -1e9f64..1e9, b in -1e9f64..1e9) {
        prop_assert_eq!(eval_with("{a} + {b}", a, b), eval_with("{b} + {a}", a, b));
        prop_assert_eq!(eval_with("{a} * {b}", a, b), eval_with("{b} * {a}", a, b));
    }

    #[test]
    fn precision_round_trip(n in -1e9f64..1e9, precision in 0u8..=6) {
        let text = format_precision(n, precision);
        let reparsed: f64 = text.parse().unwrap();
        prop_assert!((reparsed - n).abs() < 10f64.powi(-i32::from(precision)));
    }

    #[test]
    fn braced_names_do_not_disturb_following_tokens(suffix in 0i32..1000) {
        let map = FieldMap::from_fields([
            Field::new("fld1", "d{", FieldKind::Number(NumberProperty::default())),
            Field::new("fldX", "x", FieldKind::Formula(FormulaProperty::new("", "dst1"))),
        ])
        .unwrap();
        let record = Record::new("rec1").with_cell("fld1", 1);
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let ctx = EvaluationContext::new(&map, &record, now);

        let expression = format!("{{d\\{{}} + {}", suffix);
        let result = evaluate(&expression, &ctx, map.get("fldX").unwrap()).unwrap();
        prop_assert_eq!(result.value, Value::Number(1.0 + f64::from(suffix)));
    }
}
