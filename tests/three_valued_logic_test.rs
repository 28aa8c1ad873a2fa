//! Truth tables for the three-valued logical operators
//!
//! Every cell of the and/or/xor tables, with `{}` as the unknown value.
//! `implies` short-circuits on the left operand: a false or empty left
//! side is vacuously true.

mod common;

use common::eval_json;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

async fn logic(expression: &str) -> Value {
    eval_json(expression, &json!({})).await
}

#[rstest]
#[case("true and true", json!([true]))]
#[case("true and false", json!([false]))]
#[case("true and {}", json!([]))]
#[case("false and true", json!([false]))]
#[case("false and false", json!([false]))]
#[case("false and {}", json!([false]))]
#[case("{} and true", json!([]))]
#[case("{} and false", json!([false]))]
#[case("{} and {}", json!([]))]
#[tokio::test]
async fn test_and_table(#[case] expression: &str, #[case] expected: Value) {
    assert_eq!(logic(expression).await, expected, "{expression}");
}

#[rstest]
#[case("true or true", json!([true]))]
#[case("true or false", json!([true]))]
#[case("true or {}", json!([true]))]
#[case("false or true", json!([true]))]
#[case("false or false", json!([false]))]
#[case("false or {}", json!([]))]
#[case("{} or true", json!([true]))]
#[case("{} or false", json!([]))]
#[case("{} or {}", json!([]))]
#[tokio::test]
async fn test_or_table(#[case] expression: &str, #[case] expected: Value) {
    assert_eq!(logic(expression).await, expected, "{expression}");
}

#[rstest]
#[case("true xor true", json!([false]))]
#[case("true xor false", json!([true]))]
#[case("true xor {}", json!([]))]
#[case("false xor true", json!([true]))]
#[case("false xor false", json!([false]))]
#[case("false xor {}", json!([]))]
#[case("{} xor true", json!([]))]
#[case("{} xor false", json!([]))]
#[case("{} xor {}", json!([]))]
#[tokio::test]
async fn test_xor_table(#[case] expression: &str, #[case] expected: Value) {
    assert_eq!(logic(expression).await, expected, "{expression}");
}

#[rstest]
#[case("true implies true", json!([true]))]
#[case("true implies false", json!([false]))]
#[case("true implies {}", json!([]))]
#[case("false implies true", json!([true]))]
#[case("false implies false", json!([true]))]
#[case("false implies {}", json!([true]))]
#[case("{} implies true", json!([true]))]
#[case("{} implies false", json!([true]))]
#[case("{} implies {}", json!([true]))]
#[tokio::test]
async fn test_implies_table(#[case] expression: &str, #[case] expected: Value) {
    assert_eq!(logic(expression).await, expected, "{expression}");
}

#[tokio::test]
async fn test_short_circuit_skips_right_operand() {
    // The right side would error on evaluation (single() over two items)
    // but must never run
    assert_eq!(
        logic("false and (1 | 2).single()").await,
        json!([false])
    );
    assert_eq!(logic("true or (1 | 2).single()").await, json!([true]));
    assert_eq!(
        logic("false implies (1 | 2).single()").await,
        json!([true])
    );
}
