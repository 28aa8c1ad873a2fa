//! Per-family coverage of the built-in function library

mod common;

use chrono::{FixedOffset, TimeZone};
use common::{eval_json, patient};
use fhirpath_engine::{EvaluationOptions, FhirPathEngine, FhirPathError};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

async fn eval_err(expression: &str, input: &Value) -> FhirPathError {
    FhirPathEngine::new()
        .evaluate(expression, input)
        .await
        .expect_err("expected an evaluation error")
}

// Existence

#[tokio::test]
async fn test_exists_and_all() {
    let p = patient();
    assert_eq!(eval_json("name.exists()", &p).await, json!([true]));
    assert_eq!(
        eval_json("name.exists(use = 'official')", &p).await,
        json!([true])
    );
    assert_eq!(
        eval_json("name.exists(use = 'maiden')", &p).await,
        json!([false])
    );
    assert_eq!(
        eval_json("name.all(given.exists())", &p).await,
        json!([true])
    );
    assert_eq!(
        eval_json("name.all(family.exists())", &p).await,
        json!([false])
    );
    assert_eq!(eval_json("{}.all(false)", &p).await, json!([true]));
}

#[tokio::test]
async fn test_boolean_collection_tests() {
    let input = json!({"flags": [true, true], "mixed": [true, false]});
    assert_eq!(eval_json("flags.allTrue()", &input).await, json!([true]));
    assert_eq!(eval_json("mixed.allTrue()", &input).await, json!([false]));
    assert_eq!(eval_json("mixed.anyTrue()", &input).await, json!([true]));
    assert_eq!(eval_json("mixed.allFalse()", &input).await, json!([false]));
    assert_eq!(eval_json("mixed.anyFalse()", &input).await, json!([true]));
    assert_eq!(eval_json("{}.allTrue()", &input).await, json!([true]));
    assert_eq!(eval_json("{}.anyTrue()", &input).await, json!([false]));
}

#[tokio::test]
async fn test_subset_superset_distinct() {
    let p = patient();
    assert_eq!(
        eval_json("name.first().given.subsetOf(name.given)", &p).await,
        json!([true])
    );
    assert_eq!(
        eval_json("name.given.supersetOf(name.first().given)", &p).await,
        json!([true])
    );
    assert_eq!(eval_json("name.given.isDistinct()", &p).await, json!([true]));
    assert_eq!(
        eval_json("(1 | 2).combine(1).isDistinct()", &p).await,
        json!([false])
    );
    assert_eq!(eval_json("id.hasValue()", &p).await, json!([true]));
    assert_eq!(eval_json("name.first().hasValue()", &p).await, json!([false]));
}

// Filtering and projection

#[tokio::test]
async fn test_select_flattens() {
    assert_eq!(
        eval_json("name.select(given)", &patient()).await,
        json!(["John", "James", "Johnny"])
    );
}

#[tokio::test]
async fn test_where_binds_index() {
    assert_eq!(
        eval_json("name.given.where($index > 0)", &patient()).await,
        json!(["James", "Johnny"])
    );
}

#[tokio::test]
async fn test_repeat_walks_nested_items() {
    let input = json!({
        "item": [
            {"linkId": "1", "item": [
                {"linkId": "1.1", "item": [{"linkId": "1.1.1"}]}
            ]},
            {"linkId": "2"}
        ]
    });
    assert_eq!(
        eval_json("repeat(item).linkId", &input).await,
        json!(["1", "2", "1.1", "1.1.1"])
    );
}

#[tokio::test]
async fn test_of_type() {
    let input = json!({"mixed": [1, "two", 3, true]});
    assert_eq!(eval_json("mixed.ofType(Integer)", &input).await, json!([1, 3]));
    assert_eq!(
        eval_json("mixed.ofType(String)", &input).await,
        json!(["two"])
    );
    // Unknown type names filter everything out
    assert_eq!(eval_json("mixed.ofType(Nothing)", &input).await, json!([]));
}

// Subsetting

#[tokio::test]
async fn test_take_skip_single() {
    let input = json!({"n": [1, 2, 3, 4, 5]});
    assert_eq!(eval_json("n.take(2)", &input).await, json!([1, 2]));
    assert_eq!(eval_json("n.skip(3)", &input).await, json!([4, 5]));
    assert_eq!(eval_json("n.take(0)", &input).await, json!([]));
    assert_eq!(eval_json("n.skip(99)", &input).await, json!([]));
    assert_eq!(eval_json("n.take(1).single()", &input).await, json!([1]));
    assert_eq!(eval_json("{}.single()", &input).await, json!([]));
    assert!(matches!(
        eval_err("n.single()", &input).await,
        FhirPathError::Evaluation(_)
    ));
}

#[tokio::test]
async fn test_intersect_exclude() {
    let input = json!({});
    assert_eq!(
        eval_json("(1 | 2 | 3).intersect(2 | 3 | 4)", &input).await,
        json!([2, 3])
    );
    assert_eq!(
        eval_json("(1 | 2 | 3).exclude(2)", &input).await,
        json!([1, 3])
    );
}

// Aggregates

#[tokio::test]
async fn test_sum_min_max_avg() {
    let input = json!({"n": [1, 2, 3, 4]});
    assert_eq!(eval_json("n.sum()", &input).await, json!([10]));
    assert_eq!(eval_json("n.min()", &input).await, json!([1]));
    assert_eq!(eval_json("n.max()", &input).await, json!([4]));
    assert_eq!(eval_json("n.avg()", &input).await, json!([2.5]));
    assert_eq!(eval_json("{}.sum()", &input).await, json!([]));
    assert_eq!(eval_json("{}.min()", &input).await, json!([]));
}

#[tokio::test]
async fn test_aggregate_without_init() {
    // Without an init the first step sees an empty $total, so use iif
    let result = eval_json(
        "(1 | 2 | 3).aggregate(iif($total.empty(), $this, $total + $this))",
        &json!({}),
    )
    .await;
    assert_eq!(result, json!([6]));
}

// Strings

#[tokio::test]
async fn test_string_functions() {
    let input = json!({});
    assert_eq!(eval_json("'hello'.indexOf('ll')", &input).await, json!([2]));
    assert_eq!(eval_json("'hello'.indexOf('x')", &input).await, json!([-1]));
    assert_eq!(
        eval_json("'hello'.startsWith('he')", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("'hello'.endsWith('lo')", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("'hello'.contains('ell')", &input).await,
        json!([true])
    );
    assert_eq!(eval_json("'Hello'.upper()", &input).await, json!(["HELLO"]));
    assert_eq!(eval_json("'Hello'.lower()", &input).await, json!(["hello"]));
    assert_eq!(eval_json("'  x  '.trim()", &input).await, json!(["x"]));
    assert_eq!(eval_json("'hello'.length()", &input).await, json!([5]));
    assert_eq!(
        eval_json("'abc'.toChars()", &input).await,
        json!(["a", "b", "c"])
    );
    assert_eq!(
        eval_json("'a,b,c'.split(',')", &input).await,
        json!(["a", "b", "c"])
    );
    assert_eq!(
        eval_json("('a' | 'b' | 'c').join('-')", &input).await,
        json!(["a-b-c"])
    );
    assert_eq!(
        eval_json("'banana'.replace('a', 'o')", &input).await,
        json!(["bonono"])
    );
}

#[tokio::test]
async fn test_regex_functions() {
    let input = json!({});
    assert_eq!(
        eval_json("'hello123'.matches('[a-z]+[0-9]+')", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("'hello'.matches('^[0-9]+$')", &input).await,
        json!([false])
    );
    assert_eq!(
        eval_json("'a1b2'.replaceMatches('[0-9]', 'x')", &input).await,
        json!(["axbx"])
    );
    // Regex syntax errors are evaluation errors, not empty
    assert!(matches!(
        eval_err("'x'.matches('[unclosed')", &input).await,
        FhirPathError::Evaluation(_)
    ));
}

#[tokio::test]
async fn test_encode_decode() {
    let input = json!({});
    assert_eq!(
        eval_json("'hello'.encode('base64')", &input).await,
        json!(["aGVsbG8="])
    );
    assert_eq!(
        eval_json("'aGVsbG8='.decode('base64')", &input).await,
        json!(["hello"])
    );
    assert_eq!(
        eval_json("'hello'.encode('hex')", &input).await,
        json!(["68656c6c6f"])
    );
    assert_eq!(
        eval_json("'68656c6c6f'.decode('hex')", &input).await,
        json!(["hello"])
    );
    assert_eq!(
        eval_json("'hello'.encode('urlbase64').decode('urlbase64')", &input).await,
        json!(["hello"])
    );
    // Undecodable input yields empty
    assert_eq!(eval_json("'!!'.decode('hex')", &input).await, json!([]));
    // The encoding argument is mandatory
    assert!(matches!(
        eval_err("'x'.encode()", &input).await,
        FhirPathError::Evaluation(_)
    ));
}

// Math

#[tokio::test]
async fn test_math_functions() {
    let input = json!({});
    assert_eq!(eval_json("(-5).abs()", &input).await, json!([5]));
    assert_eq!(eval_json("2.4.ceiling()", &input).await, json!([3]));
    assert_eq!(eval_json("2.6.floor()", &input).await, json!([2]));
    assert_eq!(eval_json("2.5.truncate()", &input).await, json!([2]));
    assert_eq!(eval_json("3.14159.round(2)", &input).await, json!([3.14]));
    assert_eq!(eval_json("16.sqrt()", &input).await, json!([4]));
    assert_eq!(eval_json("2.power(10)", &input).await, json!([1024]));
    assert_eq!(eval_json("1000.log(10)", &input).await, json!([3]));
}

#[tokio::test]
async fn test_math_domain_violations_are_empty() {
    let input = json!({});
    assert_eq!(eval_json("(-1).sqrt()", &input).await, json!([]));
    assert_eq!(eval_json("0.ln()", &input).await, json!([]));
    assert_eq!(eval_json("0.log(10)", &input).await, json!([]));
}

// Conversion

#[tokio::test]
async fn test_conversions() {
    let input = json!({});
    assert_eq!(eval_json("'42'.toInteger()", &input).await, json!([42]));
    assert_eq!(eval_json("'abc'.toInteger()", &input).await, json!([]));
    assert_eq!(eval_json("'3.5'.toDecimal()", &input).await, json!([3.5]));
    assert_eq!(eval_json("true.toInteger()", &input).await, json!([1]));
    assert_eq!(eval_json("'true'.toBoolean()", &input).await, json!([true]));
    assert_eq!(eval_json("'1'.toBoolean()", &input).await, json!([true]));
    assert_eq!(eval_json("'0'.toBoolean()", &input).await, json!([false]));
    assert_eq!(eval_json("'yes'.toBoolean()", &input).await, json!([]));
    assert_eq!(eval_json("1.toString()", &input).await, json!(["1"]));
}

#[tokio::test]
async fn test_converts_to() {
    let input = json!({});
    assert_eq!(
        eval_json("'42'.convertsToInteger()", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("'abc'.convertsToInteger()", &input).await,
        json!([false])
    );
    assert_eq!(
        eval_json("'2020-01-01'.convertsToDate()", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("'2020-13-01'.convertsToDate()", &input).await,
        json!([false])
    );
    assert_eq!(eval_json("{}.convertsToInteger()", &input).await, json!([]));
}

#[tokio::test]
async fn test_temporal_conversions() {
    let input = json!({});
    assert_eq!(
        eval_json("'2020-03-05'.toDate().toString()", &input).await,
        json!(["2020-03-05"])
    );
    assert_eq!(
        eval_json("'25:00'.toTime()", &input).await,
        json!([])
    );
    assert_eq!(
        eval_json("'2020-03-05T10:00:00Z'.toDateTime().toString()", &input).await,
        json!(["2020-03-05T10:00:00Z"])
    );
}

#[tokio::test]
async fn test_quantity_literals_and_arithmetic() {
    let input = json!({});
    assert_eq!(
        eval_json("5 'mg' = 5 'mg'", &input).await,
        json!([true])
    );
    // Calendar words normalize to their UCUM codes
    assert_eq!(eval_json("1 year = 1 'a'", &input).await, json!([true]));
    assert_eq!(
        eval_json("4 days + 3 days = 7 days", &input).await,
        json!([true])
    );
    assert_eq!(eval_json("2 'kg' + 2 'g'", &input).await, json!([]));
    assert_eq!(eval_json("2 'kg' < 3 'kg'", &input).await, json!([true]));
    assert_eq!(
        eval_json("\"5 'mg'\".toQuantity().value", &input).await,
        json!([5])
    );
}

#[tokio::test]
async fn test_temporal_comparisons() {
    let input = json!({});
    assert_eq!(eval_json("@2019 < @2020", &input).await, json!([true]));
    // Tied prefix at differing precision is undefined
    assert_eq!(eval_json("@2019 = @2019-03", &input).await, json!([]));
    assert_eq!(eval_json("@2019-03 = @2019-03", &input).await, json!([true]));
    assert_eq!(
        eval_json("@2023-05-01T10:00:00+02:00 = @2023-05-01T08:00:00Z", &input).await,
        json!([true])
    );
    assert_eq!(eval_json("@T09:00 < @T10:30", &input).await, json!([true]));
}

// Clock functions with the injected test seam

#[tokio::test]
async fn test_clock_functions_use_fixed_now() {
    let fixed = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 12, 30, 15)
        .unwrap();
    let options = EvaluationOptions {
        fixed_now: Some(fixed),
        ..Default::default()
    };
    let engine = FhirPathEngine::with_options(options);

    let result = engine.evaluate("today().toString()", &json!({})).await.unwrap();
    assert_eq!(result.to_json(), json!(["2024-06-01"]));

    let result = engine
        .evaluate("now() > @2020-01-01T00:00:00Z", &json!({}))
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!([true]));

    let result = engine
        .evaluate("timeOfDay().toString()", &json!({}))
        .await
        .unwrap();
    assert_eq!(result.to_json(), json!(["12:30:15.000"]));
}

// Navigation

#[tokio::test]
async fn test_children_and_descendants() {
    let input = json!({
        "a": {"b": 1, "_hidden": 9},
        "c": [2, 3]
    });
    // children: the object under a, and the spliced array items
    assert_eq!(eval_json("children().count()", &input).await, json!([3]));
    // descendants adds b's value
    assert_eq!(eval_json("descendants().count()", &input).await, json!([4]));
}

// Type functions

#[tokio::test]
async fn test_is_as_functions_and_operators() {
    let p = patient();
    assert_eq!(eval_json("active is Boolean", &p).await, json!([true]));
    assert_eq!(eval_json("id is String", &p).await, json!([true]));
    assert_eq!(eval_json("$this is Patient", &p).await, json!([true]));
    assert_eq!(eval_json("$this.is(Patient)", &p).await, json!([true]));
    assert_eq!(eval_json("active.is(String)", &p).await, json!([false]));
    assert_eq!(
        eval_json("($this as Patient).id", &p).await,
        json!(["ex"])
    );
    assert_eq!(eval_json("(active as String)", &p).await, json!([]));
    assert_eq!(eval_json("{} is Boolean", &p).await, json!([]));
}

// FHIR-specific

#[tokio::test]
async fn test_extension_functions() {
    let input = json!({
        "resourceType": "Patient",
        "extension": [
            {"url": "http://example.org/weight", "valueDecimal": 72.5},
            {"url": "http://example.org/height", "valueDecimal": 180}
        ]
    });
    assert_eq!(
        eval_json("extension('http://example.org/weight').getValue()", &input).await,
        json!([72.5])
    );
    assert_eq!(
        eval_json("hasExtension('http://example.org/height')", &input).await,
        json!([true])
    );
    assert_eq!(
        eval_json("hasExtension('http://example.org/none')", &input).await,
        json!([false])
    );
}
