//! Built-in function library
//!
//! A registry keyed by function name. Each entry records the accepted
//! arity, whether the function receives its argument expressions
//! unevaluated (`lazy`), and the family it belongs to; the tables double as
//! the static metadata surface for tooling. Dispatch itself is a single
//! match per name; every function is registered exactly once.

use rustc_hash::FxHashMap;

use crate::ast::ExpressionNode;
use crate::evaluator::engine::Evaluator;
use crate::evaluator::{EvaluationContext, EvaluationError, EvaluationResult};
use crate::model::Collection;

pub mod aggregate;
pub mod combining;
pub mod conversion;
pub mod datetime;
pub mod existence;
pub mod fhir;
pub mod filtering;
pub mod logic;
pub mod math;
pub mod navigation;
pub mod strings;
pub mod subsetting;
pub mod typing;
pub mod utility;

/// Functional family of a built-in, used by tooling surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionFamily {
    /// `empty`, `exists`, `all`, ...
    Existence,
    /// `where`, `select`, `ofType`, `repeat`
    Filtering,
    /// `first`, `take`, `distinct`, ...
    Subsetting,
    /// `count`, `sum`, `aggregate`, ...
    Aggregate,
    /// `combine`, `union`
    Combining,
    /// String operations
    String,
    /// Math operations
    Math,
    /// `toX` / `convertsToX`
    Conversion,
    /// `now`, `today`, `timeOfDay`
    DateTime,
    /// `not`, `iif`
    Logic,
    /// `children`, `descendants`
    Navigation,
    /// `is`, `as` function forms
    Type,
    /// FHIR-specific operations
    Fhir,
    /// `trace`, `defineVariable`
    Utility,
}

/// Static description of one built-in function
#[derive(Debug, Clone, Copy)]
pub struct FunctionMeta {
    /// Function name as written in expressions
    pub name: &'static str,
    /// Minimum argument count
    pub min_args: usize,
    /// Maximum argument count
    pub max_args: usize,
    /// Whether arguments are passed as unevaluated expressions and
    /// evaluated per item with `$this`/`$index`/`$total` rebound
    pub lazy: bool,
    /// Family for tooling
    pub family: FunctionFamily,
}

impl FunctionMeta {
    fn check_arity(&self, actual: usize) -> EvaluationResult<()> {
        if actual < self.min_args || actual > self.max_args {
            let expected = if self.min_args == self.max_args {
                self.min_args.to_string()
            } else {
                format!("{}..{}", self.min_args, self.max_args)
            };
            return Err(EvaluationError::InvalidArgumentCount {
                function: self.name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Registry of all built-in functions
pub struct FunctionRegistry {
    functions: FxHashMap<&'static str, FunctionMeta>,
}

impl FunctionRegistry {
    /// Build the standard registry
    pub fn standard() -> Self {
        use FunctionFamily::*;
        let mut functions = FxHashMap::default();
        let mut add = |name: &'static str, min: usize, max: usize, lazy: bool, family| {
            let previous = functions.insert(
                name,
                FunctionMeta {
                    name,
                    min_args: min,
                    max_args: max,
                    lazy,
                    family,
                },
            );
            debug_assert!(previous.is_none(), "duplicate registration: {name}");
        };

        // Existence
        add("empty", 0, 0, false, Existence);
        add("exists", 0, 1, true, Existence);
        add("all", 1, 1, true, Existence);
        add("allTrue", 0, 0, false, Existence);
        add("anyTrue", 0, 0, false, Existence);
        add("allFalse", 0, 0, false, Existence);
        add("anyFalse", 0, 0, false, Existence);
        add("hasValue", 0, 0, false, Existence);
        add("isDistinct", 0, 0, false, Existence);
        add("subsetOf", 1, 1, false, Existence);
        add("supersetOf", 1, 1, false, Existence);

        // Filtering / projection
        add("where", 1, 1, true, Filtering);
        add("select", 1, 1, true, Filtering);
        add("repeat", 1, 1, true, Filtering);
        add("ofType", 1, 1, true, Filtering);

        // Subsetting
        add("first", 0, 0, false, Subsetting);
        add("last", 0, 0, false, Subsetting);
        add("tail", 0, 0, false, Subsetting);
        add("take", 1, 1, false, Subsetting);
        add("skip", 1, 1, false, Subsetting);
        add("single", 0, 0, false, Subsetting);
        add("distinct", 0, 0, false, Subsetting);
        add("intersect", 1, 1, false, Subsetting);
        add("exclude", 1, 1, false, Subsetting);

        // Aggregates
        add("count", 0, 0, false, Aggregate);
        add("sum", 0, 0, false, Aggregate);
        add("min", 0, 0, false, Aggregate);
        add("max", 0, 0, false, Aggregate);
        add("avg", 0, 0, false, Aggregate);
        add("aggregate", 1, 2, true, Aggregate);

        // Combining
        add("combine", 1, 1, false, Combining);
        add("union", 1, 1, false, Combining);

        // Strings
        add("indexOf", 1, 1, false, String);
        add("substring", 1, 2, false, String);
        add("startsWith", 1, 1, false, String);
        add("endsWith", 1, 1, false, String);
        add("contains", 1, 1, false, String);
        add("upper", 0, 0, false, String);
        add("lower", 0, 0, false, String);
        add("trim", 0, 0, false, String);
        add("replace", 2, 2, false, String);
        add("matches", 1, 1, false, String);
        add("replaceMatches", 2, 2, false, String);
        add("length", 0, 0, false, String);
        add("toChars", 0, 0, false, String);
        add("split", 1, 1, false, String);
        add("join", 0, 1, false, String);
        add("encode", 1, 1, false, String);
        add("decode", 1, 1, false, String);

        // Math
        add("abs", 0, 0, false, Math);
        add("ceiling", 0, 0, false, Math);
        add("floor", 0, 0, false, Math);
        add("round", 0, 1, false, Math);
        add("truncate", 0, 0, false, Math);
        add("sqrt", 0, 0, false, Math);
        add("exp", 0, 0, false, Math);
        add("ln", 0, 0, false, Math);
        add("log", 1, 1, false, Math);
        add("power", 1, 1, false, Math);

        // Conversion
        add("toInteger", 0, 0, false, Conversion);
        add("toDecimal", 0, 0, false, Conversion);
        add("toString", 0, 0, false, Conversion);
        add("toBoolean", 0, 0, false, Conversion);
        add("toDate", 0, 0, false, Conversion);
        add("toDateTime", 0, 0, false, Conversion);
        add("toTime", 0, 0, false, Conversion);
        add("toQuantity", 0, 1, false, Conversion);
        add("convertsToInteger", 0, 0, false, Conversion);
        add("convertsToDecimal", 0, 0, false, Conversion);
        add("convertsToString", 0, 0, false, Conversion);
        add("convertsToBoolean", 0, 0, false, Conversion);
        add("convertsToDate", 0, 0, false, Conversion);
        add("convertsToDateTime", 0, 0, false, Conversion);
        add("convertsToTime", 0, 0, false, Conversion);
        add("convertsToQuantity", 0, 1, false, Conversion);

        // Date/time
        add("now", 0, 0, false, DateTime);
        add("today", 0, 0, false, DateTime);
        add("timeOfDay", 0, 0, false, DateTime);

        // Logic
        add("not", 0, 0, false, Logic);
        add("iif", 2, 3, true, Logic);

        // Navigation
        add("children", 0, 0, false, Navigation);
        add("descendants", 0, 0, false, Navigation);

        // Type operators as functions
        add("is", 1, 1, true, Type);
        add("as", 1, 1, true, Type);

        // FHIR-specific
        add("extension", 1, 1, false, Fhir);
        add("hasExtension", 1, 1, false, Fhir);
        add("getValue", 0, 0, false, Fhir);
        add("resolve", 0, 0, false, Fhir);
        add("memberOf", 1, 1, false, Fhir);
        add("htmlChecks", 0, 0, false, Fhir);

        // Utility
        add("trace", 1, 2, true, Utility);
        add("defineVariable", 1, 2, true, Utility);

        Self { functions }
    }

    /// Look a function up by name
    pub fn get(&self, name: &str) -> Option<&FunctionMeta> {
        self.functions.get(name)
    }

    /// Whether the registry knows the name
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// All registered function names (unordered)
    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// All metadata entries (unordered), the tooling surface
    pub fn metadata(&self) -> impl Iterator<Item = &FunctionMeta> + '_ {
        self.functions.values()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Dispatch a built-in by name against the receiver collection.
/// Eager arguments are evaluated left to right in the caller's context;
/// lazy functions receive their argument ASTs and rebind per item.
pub async fn dispatch(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    name: &str,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    let meta = ev
        .registry()
        .get(name)
        .ok_or_else(|| EvaluationError::UnknownFunction {
            name: name.to_string(),
        })?;
    meta.check_arity(args.len())?;

    if meta.lazy {
        return dispatch_lazy(ev, ctx, input, name, args).await;
    }

    let mut eval_args = Vec::with_capacity(args.len());
    for arg in args {
        eval_args.push(ev.evaluate(arg, ctx).await?);
    }
    dispatch_eager(ev, ctx, input, name, &eval_args).await
}

async fn dispatch_lazy(
    ev: &Evaluator,
    ctx: &mut EvaluationContext,
    input: &Collection,
    name: &str,
    args: &[ExpressionNode],
) -> EvaluationResult<Collection> {
    match name {
        "exists" => existence::exists(ev, ctx, input, args).await,
        "all" => existence::all(ev, ctx, input, &args[0]).await,
        "where" => filtering::where_fn(ev, ctx, input, &args[0]).await,
        "select" => filtering::select_fn(ev, ctx, input, &args[0]).await,
        "repeat" => filtering::repeat_fn(ev, ctx, input, &args[0]).await,
        "ofType" => filtering::of_type(ev, input, &args[0]),
        "aggregate" => aggregate::aggregate_fn(ev, ctx, input, args).await,
        "iif" => logic::iif(ev, ctx, input, args).await,
        "is" => typing::is_fn(ev, input, &args[0]),
        "as" => typing::as_fn(ev, input, &args[0]),
        "trace" => utility::trace(ev, ctx, input, args).await,
        "defineVariable" => utility::define_variable(ev, ctx, input, args).await,
        _ => Err(EvaluationError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

async fn dispatch_eager(
    ev: &Evaluator,
    ctx: &EvaluationContext,
    input: &Collection,
    name: &str,
    args: &[Collection],
) -> EvaluationResult<Collection> {
    match name {
        // Existence
        "empty" => Ok(existence::empty(input)),
        "allTrue" => existence::all_true(input),
        "anyTrue" => existence::any_true(input),
        "allFalse" => existence::all_false(input),
        "anyFalse" => existence::any_false(input),
        "hasValue" => Ok(existence::has_value(input)),
        "isDistinct" => Ok(existence::is_distinct(input)),
        "subsetOf" => Ok(existence::subset_of(input, &args[0])),
        "supersetOf" => Ok(existence::superset_of(input, &args[0])),

        // Subsetting
        "first" => Ok(subsetting::first(input)),
        "last" => Ok(subsetting::last(input)),
        "tail" => Ok(subsetting::tail(input)),
        "take" => subsetting::take(input, &args[0]),
        "skip" => subsetting::skip(input, &args[0]),
        "single" => subsetting::single(input),
        "distinct" => Ok(input.distinct()),
        "intersect" => Ok(subsetting::intersect(input, &args[0])),
        "exclude" => Ok(subsetting::exclude(input, &args[0])),

        // Aggregates
        "count" => Ok(aggregate::count(input)),
        "sum" => aggregate::sum(input),
        "min" => aggregate::min(input),
        "max" => aggregate::max(input),
        "avg" => aggregate::avg(input),

        // Combining
        "combine" => Ok(combining::combine(input, &args[0])),
        "union" => Ok(combining::union(input, &args[0])),

        // Strings
        "indexOf" => strings::index_of(input, &args[0]),
        "substring" => strings::substring(input, args),
        "startsWith" => strings::starts_with(input, &args[0]),
        "endsWith" => strings::ends_with(input, &args[0]),
        "contains" => strings::contains(input, &args[0]),
        "upper" => strings::upper(input),
        "lower" => strings::lower(input),
        "trim" => strings::trim(input),
        "replace" => strings::replace(input, &args[0], &args[1]),
        "matches" => strings::matches(input, &args[0]),
        "replaceMatches" => strings::replace_matches(input, &args[0], &args[1]),
        "length" => strings::length(input),
        "toChars" => strings::to_chars(input),
        "split" => strings::split(input, &args[0]),
        "join" => strings::join(input, args),
        "encode" => strings::encode(input, &args[0]),
        "decode" => strings::decode(input, &args[0]),

        // Math
        "abs" => math::abs(input),
        "ceiling" => math::ceiling(input),
        "floor" => math::floor(input),
        "round" => math::round(input, args),
        "truncate" => math::truncate(input),
        "sqrt" => math::sqrt(input),
        "exp" => math::exp(input),
        "ln" => math::ln(input),
        "log" => math::log(input, &args[0]),
        "power" => math::power(input, &args[0]),

        // Conversion
        "toInteger" => conversion::to_integer(input),
        "toDecimal" => conversion::to_decimal(input),
        "toString" => conversion::to_string(input),
        "toBoolean" => conversion::to_boolean(input),
        "toDate" => conversion::to_date(input),
        "toDateTime" => conversion::to_datetime(input),
        "toTime" => conversion::to_time(input),
        "toQuantity" => conversion::to_quantity(input, args),
        "convertsToInteger" => conversion::converts(input, conversion::to_integer),
        "convertsToDecimal" => conversion::converts(input, conversion::to_decimal),
        "convertsToString" => conversion::converts(input, conversion::to_string),
        "convertsToBoolean" => conversion::converts(input, conversion::to_boolean),
        "convertsToDate" => conversion::converts(input, conversion::to_date),
        "convertsToDateTime" => conversion::converts(input, conversion::to_datetime),
        "convertsToTime" => conversion::converts(input, conversion::to_time),
        "convertsToQuantity" => {
            conversion::converts(input, |c| conversion::to_quantity(c, args))
        }

        // Date/time
        "now" => Ok(datetime::now(ev)),
        "today" => Ok(datetime::today(ev)),
        "timeOfDay" => Ok(datetime::time_of_day(ev)),

        // Logic
        "not" => logic::not(input),

        // Navigation
        "children" => Ok(navigation::children(input)),
        "descendants" => navigation::descendants(ev, input),

        // FHIR-specific
        "extension" => fhir::extension(input, &args[0]),
        "hasExtension" => fhir::has_extension(input, &args[0]),
        "getValue" => Ok(fhir::get_value(input)),
        "resolve" => fhir::resolve(ev, ctx, input).await,
        "memberOf" => fhir::member_of(ev, input, &args[0]).await,
        "htmlChecks" => fhir::html_checks(input),

        _ => Err(EvaluationError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

/// A single string out of a collection: `None` for empty, error for more
/// than one item or a non-string item
pub(crate) fn singleton_string<'a>(
    collection: &'a Collection,
    function: &str,
) -> EvaluationResult<Option<&'a str>> {
    if collection.is_empty() {
        return Ok(None);
    }
    let item = crate::evaluator::operators::require_singleton(collection, function)?;
    item.as_string()
        .map(Some)
        .ok_or_else(|| EvaluationError::type_error("String", item.type_name()))
}

/// A single integer out of a collection: `None` for empty, error otherwise
pub(crate) fn singleton_integer(
    collection: &Collection,
    function: &str,
) -> EvaluationResult<Option<i64>> {
    if collection.is_empty() {
        return Ok(None);
    }
    let item = crate::evaluator::operators::require_singleton(collection, function)?;
    item.as_integer()
        .map(Some)
        .ok_or_else(|| EvaluationError::type_error("Integer", item.type_name()))
}

/// A single number out of a collection: `None` for empty, error otherwise
pub(crate) fn singleton_numeric(
    collection: &Collection,
    function: &str,
) -> EvaluationResult<Option<rust_decimal::Decimal>> {
    if collection.is_empty() {
        return Ok(None);
    }
    let item = crate::evaluator::operators::require_singleton(collection, function)?;
    item.as_numeric()
        .map(Some)
        .ok_or_else(|| EvaluationError::type_error("number", item.type_name()))
}
