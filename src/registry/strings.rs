//! String functions
//!
//! All operate on a single string input: an empty input collection yields
//! empty, more than one item is an error. Index arithmetic is in
//! characters, not bytes. `matches` / `replaceMatches` use the host regex
//! engine; compile failures are evaluation errors.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use regex::Regex;

use crate::evaluator::engine::boolean_collection;
use crate::evaluator::{EvaluationError, EvaluationResult};
use crate::model::{Collection, FhirPathValue};

use super::singleton_string;

fn string_result(s: String) -> Collection {
    Collection::singleton_of(FhirPathValue::String(s))
}

fn compile_regex(pattern: &str) -> EvaluationResult<Regex> {
    Regex::new(pattern).map_err(|e| EvaluationError::InvalidRegex {
        message: e.to_string(),
    })
}

/// `indexOf(substring)`: 0-based character index, -1 when absent
pub fn index_of(input: &Collection, substring: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(needle)) = (
        singleton_string(input, "indexOf")?,
        singleton_string(substring, "indexOf")?,
    ) else {
        return Ok(Collection::empty());
    };
    let index = match s.find(needle) {
        Some(byte_index) => s[..byte_index].chars().count() as i64,
        None => -1,
    };
    Ok(Collection::singleton_of(FhirPathValue::Integer(index)))
}

/// `substring(start [, length])`: character-based; out-of-range start is empty
pub fn substring(input: &Collection, args: &[Collection]) -> EvaluationResult<Collection> {
    let Some(s) = singleton_string(input, "substring")? else {
        return Ok(Collection::empty());
    };
    let Some(start) = super::singleton_integer(&args[0], "substring")? else {
        return Ok(Collection::empty());
    };
    let total = s.chars().count() as i64;
    if start < 0 || start >= total {
        return Ok(Collection::empty());
    }

    let length = match args.get(1) {
        Some(arg) => match super::singleton_integer(arg, "substring")? {
            Some(l) if l < 0 => return Ok(Collection::empty()),
            Some(l) => l as usize,
            None => return Ok(Collection::empty()),
        },
        None => usize::MAX,
    };

    let result: String = s.chars().skip(start as usize).take(length).collect();
    Ok(string_result(result))
}

/// `startsWith(prefix)`
pub fn starts_with(input: &Collection, prefix: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(p)) = (
        singleton_string(input, "startsWith")?,
        singleton_string(prefix, "startsWith")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(boolean_collection(s.starts_with(p)))
}

/// `endsWith(suffix)`
pub fn ends_with(input: &Collection, suffix: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(p)) = (
        singleton_string(input, "endsWith")?,
        singleton_string(suffix, "endsWith")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(boolean_collection(s.ends_with(p)))
}

/// `contains(substring)`: the method form
pub fn contains(input: &Collection, substring: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(p)) = (
        singleton_string(input, "contains")?,
        singleton_string(substring, "contains")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(boolean_collection(s.contains(p)))
}

/// `upper()`
pub fn upper(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_string(input, "upper")? {
        Some(s) => string_result(s.to_uppercase()),
        None => Collection::empty(),
    })
}

/// `lower()`
pub fn lower(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_string(input, "lower")? {
        Some(s) => string_result(s.to_lowercase()),
        None => Collection::empty(),
    })
}

/// `trim()`
pub fn trim(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_string(input, "trim")? {
        Some(s) => string_result(s.trim().to_string()),
        None => Collection::empty(),
    })
}

/// `replace(pattern, substitution)`: literal, all occurrences
pub fn replace(
    input: &Collection,
    pattern: &Collection,
    substitution: &Collection,
) -> EvaluationResult<Collection> {
    let (Some(s), Some(p), Some(r)) = (
        singleton_string(input, "replace")?,
        singleton_string(pattern, "replace")?,
        singleton_string(substitution, "replace")?,
    ) else {
        return Ok(Collection::empty());
    };
    if p.is_empty() {
        // An empty pattern surrounds every character with the substitution
        let mut out = String::with_capacity(s.len() + r.len() * (s.chars().count() + 1));
        out.push_str(r);
        for ch in s.chars() {
            out.push(ch);
            out.push_str(r);
        }
        return Ok(string_result(out));
    }
    Ok(string_result(s.replace(p, r)))
}

/// `matches(regex)`: true when the pattern matches anywhere in the string
pub fn matches(input: &Collection, pattern: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(p)) = (
        singleton_string(input, "matches")?,
        singleton_string(pattern, "matches")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(boolean_collection(compile_regex(p)?.is_match(s)))
}

/// `replaceMatches(regex, substitution)`: regex replacement of all matches,
/// `$1`-style group references honored
pub fn replace_matches(
    input: &Collection,
    pattern: &Collection,
    substitution: &Collection,
) -> EvaluationResult<Collection> {
    let (Some(s), Some(p), Some(r)) = (
        singleton_string(input, "replaceMatches")?,
        singleton_string(pattern, "replaceMatches")?,
        singleton_string(substitution, "replaceMatches")?,
    ) else {
        return Ok(Collection::empty());
    };
    Ok(string_result(
        compile_regex(p)?.replace_all(s, r).into_owned(),
    ))
}

/// `length()` in characters
pub fn length(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_string(input, "length")? {
        Some(s) => Collection::singleton_of(FhirPathValue::Integer(s.chars().count() as i64)),
        None => Collection::empty(),
    })
}

/// `toChars()`: one single-character string per character
pub fn to_chars(input: &Collection) -> EvaluationResult<Collection> {
    Ok(match singleton_string(input, "toChars")? {
        Some(s) => Collection::from_vec(
            s.chars()
                .map(|c| FhirPathValue::String(c.to_string()))
                .collect(),
        ),
        None => Collection::empty(),
    })
}

/// `split(separator)`
pub fn split(input: &Collection, separator: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(sep)) = (
        singleton_string(input, "split")?,
        singleton_string(separator, "split")?,
    ) else {
        return Ok(Collection::empty());
    };
    if sep.is_empty() {
        return to_chars(input);
    }
    Ok(Collection::from_vec(
        s.split(sep)
            .map(|part| FhirPathValue::String(part.to_string()))
            .collect(),
    ))
}

/// `join([separator])`: separator defaults to the empty string
pub fn join(input: &Collection, args: &[Collection]) -> EvaluationResult<Collection> {
    let separator = match args.first() {
        Some(arg) => singleton_string(arg, "join")?.unwrap_or("").to_string(),
        None => String::new(),
    };
    let mut parts = Vec::with_capacity(input.len());
    for item in input.iter() {
        let Some(s) = item.to_string_value() else {
            return Err(EvaluationError::type_error("String", item.type_name()));
        };
        parts.push(s);
    }
    Ok(string_result(parts.join(&separator)))
}

/// `encode(kind)`: kind is `base64`, `urlbase64` or `hex`
pub fn encode(input: &Collection, kind: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(kind)) = (
        singleton_string(input, "encode")?,
        singleton_string(kind, "encode")?,
    ) else {
        return Ok(Collection::empty());
    };
    let encoded = match kind {
        "base64" => STANDARD.encode(s.as_bytes()),
        "urlbase64" => URL_SAFE.encode(s.as_bytes()),
        "hex" => hex::encode(s.as_bytes()),
        other => {
            return Err(EvaluationError::InvalidArgument {
                function: "encode".to_string(),
                message: format!("unknown encoding: {other}"),
            });
        }
    };
    Ok(string_result(encoded))
}

/// `decode(kind)`: inverse of `encode`; undecodable input yields empty
pub fn decode(input: &Collection, kind: &Collection) -> EvaluationResult<Collection> {
    let (Some(s), Some(kind)) = (
        singleton_string(input, "decode")?,
        singleton_string(kind, "decode")?,
    ) else {
        return Ok(Collection::empty());
    };
    let bytes = match kind {
        "base64" => STANDARD.decode(s.as_bytes()).ok(),
        "urlbase64" => URL_SAFE.decode(s.as_bytes()).ok(),
        "hex" => hex::decode(s.as_bytes()).ok(),
        other => {
            return Err(EvaluationError::InvalidArgument {
                function: "decode".to_string(),
                message: format!("unknown encoding: {other}"),
            });
        }
    };
    Ok(match bytes.and_then(|b| String::from_utf8(b).ok()) {
        Some(decoded) => string_result(decoded),
        None => Collection::empty(),
    })
}
