//! FHIR-specific functions: `extension`, `hasExtension`, `getValue`,
//! `resolve`, `memberOf`, `htmlChecks`

use once_cell::sync::Lazy;
use regex::Regex;

use crate::evaluator::context::{EnvValue, EvaluationContext};
use crate::evaluator::engine::{Evaluator, boolean_collection};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue};
use crate::resolver::{reference_of, resolve_in_bundle};
use crate::terminology::Coded;

use super::singleton_string;

/// `extension(url)`: the item's `extension` entries whose `url` matches
pub fn extension(input: &Collection, url: &Collection) -> EvaluationResult<Collection> {
    let Some(url) = singleton_string(url, "extension")? else {
        return Ok(Collection::empty());
    };
    let mut out = Vec::new();
    for item in input.iter() {
        let Some(resource) = item.as_resource() else {
            continue;
        };
        let Some(extensions) = resource.property("extension").and_then(|v| v.as_array()) else {
            continue;
        };
        for ext in extensions {
            if ext.get("url").and_then(|v| v.as_str()) == Some(url) {
                Collection::splice_json(ext, &mut out);
            }
        }
    }
    Ok(Collection::from_vec(out))
}

/// `hasExtension(url)` = `extension(url).exists()`
pub fn has_extension(input: &Collection, url: &Collection) -> EvaluationResult<Collection> {
    Ok(boolean_collection(!extension(input, url)?.is_empty()))
}

/// `getValue()`: the `value` / `value[x]` of each element; primitive items
/// pass through unchanged
pub fn get_value(input: &Collection) -> Collection {
    let mut out = Vec::new();
    for item in input.iter() {
        match item {
            FhirPathValue::Resource(resource) => {
                if let Some(value) = resource.property("value") {
                    Collection::splice_json(value, &mut out);
                }
                for (_, value) in resource.polymorphic_properties("value") {
                    Collection::splice_json(value, &mut out);
                }
            }
            primitive => out.push(primitive.clone()),
        }
    }
    Collection::from_vec(out)
}

/// `resolve()`: injected resolver first, then Bundle lookup on `%resource`
pub async fn resolve(
    ev: &Evaluator,
    ctx: &EvaluationContext,
    input: &Collection,
) -> EvaluationResult<Collection> {
    let mut out = Vec::new();
    for item in input.iter() {
        let reference = match item {
            FhirPathValue::String(s) => Some(s.clone()),
            FhirPathValue::Resource(r) => {
                reference_of(r.as_json()).map(str::to_string)
            }
            _ => None,
        };
        let Some(reference) = reference else {
            continue;
        };

        if let Some(resolver) = &ev.options().resolver {
            ev.options().require_async("resolve")?;
            if let Some(resource) = resolver.resolve(&reference).await? {
                Collection::splice_json(&resource, &mut out);
            }
            continue;
        }

        if let Some(EnvValue::Value(resource_env)) = ctx.env_value("resource") {
            if let Some(root) = resource_env.singleton().and_then(|v| v.as_resource()) {
                if let Some(found) = resolve_in_bundle(root.as_json(), &reference) {
                    Collection::splice_json(&found, &mut out);
                }
            }
        }
    }
    Ok(Collection::from_vec(out))
}

/// `memberOf(valueSetUrl)`: all items are members of the value set.
/// Without a configured service the result is empty; the operation is
/// inherently async and requires async mode.
pub async fn member_of(
    ev: &Evaluator,
    input: &Collection,
    url: &Collection,
) -> EvaluationResult<Collection> {
    let Some(service) = ev.options().terminology.clone() else {
        return Ok(Collection::empty());
    };
    if input.is_empty() {
        return Ok(Collection::empty());
    }
    ev.options().require_async("memberOf")?;
    let Some(url) = singleton_string(url, "memberOf")? else {
        return Ok(Collection::empty());
    };

    let mut all = true;
    for item in input.iter() {
        ev.options().check_abort()?;
        let member = match Coded::from_value(item) {
            Some(coded) => service.member_of(&coded, url).await?,
            None => false,
        };
        if !member {
            all = false;
        }
    }
    Ok(boolean_collection(all))
}

/// Elements with no closing-tag requirement
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:[^>'"]|'[^']*'|"[^"]*")*?)(/?)>"#)
        .expect("static pattern compiles")
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|<!\w[^>]*>").expect("static pattern compiles"));

static EVENT_HANDLER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*\bon[a-z]+\s*=").expect("static pattern compiles"));

static LINK_STYLESHEET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<link[^>]*rel\s*=\s*['"]?stylesheet"#).expect("static pattern compiles")
});

/// `htmlChecks()`: narrative safety checks. Scripts, styles, event
/// handlers, dangerous URLs and embedding elements are rejected, and the
/// tag stack must balance (void and self-closing elements excepted)
pub fn html_checks(input: &Collection) -> EvaluationResult<Collection> {
    let Some(html) = singleton_string(input, "htmlChecks")? else {
        return Ok(Collection::empty());
    };
    Ok(boolean_collection(html_is_safe(html)))
}

fn html_is_safe(html: &str) -> bool {
    let lowered = html.to_lowercase();
    let stripped = COMMENT_RE.replace_all(&lowered, "");

    const FORBIDDEN: &[&str] = &[
        "<script",
        "<style",
        "<base",
        "<form",
        "<input",
        "<iframe",
        "<frame",
        "<object",
        "<embed",
        "<applet",
        "javascript:",
        "data:",
    ];
    if FORBIDDEN.iter().any(|marker| stripped.contains(marker)) {
        return false;
    }
    if EVENT_HANDLER_RE.is_match(&stripped) || LINK_STYLESHEET_RE.is_match(&stripped) {
        return false;
    }

    tags_balanced(&stripped)
}

fn tags_balanced(html: &str) -> bool {
    let mut stack: Vec<String> = Vec::new();
    for captures in TAG_RE.captures_iter(html) {
        let closing = &captures[1] == "/";
        let name = captures[2].to_string();
        let self_closing = &captures[4] == "/";
        if VOID_ELEMENTS.contains(&name.as_str()) || (self_closing && !closing) {
            continue;
        }
        if closing {
            match stack.pop() {
                Some(open) if open == name => {}
                _ => return false,
            }
        } else {
            stack.push(name);
        }
    }
    stack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_safety() {
        assert!(html_is_safe("<div>ok</div>"));
        assert!(html_is_safe("plain text, no tags"));
        assert!(html_is_safe("<div><p>nested</p><br/></div>"));
        assert!(!html_is_safe("<div onclick=\"x\">ok</div>"));
        assert!(!html_is_safe("<script>alert(1)</script>"));
        assert!(!html_is_safe("<a href=\"javascript:void(0)\">x</a>"));
        assert!(!html_is_safe("<div>unclosed"));
        assert!(!html_is_safe("<div></span>"));
        assert!(!html_is_safe("<style>p{}</style>"));
        assert!(!html_is_safe("<link rel=\"stylesheet\" href=\"x.css\">"));
        assert!(!html_is_safe("<iframe src=\"x\"></iframe>"));
        assert!(!html_is_safe("<img src=\"data:image/png;base64,x\">"));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert!(html_is_safe("<div><!-- <unclosed --></div>"));
    }
}
