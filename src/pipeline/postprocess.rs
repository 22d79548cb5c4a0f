//! Post-processing: deterministic cleanup of VLM-generated HTML.
//!
//! The prompt tells the model not to wrap its answer in a code fence, and
//! models still do it now and then. [`strip_code_fences`] removes a leading
//! ` ```html ` (or bare ` ``` `) marker and a trailing ` ``` ` marker; the text
//! between them is returned untouched.
//!
//! Everything else about the model's HTML is kept verbatim unless the caller
//! opted into [`HtmlPolicy::StripActive`], which removes active content
//! (scripts, embedded objects, inline event handlers, `javascript:` URLs).
//! MathML and structural markup are never rewritten.

use crate::config::HtmlPolicy;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply the configured cleanup to raw model output.
pub fn clean_html(raw: &str, policy: HtmlPolicy) -> String {
    let s = strip_code_fences(raw);
    match policy {
        HtmlPolicy::Trusted => s,
        HtmlPolicy::StripActive => strip_active_content(&s),
    }
}

/// True when the text carries no visible characters.
pub fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

// ── Fences ───────────────────────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```\s*$").unwrap());

/// Remove a leading and a trailing fenced-block marker, if present.
pub fn strip_code_fences(input: &str) -> String {
    let s = RE_LEADING_FENCE.replace(input, "");
    RE_TRAILING_FENCE.replace(&s, "").into_owned()
}

// ── Active content ───────────────────────────────────────────────────────────

static RE_ACTIVE_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|iframe|object)\b[^>]*>.*?</(?:script|iframe|object)\s*>").unwrap()
});

static RE_ACTIVE_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)</?(?:script|iframe|object|embed)\b[^>]*>").unwrap());

static RE_EVENT_HANDLERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static RE_JS_URLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src|xlink:href)\s*=\s*(?:"\s*javascript:[^"]*"|'\s*javascript:[^']*')"#)
        .unwrap()
});

/// Remove scripts, embedded objects, event handlers and `javascript:` URLs.
pub fn strip_active_content(input: &str) -> String {
    let s = RE_ACTIVE_BLOCKS.replace_all(input, "");
    let s = RE_ACTIVE_TAGS.replace_all(&s, "");
    let s = RE_EVENT_HANDLERS.replace_all(&s, "");
    RE_JS_URLS.replace_all(&s, "${1}=\"#\"").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_fence_is_stripped() {
        assert_eq!(strip_code_fences("```html\n<p>x</p>\n```"), "<p>x</p>");
    }

    #[test]
    fn fence_tag_is_case_insensitive() {
        assert_eq!(strip_code_fences("```HTML\n<p>x</p>\n```\n"), "<p>x</p>");
    }

    #[test]
    fn bare_fence_is_stripped() {
        assert_eq!(strip_code_fences("```\n<h1>T</h1>\n```"), "<h1>T</h1>");
    }

    #[test]
    fn unfenced_text_is_verbatim() {
        let html = "<p>Hello</p>\n<math><mi>x</mi></math>";
        assert_eq!(strip_code_fences(html), html);
        assert_eq!(clean_html(html, HtmlPolicy::Trusted), html);
    }

    #[test]
    fn only_leading_fence_present() {
        assert_eq!(strip_code_fences("```html\n<p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn fence_only_output_is_blank() {
        assert!(is_blank(&strip_code_fences("```html\n```")));
    }

    #[test]
    fn trusted_policy_keeps_scripts() {
        let html = "<p>a</p><script>alert(1)</script>";
        assert_eq!(clean_html(html, HtmlPolicy::Trusted), html);
    }

    #[test]
    fn strip_active_removes_scripts_and_handlers() {
        let html = r#"<p onclick="steal()">a</p><script type="text/javascript">alert(1)</script><a href="javascript:evil()">x</a><iframe src="x"></iframe><embed src="y">"#;
        let cleaned = clean_html(html, HtmlPolicy::StripActive);
        assert_eq!(cleaned, r##"<p>a</p><a href="#">x</a>"##);
    }

    #[test]
    fn strip_active_keeps_mathml() {
        let html = "<p>Area <math><mi>A</mi><mo>=</mo><msup><mi>r</mi><mn>2</mn></msup></math></p>";
        assert_eq!(strip_active_content(html), html);
    }
}
