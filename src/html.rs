//! Template minification.

use std::sync::LazyLock;

use regex::Regex;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static PRESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>").expect("valid regex")
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static AROUND_BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\s*(</?(?:{})\b[^>]*>)\s*", BLOCK_TAGS.join("|"))).expect("valid regex")
});

/// Elements whose surrounding whitespace never renders.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "section", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

/// Strip comments and collapse whitespace runs to one space, leaving `<pre>`
/// and `<textarea>` contents and attribute quoting untouched. Whitespace is
/// only dropped entirely next to block-level tags.
pub fn minify_html(input: &str) -> String {
    let without_comments = COMMENT.replace_all(input, "");

    let mut out = String::with_capacity(without_comments.len());
    let mut last = 0;
    for preserved in PRESERVED.find_iter(&without_comments) {
        out.push_str(&collapse(&without_comments[last..preserved.start()]));
        out.push_str(preserved.as_str());
        last = preserved.end();
    }
    out.push_str(&collapse(&without_comments[last..]));
    out.trim().to_string()
}

fn collapse(segment: &str) -> String {
    let collapsed = WHITESPACE.replace_all(segment, " ");
    AROUND_BLOCK_TAG.replace_all(&collapsed, "$1").into_owned()
}
