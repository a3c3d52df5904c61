//! Markup stripping for free-form code snippets.

use std::collections::HashSet;

/// Strip every tag from a code snippet, keeping only its text.
///
/// `<script>` and `<style>` elements are dropped together with their
/// contents. The result is serialized HTML text, so literal `<`, `>` and `&`
/// in the snippet come back entity-escaped.
pub fn sanitize_code_snippet(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }

    let mut builder = ammonia::Builder::empty();
    builder.clean_content_tags(HashSet::from(["script", "style"]));
    builder.clean(code).to_string()
}
