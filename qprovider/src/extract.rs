//! Extraction of `<name>value</name>` output variables from completion text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Key holding the full trimmed completion text.
pub const RESPONSE_VARIABLE: &str = "qllm_response";

static OPENING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)>").expect("opening tag pattern is valid")
});

/// Scans `text` left to right for tagged values.
///
/// Matches do not overlap: after a `<name>...</name>` pair the scan resumes behind the
/// closing tag, so tags nested inside a matched value are not reported on their own. A later
/// occurrence of the same name replaces the earlier value.
pub fn extract_output_variables(text: &str) -> BTreeMap<String, String> {
    let mut variables = BTreeMap::new();
    let mut cursor = 0;

    while let Some(captures) = OPENING_TAG.captures_at(text, cursor) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            break;
        };

        let closing = format!("</{}>", name.as_str());
        match text[whole.end()..].find(&closing) {
            Some(offset) => {
                let value = &text[whole.end()..whole.end() + offset];
                variables.insert(name.as_str().to_string(), value.trim().to_string());
                cursor = whole.end() + offset + closing.len();
            }
            None => cursor = whole.end(),
        }
    }

    variables.insert(RESPONSE_VARIABLE.to_string(), text.trim().to_string());
    variables
}
