use crate::model::variables::VariableStore;

/// Interpolate a template string by replacing `{{name}}` tokens with the
/// display value of the matching variable.
///
/// Notes:
/// - Whitespace around the token content is ignored: `{{  var  }}` == `{{var}}`.
/// - Unknown tokens are left intact to aid debugging.
/// - List variables render one item per line.
pub fn interpolate_string(template: &str, vars: &VariableStore) -> String {
    let mut out = String::with_capacity(template.len());
    let mut idx = 0;
    let bytes = template.as_bytes();

    while let Some(start) = find_subslice(bytes, b"{{", idx) {
        // Push everything up to the start of the token
        out.push_str(&template[idx..start]);

        // Find the end delimiter
        let content_start = start + 2;
        if let Some(end) = find_subslice(bytes, b"}}", content_start) {
            let raw = &template[content_start..end];
            let token = raw.trim();

            if token.is_empty() {
                // Keep empty tokens intact
                out.push_str(&template[start..end + 2]);
            } else {
                match vars.find(token) {
                    Some(value) => out.push_str(&value.display()),
                    // Unknown -> keep original token
                    None => out.push_str(&template[start..end + 2]),
                }
            }

            idx = end + 2;
        } else {
            // No matching end, push rest and stop
            out.push_str(&template[start..]);
            idx = template.len();
            break;
        }
    }

    // Push any trailing text
    if idx < template.len() {
        out.push_str(&template[idx..]);
    }

    out
}

/// Find the first occurrence of `needle` in `haystack` starting at `from`.
fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    let end = haystack.len().saturating_sub(needle.len()) + 1;
    for i in from..end {
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_basic_vars() {
        let mut vars = VariableStore::new();
        vars.set("name", "Zied", None);
        vars.set("greet", "Hello", None);

        let t = "{{greet}}, {{name}}!";
        assert_eq!(interpolate_string(t, &vars), "Hello, Zied!");
    }

    #[test]
    fn test_interpolate_typed_values() {
        let mut vars = VariableStore::new();
        vars.set("port", "8080", None);
        vars.set("flag", "true", None);

        assert_eq!(
            interpolate_string("{{flag}} on {{ port }}", &vars),
            "true on 8080"
        );
    }

    #[test]
    fn test_unknown_tokens_are_preserved() {
        let vars = VariableStore::new();
        let t = "Hello, {{name}} from {{app}}!";
        assert_eq!(
            interpolate_string(t, &vars),
            "Hello, {{name}} from {{app}}!"
        );
    }

    #[test]
    fn test_unterminated_token_passes_through() {
        let mut vars = VariableStore::new();
        vars.set("x", "1", None);
        assert_eq!(interpolate_string("a {{x", &vars), "a {{x");
    }
}
