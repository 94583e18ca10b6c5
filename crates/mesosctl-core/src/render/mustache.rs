//! Mustache tag translation.
//!
//! Package templates are written with mustache tags. They are rewritten into
//! minijinja syntax before rendering, against a context whose only root is
//! `view`:
//!
//! - `{{name}}`, `{{{name}}}`, `{{&name}}` become `{{ view.name }}`
//! - `{{#name}}` becomes a `{% for %}` over `name|section`: list items, the
//!   value itself when truthy, or nothing
//! - `{{^name}}` becomes `{% if not (name|section) %}`
//! - `{{.}}` is the current section item
//! - `{{! comment }}` is dropped
//!
//! Inside a section, names are looked up in the section items from the
//! innermost outwards and then in `view`, through the `resolve` function.
//! Partials and delimiter changes are rejected.

use std::fmt;

/// Name of the template context root
pub const ROOT: &str = "view";
/// Filter turning a section value into the items to repeat over
pub const SECTION_FILTER: &str = "section";
/// Function looking a name up through the open section scopes
pub const RESOLVE_FUNCTION: &str = "resolve";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateError(pub String);

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TranslateError {}

const KEYWORDS: &[&str] = &[
    "true", "false", "none", "True", "False", "None", "and", "or", "not", "in", "is", "if",
    "else", "loop",
];

struct Section {
    name: String,
    inverted: bool,
}

/// Open sections; only non-inverted ones push a lookup scope.
#[derive(Default)]
struct Scopes {
    open: Vec<Section>,
}

impl Scopes {
    fn depth(&self) -> usize {
        self.open.iter().filter(|s| !s.inverted).count()
    }
}

/// Rewrite a mustache template into minijinja source.
pub fn translate(template: &str) -> Result<String, TranslateError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut scopes = Scopes::default();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        push_literal(&mut out, &rest[..open]);
        let after_open = &rest[open + 2..];

        let (tag, consumed) = if let Some(body) = after_open.strip_prefix('{') {
            let close = body
                .find("}}}")
                .ok_or_else(|| TranslateError(format!("unclosed tag near '{{{{{{{}'", excerpt(body))))?;
            (format!("&{}", &body[..close]), close + 4)
        } else {
            let close = after_open
                .find("}}")
                .ok_or_else(|| TranslateError(format!("unclosed tag near '{{{{{}'", excerpt(after_open))))?;
            (after_open[..close].to_string(), close + 2)
        };

        emit_tag(&mut out, tag.trim(), &mut scopes)?;
        rest = &after_open[consumed..];
    }
    push_literal(&mut out, rest);

    if let Some(open) = scopes.open.pop() {
        return Err(TranslateError(format!("unclosed section '{}'", open.name)));
    }
    Ok(out)
}

fn excerpt(s: &str) -> &str {
    let end = s.char_indices().nth(24).map(|(i, _)| i).unwrap_or(s.len());
    &s[..end]
}

/// Literal text is passed through a raw block when it could be read as template syntax.
fn push_literal(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    let needs_raw = text.contains('{') || text.contains('}') || text.contains('#');
    if needs_raw {
        out.push_str("{% raw %}");
        out.push_str(text);
        out.push_str("{% endraw %}");
    } else {
        out.push_str(text);
    }
}

fn emit_tag(out: &mut String, tag: &str, scopes: &mut Scopes) -> Result<(), TranslateError> {
    let mut chars = tag.chars();
    match chars.next() {
        Some('!') => Ok(()),
        Some('#') => {
            let name = chars.as_str().trim();
            let value = expression(name, scopes.depth())?;
            out.push_str(&format!(
                "{{% for {} in {}|{} %}}",
                item_name(scopes.depth() + 1),
                value,
                SECTION_FILTER
            ));
            scopes.open.push(Section {
                name: name.to_string(),
                inverted: false,
            });
            Ok(())
        }
        Some('^') => {
            let name = chars.as_str().trim();
            let value = expression(name, scopes.depth())?;
            out.push_str(&format!("{{% if not ({}|{}) %}}", value, SECTION_FILTER));
            scopes.open.push(Section {
                name: name.to_string(),
                inverted: true,
            });
            Ok(())
        }
        Some('/') => {
            let name = chars.as_str().trim();
            match scopes.open.pop() {
                Some(open) if open.name == name => {
                    out.push_str(if open.inverted { "{% endif %}" } else { "{% endfor %}" });
                    Ok(())
                }
                Some(open) => Err(TranslateError(format!(
                    "section '{}' closed by '{}'",
                    open.name, name
                ))),
                None => Err(TranslateError(format!(
                    "closing tag '{}' without open section",
                    name
                ))),
            }
        }
        Some('&') => {
            let value = expression(chars.as_str().trim(), scopes.depth())?;
            out.push_str(&format!("{{{{ {} }}}}", value));
            Ok(())
        }
        Some('>') => Err(TranslateError(format!("partials are not supported: {}", tag))),
        Some('=') => Err(TranslateError(format!(
            "delimiter changes are not supported: {}",
            tag
        ))),
        Some(_) => {
            out.push_str(&format!("{{{{ {} }}}}", expression(tag, scopes.depth())?));
            Ok(())
        }
        None => Err(TranslateError("empty tag".to_string())),
    }
}

fn item_name(depth: usize) -> String {
    format!("section_{}", depth)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quoted(segment: &str) -> String {
    format!("\"{}\"", segment.replace('\\', "\\\\").replace('"', "\\\""))
}

fn push_segment(expr: &mut String, segment: &str) {
    if is_identifier(segment) && !KEYWORDS.contains(&segment) {
        expr.push('.');
        expr.push_str(segment);
    } else if segment.chars().all(|c| c.is_ascii_digit()) {
        expr.push_str(&format!("[{}]", segment));
    } else {
        expr.push_str(&format!("[{}]", quoted(segment)));
    }
}

/// Dotted mustache name to a minijinja lookup expression, `depth` sections deep.
fn expression(name: &str, depth: usize) -> Result<String, TranslateError> {
    if name == "." {
        return Ok(if depth == 0 {
            ROOT.to_string()
        } else {
            item_name(depth)
        });
    }

    let mut segments = name.split('.');
    let head = segments.next().unwrap_or_default();
    if head.is_empty() {
        return Err(TranslateError(format!("unsupported variable name '{}'", name)));
    }

    let mut expr = if depth == 0 {
        let mut root = ROOT.to_string();
        push_segment(&mut root, head);
        root
    } else {
        let scopes: Vec<String> = (1..=depth).rev().map(item_name).collect();
        format!(
            "{}({}, {}, {})",
            RESOLVE_FUNCTION,
            quoted(head),
            scopes.join(", "),
            ROOT
        )
    };

    for segment in segments {
        if segment.is_empty() {
            return Err(TranslateError(format!("empty segment in '{}'", name)));
        }
        push_segment(&mut expr, segment);
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_become_expressions() {
        assert_eq!(
            translate("id={{service.name}}").unwrap(),
            "id={{ view.service.name }}"
        );
        assert_eq!(translate("{{{a.b}}}").unwrap(), "{{ view.a.b }}");
        assert_eq!(translate("{{& a }}").unwrap(), "{{ view.a }}");
    }

    #[test]
    fn json_punctuation_is_kept_raw() {
        assert_eq!(
            translate(r#"{"id":"{{x}}"}"#).unwrap(),
            r#"{% raw %}{"id":"{% endraw %}{{ view.x }}{% raw %}"}{% endraw %}"#
        );
    }

    #[test]
    fn sections_become_loops_and_inverted_sections_conditionals() {
        assert_eq!(
            translate("{{#a.on}}x{{/a.on}}{{^a.on}}y{{/a.on}}").unwrap(),
            "{% for section_1 in view.a.on|section %}x{% endfor %}\
             {% if not (view.a.on|section) %}y{% endif %}"
        );
    }

    #[test]
    fn names_inside_sections_resolve_through_scopes() {
        assert_eq!(
            translate("{{#a}}{{#b}}{{c.d}}{{.}}{{/b}}{{/a}}").unwrap(),
            "{% for section_1 in view.a|section %}\
             {% for section_2 in resolve(\"b\", section_1, view)|section %}\
             {{ resolve(\"c\", section_2, section_1, view).d }}{{ section_2 }}\
             {% endfor %}{% endfor %}"
        );
        // inverted sections open no scope
        assert_eq!(
            translate("{{^a}}{{b}}{{/a}}").unwrap(),
            "{% if not (view.a|section) %}{{ view.b }}{% endif %}"
        );
    }

    #[test]
    fn awkward_names_use_subscripts() {
        assert_eq!(
            translate("{{hdfs.name-node.port}}").unwrap(),
            "{{ view.hdfs[\"name-node\"].port }}"
        );
        assert_eq!(
            translate("{{marathon-lb.name}}").unwrap(),
            "{{ view[\"marathon-lb\"].name }}"
        );
        assert_eq!(translate("{{list.0}}").unwrap(), "{{ view.list[0] }}");
        assert_eq!(translate("{{none}}").unwrap(), "{{ view[\"none\"] }}");
    }

    #[test]
    fn comments_are_dropped() {
        assert_eq!(translate("a{{! note }}b").unwrap(), "ab");
    }

    #[test]
    fn mismatched_sections_fail() {
        assert!(translate("{{#a}}x{{/b}}").is_err());
        assert!(translate("{{#a}}x").is_err());
        assert!(translate("x{{/a}}").is_err());
    }

    #[test]
    fn unsupported_tags_fail() {
        assert!(translate("{{> partial}}").is_err());
        assert!(translate("{{=<% %>=}}").is_err());
        assert!(translate("{{a..b}}").is_err());
        assert!(translate("{{unclosed").is_err());
    }
}
