//! Expression-scoped substitution
//!
//! - Identifier substitution: rewrites qualified identifiers such as
//!   `needs.build.outputs` inside `${{ }}` placeholders only, never inside
//!   quoted string literals and never as part of a longer identifier.
//! - Whole-expression substitution: replaces a string leaf that is exactly
//!   one placeholder with an arbitrary value.
//!
//! Both return `Cow::Borrowed` when nothing was replaced.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::Result;
use crate::value::map_strings;

use super::template::{full_expression, scan, Token, CLOSE, OPEN};

/// Characters that continue an identifier on either side
fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Length in bytes of the quoted literal at the start of `s` (which starts
/// with `'`), or the rest of `s` when the literal is unterminated
fn quoted_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut j = 1;
    while j < bytes.len() {
        if bytes[j..].starts_with(b"''") {
            j += 2;
        } else if bytes[j] == b'\'' {
            return j + 1;
        } else {
            j += 1;
        }
    }
    bytes.len()
}

/// Longest `old` matching at the start of `rest` with an identifier boundary after it
fn longest_match<'r>(rest: &str, replacements: &'r [(String, String)]) -> Option<&'r (String, String)> {
    replacements
        .iter()
        .filter(|(old, _)| {
            !old.is_empty()
                && rest.starts_with(old.as_str())
                && !rest[old.len()..].starts_with(is_identifier_char)
        })
        .max_by_key(|(old, _)| old.len())
}

/// Replace identifiers inside one expression body (the text between `${{` and `}}`).
///
/// All replacements are applied in a single left-to-right pass, so the text
/// substituted in is never itself rewritten again.
pub fn replace_identifiers_in_expression<'a>(
    expression: &'a str,
    replacements: &[(String, String)],
) -> Cow<'a, str> {
    let mut result = String::new();
    let mut replaced = false;
    let mut last_end = 0;
    let mut i = 0;

    while let Some(c) = expression[i..].chars().next() {
        if c == '\'' {
            i += quoted_len(&expression[i..]);
            continue;
        }

        let at_boundary = !expression[..i]
            .chars()
            .next_back()
            .is_some_and(|prev| is_identifier_char(prev) || prev == '.');

        if at_boundary {
            if let Some((old, new)) = longest_match(&expression[i..], replacements) {
                result.push_str(&expression[last_end..i]);
                result.push_str(new);
                i += old.len();
                last_end = i;
                replaced = true;
                continue;
            }
        }

        i += c.len_utf8();
    }

    if !replaced {
        return Cow::Borrowed(expression);
    }
    result.push_str(&expression[last_end..]);
    Cow::Owned(result)
}

/// Replace identifiers in every placeholder of a template string
pub fn substitute_identifiers<'a>(
    template: &'a str,
    replacements: &[(String, String)],
) -> Result<Cow<'a, str>> {
    if replacements.is_empty() || !template.contains(OPEN) {
        return Ok(Cow::Borrowed(template));
    }

    let mut replaced = false;
    let mut result = String::with_capacity(template.len() + 32);
    for token in scan(template)? {
        match token {
            Token::Literal(text) => result.push_str(text),
            Token::Expression(expression) => {
                let new = replace_identifiers_in_expression(expression, replacements);
                replaced |= matches!(new, Cow::Owned(_));
                result.push_str(OPEN);
                result.push_str(&new);
                result.push_str(CLOSE);
            }
        }
    }

    if replaced {
        Ok(Cow::Owned(result))
    } else {
        Ok(Cow::Borrowed(template))
    }
}

/// Replace identifiers in every string leaf of a document value
pub fn substitute_identifiers_in_value<'a>(
    value: &'a Value,
    replacements: &[(String, String)],
) -> Result<Cow<'a, Value>> {
    if replacements.is_empty() {
        return Ok(Cow::Borrowed(value));
    }
    map_strings(value, &mut |s| {
        Ok(match substitute_identifiers(s, replacements)? {
            Cow::Owned(new) => Some(Value::String(new)),
            Cow::Borrowed(_) => None,
        })
    })
}

/// Replace every string leaf that is exactly `${{ <expression> }}` with the
/// value paired with that expression text.
pub fn substitute_full_expressions<'a>(
    value: &'a Value,
    replacements: &[(String, Value)],
) -> Result<Cow<'a, Value>> {
    if replacements.is_empty() {
        return Ok(Cow::Borrowed(value));
    }
    map_strings(value, &mut |s| {
        let Some(expression) = full_expression(s)? else {
            return Ok(None);
        };
        Ok(replacements
            .iter()
            .find(|(old, _)| old == expression)
            .map(|(_, new)| new.clone()))
    })
}
