//! Template scanning and rendering
//!
//! A template is literal text interleaved with `${{ expr }}` placeholders.
//! Inside a placeholder, `'...'` is a string literal (`''` escapes a quote)
//! and a `}}` inside it does not close the placeholder. This is the quoting
//! rule of the GitHub Actions expression language and must match it exactly,
//! because templates are re-embedded into the compiled workflow.

use crate::error::{CixxError, Result};

pub const OPEN: &str = "${{";
pub const CLOSE: &str = "}}";

/// Token representing a scanned template fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal text outside any placeholder
    Literal(&'a str),
    /// Raw expression source between `${{` and `}}`
    Expression(&'a str),
}

/// Split a template into literal and expression tokens.
///
/// A literal token is emitted before every expression and at the end, even
/// when empty, so `"${{ a }}"` scans to `[Literal(""), Expression(" a "), Literal("")]`.
pub fn scan(template: &str) -> Result<Vec<Token<'_>>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut in_expression = false;
    let mut in_string = false;

    while i < bytes.len() {
        if in_expression {
            if in_string {
                if bytes[i..].starts_with(b"''") {
                    i += 2;
                } else {
                    if bytes[i] == b'\'' {
                        in_string = false;
                    }
                    i += 1;
                }
            } else if bytes[i..].starts_with(CLOSE.as_bytes()) {
                tokens.push(Token::Expression(&template[start..i]));
                start = i + CLOSE.len();
                i = start;
                in_expression = false;
            } else {
                if bytes[i] == b'\'' {
                    in_string = true;
                }
                i += 1;
            }
        } else if bytes[i..].starts_with(OPEN.as_bytes()) {
            tokens.push(Token::Literal(&template[start..i]));
            start = i + OPEN.len();
            i = start;
            in_expression = true;
            in_string = false;
        } else {
            i += 1;
        }
    }

    if in_expression {
        return Err(CixxError::MalformedTemplate {
            template: template.to_string(),
        });
    }

    tokens.push(Token::Literal(&template[start..]));
    Ok(tokens)
}

/// Quote text as an expression string literal
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render scanned tokens back into a single expression.
///
/// A lone literal becomes a quoted string; anything else becomes a
/// `format('...{0}...', arg0, ...)` call whose placeholders follow the
/// expressions left to right.
pub fn render(tokens: &[Token<'_>]) -> String {
    match tokens {
        [] => quote(""),
        [Token::Literal(text)] => quote(text),
        _ => {
            let mut format_str = String::new();
            let mut args: Vec<&str> = Vec::new();
            for token in tokens {
                match token {
                    Token::Expression(expression) => {
                        format_str.push_str(&format!("{{{}}}", args.len()));
                        args.push(expression);
                    }
                    Token::Literal(text) => format_str.push_str(
                        &text
                            .replace('\'', "''")
                            .replace('{', "{{")
                            .replace('}', "}}"),
                    ),
                }
            }
            format!("format('{}',{})", format_str, args.join(","))
        }
    }
}

/// Return the trimmed inner expression when the whole string is exactly one
/// `${{ ... }}` placeholder.
pub fn full_expression(template: &str) -> Result<Option<&str>> {
    if !template.starts_with(OPEN) {
        return Ok(None);
    }
    Ok(match scan(template)?.as_slice() {
        [Token::Literal(""), Token::Expression(expression), Token::Literal("")] => {
            Some(expression.trim())
        }
        _ => None,
    })
}

/// Convert a template string into an equivalent expression
pub fn template_to_expression(template: &str) -> Result<String> {
    if let Some(expression) = full_expression(template)? {
        return Ok(expression.to_string());
    }
    Ok(render(&scan(template)?))
}
