//! Expression Engine - `${{ expr }}` templates
//!
//! - `template`: scanning into literal/expression tokens, rendering tokens
//!   back into a single expression (`format(...)` when mixed)
//! - `substitute`: hygienic identifier renaming and whole-expression
//!   replacement across a document
//! - `json`: values containing templates as expressions or JSON templates
//!
//! Data flow:
//! ```text
//! "a-${{ x }}"  ──scan──▶  [Literal("a-"), Expression(" x "), Literal("")]
//!                                   │
//!                                 render
//!                                   ▼
//!                          format('a-{0}', x )
//! ```

mod json;
mod substitute;
mod template;

pub use json::{to_expression, to_json_template};
pub use substitute::{
    replace_identifiers_in_expression, substitute_full_expressions, substitute_identifiers,
    substitute_identifiers_in_value,
};
pub use template::{
    full_expression, quote, render, scan, template_to_expression, Token, CLOSE, OPEN,
};

/// Wrap an expression in a `${{ }}` placeholder
pub fn placeholder(expression: &str) -> String {
    format!("${{{{ {expression} }}}}")
}
