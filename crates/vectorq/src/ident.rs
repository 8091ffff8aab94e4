//! Identifier screening for param and field names.
//!
//! Names end up verbatim in rendered documents (as `:name` placeholders or
//! as field keys), so anything that is not a bare token is rejected.

use once_cell::sync::Lazy;
use regex::Regex;

/// Bare identifier: ASCII letter or underscore, then letters, digits, underscores
static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Check whether `name` is an allowed bare identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENT_RE.is_match(name)
}
