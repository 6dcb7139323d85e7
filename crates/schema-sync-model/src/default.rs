//! Column default expressions and their equivalence classes.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A column default as introspected, plus its normalized equivalence class.
///
/// Equality and hashing only look at the normalized class, so
/// `'active'::character varying` and `'active'` are the same default.
#[derive(Debug, Clone)]
pub struct ColumnDefault {
    raw: String,
    normalized: String,
}

impl ColumnDefault {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self { raw, normalized }
    }

    /// The expression exactly as the snapshot reported it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The equivalence class used for comparison.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for ColumnDefault {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ColumnDefault {}

impl Hash for ColumnDefault {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Compute the equivalence class of a default expression.
pub fn normalize(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_cast(strip_outer_parens(&current)).trim().to_string();
        if next == current {
            break;
        }
        current = next;
    }

    let folded = fold_unquoted(&current);
    match folded.as_str() {
        "now()" | "current_timestamp" | "current_timestamp()" | "localtimestamp"
        | "localtimestamp()" | "transaction_timestamp()" => "current_timestamp".to_string(),
        "true" | "'t'" | "'true'" | "b'1'" => "true".to_string(),
        "false" | "'f'" | "'false'" | "b'0'" => "false".to_string(),
        _ => folded,
    }
}

/// Remove one pair of parentheses wrapping the whole expression.
fn strip_outer_parens(s: &str) -> &str {
    if !(s.starts_with('(') && s.ends_with(')')) {
        return s;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                // the opening paren closes before the end: not a wrapper
                if depth == 0 && i != s.len() - 1 {
                    return s;
                }
            }
            _ => {}
        }
    }
    &s[1..s.len() - 1]
}

/// Remove a trailing top-level `::type` cast.
fn strip_cast(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut cast_at = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth = depth.saturating_sub(1),
            b':' if !in_quote && depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                cast_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    match cast_at {
        Some(pos) if pos > 0 => &s[..pos],
        _ => s,
    }
}

/// Lowercase and collapse whitespace outside single-quoted literals.
fn fold_unquoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_quote = false;
    let mut pending_space = false;
    for c in s.chars() {
        if c == '\'' {
            in_quote = !in_quote;
        }
        if !in_quote && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        if in_quote || c == '\'' {
            out.push(c);
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}
