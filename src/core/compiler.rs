//! Placeholder compiler
//!
//! Rewrites named (`:name`) and positional (`?`) placeholders into the native
//! driver's single `?` marker, skipping anything inside single- or
//! double-quoted literals, and records the placeholders in the order they
//! appear.

/// Native placeholder marker
pub const NATIVE_PLACEHOLDER: char = '?';

/// Marker that introduces a named placeholder
pub const NAME_MARKER: char = ':';

/// One placeholder as it appeared in the source query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    token: String,
    index: usize,
}

impl Placeholder {
    /// Source token: `?` or `:name`
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 0-based position among all placeholders of the query
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_positional(&self) -> bool {
        self.token.len() == 1 && self.token.starts_with(NATIVE_PLACEHOLDER)
    }

    /// Name without its marker, for named placeholders
    pub fn name(&self) -> Option<&str> {
        self.token.strip_prefix(NAME_MARKER)
    }
}

/// A query rewritten for the native driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    source: String,
    native: String,
    placeholders: Vec<Placeholder>,
}

impl CompiledQuery {
    /// Query text as written by the caller
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Query text with every placeholder replaced by the native marker
    pub fn native(&self) -> &str {
        &self.native
    }

    /// Placeholders in left-to-right order
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Slot indices of every occurrence of a named token (marker included)
    pub fn slots_of<'a>(&'a self, token: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.placeholders
            .iter()
            .filter(move |p| p.token == token)
            .map(Placeholder::index)
    }

    /// Whether the slot at `index` holds a positional placeholder
    pub fn is_positional_slot(&self, index: usize) -> bool {
        self.placeholders
            .get(index)
            .is_some_and(Placeholder::is_positional)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Compile a query. Total: a query without placeholders comes back unchanged.
pub fn compile(sql: &str) -> CompiledQuery {
    let bytes = sql.as_bytes();
    let mut native = String::with_capacity(sql.len());
    let mut placeholders = Vec::new();
    let mut state = State::Normal;
    // start of the source text not yet copied into `native`
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'?' => {
                    native.push_str(&sql[copied..idx]);
                    native.push(NATIVE_PLACEHOLDER);
                    placeholders.push(Placeholder {
                        token: "?".to_string(),
                        index: placeholders.len(),
                    });
                    copied = idx + 1;
                }
                b':' if idx == 0 || bytes[idx - 1] != b':' => {
                    let end = bytes[idx + 1..]
                        .iter()
                        .position(|&c| !is_ident_byte(c))
                        .map_or(bytes.len(), |offset| idx + 1 + offset);
                    if end > idx + 1 {
                        native.push_str(&sql[copied..idx]);
                        native.push(NATIVE_PLACEHOLDER);
                        placeholders.push(Placeholder {
                            token: sql[idx..end].to_string(),
                            index: placeholders.len(),
                        });
                        copied = end;
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted => {
                let closing = if state == State::SingleQuoted {
                    b'\''
                } else {
                    b'"'
                };
                if b == b'\\' {
                    idx += 1; // escaped character
                } else if b == closing {
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    if placeholders.is_empty() {
        native = sql.to_string();
    } else {
        native.push_str(&sql[copied..]);
    }

    CompiledQuery {
        source: sql.to_string(),
        native,
        placeholders,
    }
}
