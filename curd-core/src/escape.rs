//! Identifier escaping and placeholder dialect handling.

/// Marker emitted during statement assembly, rewritten by
/// [`Placeholders::finalize`] for numbered dialects.
pub(crate) const MARKER: char = '?';

/// Escape a plain identifier.
///
/// Names already containing a quote or a comma, or interior whitespace after
/// trimming, are treated as pre-formatted text and passed through unchanged.
/// Otherwise each dot-separated segment is quoted individually:
/// `u.id` becomes `"u"."id"`.
pub fn escape(name: &str) -> String {
    if name.contains('"') || name.contains(',') {
        return name.to_string();
    }
    let name = name.trim();
    if name.contains(' ') {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('.', "\".\""))
}

/// Escape a select-column expression.
///
/// Superset handling over [`escape`]: expressions containing a quote, a comma
/// or an opening parenthesis (function calls, multi-column lists) pass through
/// unchanged. A case-insensitive interior ` as ` keyword splits the expression
/// into column and alias, escaped independently.
pub fn escape_column(name: &str) -> String {
    if name.contains('"') || name.contains(',') || name.contains('(') {
        return name.to_string();
    }
    let lower = name.to_ascii_lowercase();
    if let Some(pos) = lower.find(" as ") {
        if pos > 0 {
            return format!("{} AS {}", escape(&name[..pos]), escape(&name[pos + 4..]));
        }
    }
    escape(name)
}

/// Placeholder dialect expected by the backend.
///
/// Assembly always emits the single repeated `?` marker; the `Numbered`
/// dialect rewrites every marker, left to right, into `$1`, `$2`, ... in one
/// global pass at finalization. Placeholder numbering therefore always matches
/// argument order, including UPDATE statements where SET arguments precede
/// WHERE arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholders {
    /// Sequential `$n` markers (PostgreSQL)
    #[default]
    Numbered,
    /// Single repeated `?` marker
    Marker,
}

impl Placeholders {
    /// Rewrite assembly markers into the dialect's literal placeholder text.
    pub fn finalize(self, sql: &str) -> String {
        match self {
            Placeholders::Marker => sql.to_string(),
            Placeholders::Numbered => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0u32;
                for ch in sql.chars() {
                    if ch == MARKER {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}
