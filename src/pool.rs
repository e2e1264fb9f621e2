//! Connection pool (C2) support code that sits alongside `sqlx`'s own pool.
//!
//! `sqlx` pools already hand out connections, prepare statements per
//! connection, and cache them (`statement_cache_capacity`); query text
//! itself lives next to the operation that issues it (`objects`, `files`,
//! `blackboard`, ...) rather than behind an indirection layer here. What
//! this module adds is the one piece those call sites can't express
//! themselves: escaping a literal destined for ad-hoc SQL text.

/// Doubles single quotes so a value is safe to splice into ad-hoc SQL text
/// built outside the bound-parameter path (e.g. `LIKE` fragments assembled
/// from user-supplied search terms). Idempotent only up to re-escaping an
/// already-escaped string, which doubles again — callers must escape once,
/// at the point a literal is spliced in, not on every read.
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_single_quotes_doubles_them() {
        assert_eq!(escape_single_quotes("O'Brien"), "O''Brien");
        assert_eq!(escape_single_quotes("no quotes"), "no quotes");
    }

    #[test]
    fn escape_single_quotes_nested_calls_double_escape() {
        let once = escape_single_quotes("it's");
        let twice = escape_single_quotes(&once);
        assert_eq!(twice, once.replace("''", "''''"));
    }
}
