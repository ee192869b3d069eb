//! SQL identifier quoting.
//!
//! The only means by which a caller-supplied schema/table/column name may
//! reach a SQL string: double-quote the identifier and double any embedded
//! double quote. Never interpolate a caller-supplied identifier any other
//! way.

/// Double-quote `ident` for use in SQL, doubling any embedded `"`.
pub fn quote_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push('"');
    for ch in ident.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Quote a `schema.table`-style qualified name, quoting each part
/// independently.
pub fn quote_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifier() {
        assert_eq!(quote_ident("events"), "\"events\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn quotes_qualified_name() {
        assert_eq!(quote_qualified("public", "events"), "\"public\".\"events\"");
    }
}
