//! Convenience wrappers over PRAGMA statements.

use crate::connection::Connection;
use litebind_core::{Result, Row, Value};

impl Connection {
    /// Column descriptions of `table`, one named row per column.
    ///
    /// Rows carry `cid`, `name`, `type`, `notnull`, `dflt_value` and `pk`.
    /// `dflt_value` is unquoted: the engine reports defaults as SQL literals,
    /// so `'it''s'` comes back as `it's` and `NULL` as a NULL value.
    pub fn table_info(&self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));
        let mut rows = self.execute2(&sql, ())?.into_iter();
        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };
        let names: Vec<String> = header.iter().map(ToString::to_string).collect();
        let default_index = names.iter().position(|n| n == "dflt_value");

        Ok(rows
            .map(|mut values| {
                if let Some(slot) = default_index.and_then(|i| values.get_mut(i)) {
                    *slot = unquote_default(std::mem::take(slot));
                }
                Row::new(names.clone(), values)
            })
            .collect())
    }
}

fn unquote_default(value: Value) -> Value {
    let Some(s) = value.as_str() else {
        return value;
    };
    if s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    for quote in ['\'', '"'] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            let doubled = format!("{quote}{quote}");
            return Value::from(inner.replace(&doubled, &quote.to_string()));
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_default() {
        assert_eq!(unquote_default(Value::from("NULL")), Value::Null);
        assert_eq!(unquote_default(Value::from("null")), Value::Null);
        assert_eq!(unquote_default(Value::from("'it''s'")), Value::from("it's"));
        assert_eq!(unquote_default(Value::from("\"say \"\"hi\"\"\"")), Value::from("say \"hi\""));
        assert_eq!(unquote_default(Value::from("42")), Value::from("42"));
        assert_eq!(unquote_default(Value::Null), Value::Null);
    }

    #[test]
    fn test_table_info() {
        let conn = Connection::open_memory().unwrap();
        conn.execute(
            "CREATE TABLE people (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL DEFAULT 'it''s',
                age INTEGER DEFAULT 42,
                nick TEXT DEFAULT NULL
            )",
            (),
        )
        .unwrap();

        let info = conn.table_info("people").unwrap();
        assert_eq!(info.len(), 4);
        assert_eq!(info[0].get_by_name("name"), Some(&Value::from("id")));
        assert_eq!(info[0].get_by_name("pk"), Some(&Value::Integer(1)));
        assert_eq!(info[1].get_by_name("type"), Some(&Value::from("TEXT")));
        assert_eq!(info[1].get_by_name("notnull"), Some(&Value::Integer(1)));
        assert_eq!(info[1].get_by_name("dflt_value"), Some(&Value::from("it's")));
        assert_eq!(info[2].get_by_name("dflt_value"), Some(&Value::from("42")));
        assert_eq!(info[3].get_by_name("dflt_value"), Some(&Value::Null));
        assert_eq!(info[0].get_by_name("dflt_value"), Some(&Value::Null));
    }

    #[test]
    fn test_table_info_missing_table() {
        let conn = Connection::open_memory().unwrap();
        assert!(conn.table_info("nope").unwrap().is_empty());
    }
}
