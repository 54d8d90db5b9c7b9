use crate::{Entity, EntityMapping, Error, Result, Value, separated_by};
use std::fmt::Write;

/// Renders the statements built from entity metadata.
///
/// Identifiers are written verbatim, the way they appear in the annotations.
/// Raw fragments supplied by callers are appended as they are: they must be
/// trusted text, only bound arguments are safe against injection.
pub trait SqlWriter {
    fn write_placeholder(&self, out: &mut String, index: usize) {
        let _ = write!(out, "${}", index);
    }

    fn write_select(&self, out: &mut String, mapping: &EntityMapping) {
        out.push_str("SELECT ");
        out.push_str(&mapping.alias);
        out.push_str(".*");
        for column in mapping.computed() {
            out.push_str(", ");
            out.push_str(column.query.as_deref().unwrap_or_default());
            out.push_str(" AS ");
            out.push_str(&column.name);
        }
        out.push_str(" FROM ");
        out.push_str(&mapping.table);
        out.push(' ');
        out.push_str(&mapping.alias);
    }

    /// Writes the upsert for one entity, the returned indexes select the
    /// values of the entity row that bind to `$1..$n`.
    fn write_insert_upsert(&self, out: &mut String, mapping: &EntityMapping) -> Result<Vec<usize>> {
        if mapping.primary_keys().next().is_none() {
            return Err(Error::Mapping {
                entity: mapping.entity,
                reason: "no primary key declared, use `#[keel(primary)]` on at least one field"
                    .into(),
            });
        }
        let (indexes, columns): (Vec<_>, Vec<_>) = mapping.writable().unzip();
        out.push_str("INSERT INTO ");
        out.push_str(&mapping.table);
        out.push_str(" (");
        separated_by(out, &columns, |out, c| out.push_str(&c.name), ", ");
        out.push_str(") VALUES (");
        separated_by(
            out,
            1..=columns.len(),
            |out, i| self.write_placeholder(out, i),
            ", ",
        );
        out.push_str(") ON CONFLICT(");
        separated_by(
            out,
            mapping.primary_keys(),
            |out, c| out.push_str(&c.name),
            ", ",
        );
        out.push(')');
        let mut updates = columns.iter().filter(|c| !c.primary_key).peekable();
        if updates.peek().is_none() {
            out.push_str(" DO NOTHING");
        } else {
            out.push_str(" DO UPDATE SET ");
            separated_by(
                out,
                updates,
                |out, c| {
                    out.push_str(&c.name);
                    out.push_str(" = EXCLUDED.");
                    out.push_str(&c.name);
                },
                ", ",
            );
        }
        Ok(indexes)
    }

    /// Appends ` ORDER BY ...` built from sort directives, nothing when none
    /// of them produces output.
    ///
    /// A directive made of exactly two comma separated parts whose second
    /// part is `asc` or `desc` (any case) is written `column ASC|DESC`. Any
    /// other directive is raw `ORDER BY` text and is copied verbatim.
    fn write_order_by(&self, out: &mut String, sort: &[String]) {
        let mut clause = String::new();
        separated_by(
            &mut clause,
            sort,
            |out, directive| {
                let directive = directive.trim();
                let direction = directive
                    .split_once(',')
                    .filter(|(column, _)| !column.trim().is_empty())
                    .and_then(|(column, direction)| {
                        let direction = direction.trim();
                        if direction.eq_ignore_ascii_case("asc") {
                            Some((column.trim(), "ASC"))
                        } else if direction.eq_ignore_ascii_case("desc") {
                            Some((column.trim(), "DESC"))
                        } else {
                            None
                        }
                    });
                match direction {
                    Some((column, direction)) => {
                        out.push_str(column);
                        out.push(' ');
                        out.push_str(direction);
                    }
                    None => out.push_str(directive),
                }
            },
            ", ",
        );
        if !clause.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&clause);
        }
    }

    /// Appends ` LIMIT $n OFFSET $m` using the two placeholders following the
    /// `bound` arguments already in the query.
    fn write_limit_offset(&self, out: &mut String, bound: usize) {
        out.push_str(" LIMIT ");
        self.write_placeholder(out, bound + 1);
        out.push_str(" OFFSET ");
        self.write_placeholder(out, bound + 2);
    }

    fn write_count(&self, out: &mut String, query: &str) {
        out.push_str("SELECT COUNT(*) FROM (");
        out.push_str(query.trim_end().trim_end_matches(';'));
        out.push_str(") AS count_query");
    }
}

#[derive(Default)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {}

/// `SELECT <alias>.*, <computed> AS <column>... FROM <table> <alias>` for `E`.
///
/// Callers append their own trusted `WHERE`/`ORDER BY` text.
pub fn generate_select<E: Entity>() -> Result<String> {
    let mapping = E::mapping()?;
    let mut out = String::with_capacity(128);
    GenericSqlWriter.write_select(&mut out, &mapping);
    Ok(out)
}

/// Upsert statement for `entity` and its bound arguments, aligned with the
/// column list.
pub fn generate_insert_upsert<E: Entity>(entity: &E) -> Result<(String, Vec<Value>)> {
    let generation = |source: Error| Error::Generation {
        entity: E::tags().entity,
        statement: "insert",
        source: Box::new(source),
    };
    let mapping = E::mapping().map_err(generation)?;
    let mut out = String::with_capacity(256);
    let indexes = GenericSqlWriter
        .write_insert_upsert(&mut out, &mapping)
        .map_err(generation)?;
    let mut row = entity.row();
    if row.len() != mapping.columns.len() {
        return Err(generation(Error::Mapping {
            entity: mapping.entity,
            reason: format!(
                "the entity produced {} values for {} columns",
                row.len(),
                mapping.columns.len()
            ),
        }));
    }
    let args = indexes
        .into_iter()
        .map(|i| std::mem::take(&mut row[i]))
        .collect();
    Ok((out, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnMapping, EntityMapping};
    use indoc::indoc;

    fn column(name: &str, primary_key: bool, query: Option<&str>) -> ColumnMapping {
        ColumnMapping {
            field: "field",
            name: name.into(),
            primary_key,
            query: query.map(Into::into),
        }
    }

    fn flows() -> EntityMapping {
        EntityMapping {
            entity: "Flow",
            table: "flows".into(),
            alias: "f".into(),
            columns: vec![
                column("id", true, None),
                column("name", false, None),
                column(
                    "step_count",
                    false,
                    Some("(SELECT count(*) FROM steps s WHERE s.flow_id = f.id)"),
                ),
                column("owner", false, None),
            ],
        }
    }

    #[test]
    fn select_puts_wildcard_first() {
        let mut out = String::new();
        GenericSqlWriter.write_select(&mut out, &flows());
        assert_eq!(
            out,
            indoc! {"
                SELECT f.*, (SELECT count(*) FROM steps s WHERE s.flow_id = f.id) AS step_count FROM flows f
            "}
            .trim_end()
        );
    }

    #[test]
    fn upsert_skips_computed_columns() {
        let mut out = String::new();
        let indexes = GenericSqlWriter
            .write_insert_upsert(&mut out, &flows())
            .unwrap();
        assert_eq!(indexes, [0, 1, 3]);
        assert_eq!(
            out,
            "INSERT INTO flows (id, name, owner) VALUES ($1, $2, $3) \
             ON CONFLICT(id) DO UPDATE SET name = EXCLUDED.name, owner = EXCLUDED.owner"
        );
    }

    #[test]
    fn upsert_with_keys_only_does_nothing() {
        let mapping = EntityMapping {
            entity: "Membership",
            table: "memberships".into(),
            alias: "m".into(),
            columns: vec![column("user_id", true, None), column("group_id", true, None)],
        };
        let mut out = String::new();
        GenericSqlWriter
            .write_insert_upsert(&mut out, &mapping)
            .unwrap();
        assert_eq!(
            out,
            "INSERT INTO memberships (user_id, group_id) VALUES ($1, $2) \
             ON CONFLICT(user_id, group_id) DO NOTHING"
        );
    }

    #[test]
    fn upsert_requires_primary_key() {
        let mapping = EntityMapping {
            entity: "Log",
            table: "logs".into(),
            alias: "l".into(),
            columns: vec![column("line", false, None)],
        };
        let error = GenericSqlWriter
            .write_insert_upsert(&mut String::new(), &mapping)
            .unwrap_err();
        assert!(error.to_string().contains("`Log`"));
    }

    #[test]
    fn order_by_directives() {
        let mut out = String::new();
        GenericSqlWriter.write_order_by(
            &mut out,
            &[
                "name,Desc".into(),
                "".into(),
                "created_at".into(),
                "length(title), asc".into(),
                "rank NULLS LAST".into(),
            ],
        );
        assert_eq!(
            out,
            " ORDER BY name DESC, created_at, length(title) ASC, rank NULLS LAST"
        );
        let mut out = String::new();
        GenericSqlWriter.write_order_by(&mut out, &[" ".into()]);
        assert_eq!(out, "");
    }

    #[test]
    fn order_by_passes_raw_fragments() {
        let mut out = String::new();
        GenericSqlWriter.write_order_by(
            &mut out,
            &[
                "name,id".into(),
                "a,b,desc".into(),
                "id,desc nulls first".into(),
            ],
        );
        assert_eq!(out, " ORDER BY name,id, a,b,desc, id,desc nulls first");
    }

    #[test]
    fn count_and_limit() {
        let mut query = String::from("SELECT f.* FROM flows f WHERE f.owner = $1 ORDER BY id;");
        let mut count = String::new();
        GenericSqlWriter.write_count(&mut count, &query);
        assert_eq!(
            count,
            "SELECT COUNT(*) FROM (SELECT f.* FROM flows f WHERE f.owner = $1 ORDER BY id) AS count_query"
        );
        query.pop();
        GenericSqlWriter.write_limit_offset(&mut query, 1);
        assert!(query.ends_with("ORDER BY id LIMIT $2 OFFSET $3"));
    }
}
