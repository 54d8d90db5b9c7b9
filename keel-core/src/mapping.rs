use crate::{Error, Result};

/// Column name that excludes a field from the mapping.
pub const IGNORE: &str = "-";

/// Raw annotations of an entity, exactly as written on the type.
///
/// Emitted by `#[derive(Entity)]` as a `'static` value. Nothing is validated
/// here, [`EntityMapping::reflect`] turns it into a checked mapping.
#[derive(Debug, Clone, Copy)]
pub struct EntityTags {
    /// Rust name of the type, used in error messages.
    pub entity: &'static str,
    /// Struct-level `table = "name alias"` annotation.
    pub table: Option<&'static str>,
    /// Fields in declaration order.
    pub fields: &'static [FieldTags],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTags {
    pub field: &'static str,
    /// Field-level table annotation, it makes the field a table marker.
    pub table: Option<&'static str>,
    pub column: Option<&'static str>,
    pub query: Option<&'static str>,
    pub primary: Option<&'static str>,
}

impl FieldTags {
    /// True when the field is not part of the column list: table markers and
    /// ignored fields.
    pub fn is_skipped(&self) -> bool {
        self.table.is_some() || self.column == Some(IGNORE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub field: &'static str,
    pub name: String,
    pub primary_key: bool,
    /// SQL expression selected in place of a plain column.
    pub query: Option<String>,
}

impl ColumnMapping {
    pub fn is_computed(&self) -> bool {
        self.query.is_some()
    }
}

/// Checked description of how a type maps to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    pub entity: &'static str,
    pub table: String,
    pub alias: String,
    /// Mapped columns, in field declaration order. Aligned with the values
    /// returned by `Entity::row`.
    pub columns: Vec<ColumnMapping>,
}

impl EntityMapping {
    pub fn reflect(tags: &EntityTags) -> Result<Self> {
        let error = |reason: String| Error::Mapping {
            entity: tags.entity,
            reason,
        };
        let mut table_tag = tags.table;
        for field in tags.fields {
            if let Some(tag) = field.table {
                if table_tag.is_some() {
                    return Err(error(format!(
                        "the table annotation appears more than once (again on field `{}`)",
                        field.field
                    )));
                }
                table_tag = Some(tag);
            }
        }
        let Some(table_tag) = table_tag else {
            return Err(error(
                "no table annotation found, use it like: `#[keel(table = \"books b\")]`".into(),
            ));
        };
        let mut parts = table_tag.split_whitespace();
        let (table, alias) = match (parts.next(), parts.next(), parts.next()) {
            (Some(table), Some(alias), None) => (table.to_string(), alias.to_string()),
            (Some(table), None, None) => (table.to_string(), table.to_string()),
            _ => {
                return Err(error(format!(
                    "the table annotation `{table_tag}` must have the format \"name alias\""
                )));
            }
        };
        let mut columns = Vec::with_capacity(tags.fields.len());
        for field in tags.fields.iter().filter(|f| !f.is_skipped()) {
            let name = field.column.unwrap_or(field.field).trim();
            if name.is_empty() {
                return Err(error(format!("field `{}` has an empty column name", field.field)));
            }
            if columns
                .iter()
                .any(|c: &ColumnMapping| c.name.eq_ignore_ascii_case(name))
            {
                return Err(error(format!("column `{name}` is mapped more than once")));
            }
            let primary_key = match field.primary.map(str::trim) {
                None => false,
                Some(v) if v.eq_ignore_ascii_case("true") => true,
                Some(v) if v.eq_ignore_ascii_case("false") => false,
                Some(v) => {
                    return Err(error(format!(
                        "field `{}` has primary = `{v}`, expected `true` or `false`",
                        field.field
                    )));
                }
            };
            let query = match field.query.map(str::trim) {
                Some("") => {
                    return Err(error(format!("field `{}` has an empty query", field.field)));
                }
                Some(v) => Some(v.to_string()),
                None => None,
            };
            if primary_key && query.is_some() {
                return Err(error(format!(
                    "field `{}` cannot be both computed and part of the primary key",
                    field.field
                )));
            }
            columns.push(ColumnMapping {
                field: field.field,
                name: name.to_string(),
                primary_key,
                query,
            });
        }
        Ok(Self {
            entity: tags.entity,
            table,
            alias,
            columns,
        })
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn computed(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.is_computed())
    }

    /// Columns written by inserts, with their index in the entity row.
    pub fn writable(&self) -> impl Iterator<Item = (usize, &ColumnMapping)> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_computed())
    }
}
