use syn::{Field, Ident, Lit, LitStr, Type};

/// Column name that excludes a field, same as `keel_core::IGNORE`.
const IGNORE: &str = "-";

/// Raw `#[keel(...)]` annotations of a field.
pub(crate) struct FieldMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) table: Option<String>,
    pub(crate) column: Option<String>,
    pub(crate) query: Option<String>,
    pub(crate) primary: Option<String>,
}

impl FieldMetadata {
    /// Table markers and ignored fields are not part of the row.
    pub(crate) fn is_skipped(&self) -> bool {
        self.table.is_some() || self.column.as_deref() == Some(IGNORE)
    }

    /// Result column label the field is decoded from.
    pub(crate) fn name(&self) -> String {
        self.column
            .as_deref()
            .map(str::trim)
            .map(ToString::to_string)
            .unwrap_or_else(|| self.ident.to_string())
    }
}

pub(crate) fn decode_column(field: &Field) -> FieldMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Entity fields are expected to have a name");
    let mut metadata = FieldMetadata {
        ident,
        ty: field.ty.clone(),
        table: None,
        column: None,
        query: None,
        primary: None,
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("keel") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `keel`, use it like: `#[keel(attribute = value, ...)]`");
        };
        let result = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("table") {
                let Ok(v) = arg.value().and_then(|v| v.parse::<LitStr>()) else {
                    panic!(
                        "Error while parsing `table`, use it like: `#[keel(table = \"books b\")]`"
                    );
                };
                metadata.table = Some(v.value());
            } else if arg.path.is_ident("column") {
                let Ok(v) = arg.value().and_then(|v| v.parse::<LitStr>()) else {
                    panic!(
                        "Error while parsing `column`, use it like: `#[keel(column = \"title\")]`"
                    );
                };
                metadata.column = Some(v.value());
            } else if arg.path.is_ident("ignore") {
                let Err(..) = arg.value() else {
                    // value() is Err for Meta::Path
                    panic!("Error while parsing `ignore`, use it like: `#[keel(ignore)]`");
                };
                metadata.column = Some(IGNORE.into());
            } else if arg.path.is_ident("query") {
                let Ok(v) = arg.value().and_then(|v| v.parse::<LitStr>()) else {
                    panic!(
                        "Error while parsing `query`, use it like: `#[keel(query = \"(SELECT ...)\")]`"
                    );
                };
                metadata.query = Some(v.value());
            } else if arg.path.is_ident("primary") {
                metadata.primary = Some(match arg.value() {
                    // value() is Err for Meta::Path
                    Err(..) => "true".into(),
                    Ok(v) => match v.parse::<Lit>() {
                        Ok(Lit::Bool(v)) => v.value.to_string(),
                        Ok(Lit::Str(v)) => v.value(),
                        _ => panic!(
                            "Error while parsing `primary`, use it like: `#[keel(primary)]` or `#[keel(primary = false)]`"
                        ),
                    },
                });
            } else {
                panic!(
                    "Unknown attribute `{}` inside keel macro",
                    arg.path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                );
            }
            Ok(())
        });
        if let Err(e) = result {
            panic!("{}", e);
        }
    }
    metadata
}
