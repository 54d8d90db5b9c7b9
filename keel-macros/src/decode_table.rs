use syn::{ItemStruct, LitStr};

/// Struct-level `#[keel(table = "name alias")]`, kept as written.
pub(crate) fn decode_table(item: &ItemStruct) -> Option<String> {
    let mut table = None;
    for attr in &item.attrs {
        if !attr.meta.path().is_ident("keel") {
            continue;
        }
        let Ok(list) = attr.meta.require_list() else {
            panic!("Error while parsing `keel`, use it like: `#[keel(table = \"books b\")]`");
        };
        let result = list.parse_nested_meta(|arg| {
            if arg.path.is_ident("table") {
                let Ok(v) = arg.value().and_then(|v| v.parse::<LitStr>()) else {
                    panic!(
                        "Error while parsing `table`, use it like: `#[keel(table = \"books b\")]`"
                    );
                };
                table = Some(v.value());
                Ok(())
            } else {
                Err(arg.error(format!(
                    "Unknown attribute `{}` on a struct, only `table` is allowed here",
                    arg.path
                        .get_ident()
                        .map(ToString::to_string)
                        .unwrap_or_default()
                )))
            }
        });
        if let Err(e) = result {
            panic!("{}", e);
        }
    }
    table
}
