#[cfg(test)]
mod tests {
    use keel::{Entity, ErrorKind, register};
    use std::sync::Arc;

    #[derive(Entity)]
    #[keel(table = "companies c")]
    struct Company {
        #[keel(primary)]
        id: i64,
        #[keel(column = "name")]
        display_name: String,
        #[keel(query = "(SELECT count(*) FROM flows f WHERE f.company_id = c.id)")]
        flow_count: i64,
        #[keel(ignore)]
        _cache: Option<String>,
    }

    #[derive(Entity)]
    struct Flow {
        #[keel(table = "flows f")]
        _table: (),
        #[keel(primary = true)]
        id: i64,
        #[keel(primary = "TRUE")]
        company_id: i64,
        name: Option<String>,
    }

    #[derive(Entity)]
    struct Orphan {
        id: i64,
    }

    #[derive(Entity)]
    #[keel(table = "a b c")]
    struct ThreeWords {
        id: i64,
    }

    #[derive(Entity)]
    #[keel(table = "twins t")]
    struct Twins {
        name: String,
        #[keel(column = "NAME")]
        other: String,
    }

    #[derive(Entity)]
    #[keel(table = "computed_keys k")]
    struct ComputedKey {
        #[keel(primary, query = "(SELECT 1)")]
        id: i64,
    }

    #[test]
    fn company_mapping() {
        let mapping = Company::mapping().expect("Company should map");
        assert_eq!(mapping.entity, "Company");
        assert_eq!(mapping.table, "companies");
        assert_eq!(mapping.alias, "c");
        let names: Vec<_> = mapping.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "flow_count"]);
        assert_eq!(mapping.columns[1].field, "display_name");
        assert!(mapping.columns[0].primary_key);
        assert!(mapping.columns[2].is_computed());
        assert_eq!(
            Company {
                id: 1,
                display_name: "Acme".into(),
                flow_count: 0,
                _cache: Some("ignored".into()),
            }
            .row()
            .len(),
            3
        );
    }

    #[test]
    fn mapping_is_cached() {
        let first = Flow::mapping().unwrap();
        let second = Flow::mapping().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.table, "flows");
        assert_eq!(first.alias, "f");
        assert_eq!(first.primary_keys().count(), 2);
        assert!(register::<Flow>().is_ok());
    }

    #[test]
    fn invalid_annotations() {
        for error in [
            Orphan::mapping().unwrap_err(),
            ThreeWords::mapping().unwrap_err(),
            Twins::mapping().unwrap_err(),
            ComputedKey::mapping().unwrap_err(),
        ] {
            assert_eq!(error.kind(), ErrorKind::Mapping);
        }
        // Not cached, the same error comes back
        assert!(register::<Orphan>().is_err());
        let error = Orphan::mapping().unwrap_err();
        assert!(error.to_string().contains("`Orphan`"));
    }
}
