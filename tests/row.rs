#[cfg(test)]
mod tests {
    use keel::{Entity, ErrorKind, FromRow, RowLabeled, Value};
    use std::sync::Arc;
    use time::macros::date;

    #[derive(Entity, Debug, PartialEq)]
    #[keel(table = "members m")]
    struct Member {
        #[keel(primary)]
        id: i64,
        #[keel(column = "full_name")]
        name: String,
        joined: time::Date,
        nickname: Option<String>,
        #[keel(query = "(SELECT count(*) FROM visits v WHERE v.member_id = m.id)")]
        visits: i64,
        #[keel(ignore)]
        selected: bool,
    }

    fn row(labels: &[&str], values: Vec<Value>) -> RowLabeled {
        RowLabeled::new(
            labels.iter().map(|v| v.to_string()).collect::<Arc<[String]>>(),
            values.into_boxed_slice(),
        )
    }

    fn member_row() -> RowLabeled {
        row(
            &["ID", "Full_Name", "joined", "nickname", "visits"],
            vec![
                Value::Int64(Some(4)),
                Value::Varchar(Some("Grace Hopper".into())),
                Value::Date(Some(date!(1944 - 03 - 01))),
                Value::Varchar(None),
                Value::Int64(Some(12)),
            ],
        )
    }

    #[test]
    fn labels_match_case_insensitively() {
        let member = Member::from_row(member_row()).expect("The row should decode");
        assert_eq!(
            member,
            Member {
                id: 4,
                name: "Grace Hopper".into(),
                joined: date!(1944 - 03 - 01),
                nickname: None,
                visits: 12,
                selected: false,
            }
        );
    }

    #[test]
    fn integers_widen() {
        let mut member = member_row();
        member.values[0] = Value::Int32(Some(4));
        member.values[4] = Value::Int16(Some(2));
        let member = Member::from_row(member).unwrap();
        assert_eq!((member.id, member.visits), (4, 2));
    }

    #[test]
    fn strict_decoding() {
        let missing = row(&["id", "full_name"], vec![1i64.into(), "Ada".into()]);
        let error = Member::from_row(missing).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Decode);
        assert!(error.to_string().contains("joined"));

        let mut extra = member_row();
        let mut labels = extra.labels.to_vec();
        labels[3] = "selected".into();
        extra.labels = labels.into();
        let error = Member::from_row(extra).unwrap_err();
        assert!(error.to_string().contains("selected"));

        let mut repeated = member_row();
        let mut labels = repeated.labels.to_vec();
        labels[3] = "id".into();
        repeated.labels = labels.into();
        assert_eq!(Member::from_row(repeated).unwrap_err().kind(), ErrorKind::Decode);

        let mut null = member_row();
        null.values[1] = Value::Varchar(None);
        let error = Member::from_row(null).unwrap_err();
        assert!(error.to_string().contains("full_name"));
    }
}
