#[cfg(test)]
mod tests {
    use indoc::indoc;
    use keel::{Entity, ErrorKind, Value, generate_insert_upsert, generate_select};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[derive(Entity)]
    #[keel(table = "orders o")]
    struct Order {
        #[keel(primary)]
        id: Uuid,
        customer: String,
        total: Decimal,
        #[keel(
            query = "(SELECT coalesce(sum(l.quantity), 0) FROM order_lines l WHERE l.order_id = o.id)"
        )]
        items: i64,
        note: Option<String>,
    }

    #[derive(Entity)]
    #[keel(table = "order_tags")]
    struct OrderTag {
        #[keel(primary)]
        order_id: Uuid,
        #[keel(primary)]
        tag: String,
    }

    #[derive(Entity)]
    #[keel(table = "events e")]
    struct Event {
        id: i64,
        payload: String,
    }

    fn order() -> Order {
        Order {
            id: Uuid::from_u128(7),
            customer: "Ada".into(),
            total: Decimal::new(1999, 2),
            items: 3,
            note: None,
        }
    }

    #[test]
    fn order_select() {
        assert_eq!(
            generate_select::<Order>().unwrap(),
            indoc! {"
                SELECT o.*, (SELECT coalesce(sum(l.quantity), 0) FROM order_lines l WHERE l.order_id = o.id) AS items FROM orders o
            "}
            .trim_end()
        );
        assert_eq!(
            Order::select_query("  WHERE o.customer = $1 ").unwrap(),
            "SELECT o.*, (SELECT coalesce(sum(l.quantity), 0) FROM order_lines l WHERE l.order_id = o.id) AS items FROM orders o WHERE o.customer = $1"
        );
        assert_eq!(
            generate_select::<OrderTag>().unwrap(),
            "SELECT order_tags.* FROM order_tags order_tags"
        );
    }

    #[test]
    fn order_upsert() {
        let (sql, args) = generate_insert_upsert(&order()).unwrap();
        assert_eq!(
            sql,
            indoc! {"
                INSERT INTO orders (id, customer, total, note) VALUES ($1, $2, $3, $4) \
                ON CONFLICT(id) DO UPDATE SET customer = EXCLUDED.customer, total = EXCLUDED.total, note = EXCLUDED.note
            "}
            .trim_end()
        );
        assert_eq!(args.len(), 4);
        assert!(matches!(&args[0], Value::Uuid(Some(v)) if *v == Uuid::from_u128(7)));
        assert!(matches!(&args[1], Value::Varchar(Some(v)) if v == "Ada"));
        assert!(matches!(args[2], Value::Decimal(Some(_))));
        assert!(matches!(args[3], Value::Varchar(None)));
    }

    #[test]
    fn keys_only_upsert() {
        let (sql, args) = generate_insert_upsert(&OrderTag {
            order_id: Uuid::nil(),
            tag: "gift".into(),
        })
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO order_tags (order_id, tag) VALUES ($1, $2) ON CONFLICT(order_id, tag) DO NOTHING"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn upsert_without_key() {
        let error = generate_insert_upsert(&Event {
            id: 1,
            payload: "{}".into(),
        })
        .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Generation);
        assert!(error.has_kind(ErrorKind::Mapping));
        assert!(error.report().to_string().contains("no primary key"));
    }
}
