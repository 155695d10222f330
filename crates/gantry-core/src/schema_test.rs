use super::*;

fn shop_schema() -> Schema {
    let mut schema = Schema::new("shop");
    schema
        .add_table(
            Table::new("orders")
                .with_write_disposition(WriteDisposition::Merge)
                .with_column(Column::new("id", ColumnType::Bigint).primary_key())
                .with_seen_data(),
        )
        .unwrap();
    schema
        .add_table(Table::nested("orders__items", "orders").with_seen_data())
        .unwrap();
    schema
        .add_table(Table::new("customers").with_seen_data())
        .unwrap();
    schema
}

#[test]
fn test_new_seeds_bookkeeping_tables() {
    let schema = Schema::new("shop");

    assert!(schema.contains_table(VERSION_TABLE_NAME));
    assert!(schema.contains_table(LOADS_TABLE_NAME));
    assert_eq!(schema.version, 1);
    assert_eq!(
        schema.bookkeeping_table_names(),
        vec![VERSION_TABLE_NAME, LOADS_TABLE_NAME]
    );
}

#[test]
fn test_is_bookkeeping_table() {
    assert!(Schema::is_bookkeeping_table("_gantry_version"));
    assert!(Schema::is_bookkeeping_table("_gantry_loads"));
    assert!(!Schema::is_bookkeeping_table("orders"));
}

#[test]
fn test_data_tables_exclude_bookkeeping() {
    let schema = shop_schema();
    let names = schema.data_table_names();

    assert_eq!(names, vec!["customers", "orders", "orders__items"]);
}

#[test]
fn test_duplicate_table_rejected() {
    let mut schema = Schema::new("shop");
    schema.add_table(Table::new("orders")).unwrap();

    let result = schema.add_table(Table::new("orders"));
    assert!(matches!(
        result.unwrap_err(),
        CoreError::DuplicateTable { .. }
    ));
}

#[test]
fn test_resolved_write_disposition_inherits_from_root() {
    let schema = shop_schema();

    assert_eq!(
        schema.resolved_write_disposition("orders").unwrap(),
        WriteDisposition::Merge
    );
    // Nested table inherits merge from its root
    assert_eq!(
        schema.resolved_write_disposition("orders__items").unwrap(),
        WriteDisposition::Merge
    );
    // No disposition anywhere falls back to append
    assert_eq!(
        schema.resolved_write_disposition("customers").unwrap(),
        WriteDisposition::Append
    );
}

#[test]
fn test_resolved_write_disposition_nearest_ancestor_wins() {
    let mut schema = Schema::new("shop");
    schema
        .add_table(Table::new("a").with_write_disposition(WriteDisposition::Replace))
        .unwrap();
    schema
        .add_table(Table::nested("a__b", "a").with_write_disposition(WriteDisposition::Append))
        .unwrap();
    schema.add_table(Table::nested("a__b__c", "a__b")).unwrap();

    assert_eq!(
        schema.resolved_write_disposition("a__b__c").unwrap(),
        WriteDisposition::Append
    );
}

#[test]
fn test_root_table() {
    let schema = shop_schema();

    assert_eq!(schema.root_table("orders__items").unwrap().name, "orders");
    assert_eq!(schema.root_table("orders").unwrap().name, "orders");
    assert!(matches!(
        schema.root_table("missing").unwrap_err(),
        CoreError::TableNotFound { .. }
    ));
}

#[test]
fn test_nested_tables_resolves_hints() {
    let schema = shop_schema();
    let chain = schema.nested_tables("orders").unwrap();

    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].name, "orders");
    assert_eq!(chain[1].name, "orders__items");
    // The clone carries the resolved disposition, not the raw None
    assert_eq!(
        chain[1].write_disposition,
        Some(WriteDisposition::Merge)
    );
}

#[test]
fn test_version_hash_ignores_version_counter() {
    let mut a = shop_schema();
    let b = shop_schema();
    assert_eq!(a.version_hash().unwrap(), b.version_hash().unwrap());

    a.version += 1;
    assert_eq!(a.version_hash().unwrap(), b.version_hash().unwrap());

    a.tables.get_mut("customers").unwrap().columns.insert(
        "email".to_string(),
        Column::new("email", ColumnType::Text),
    );
    assert_ne!(a.version_hash().unwrap(), b.version_hash().unwrap());
}

#[test]
fn test_yaml_round_trip() {
    let schema = shop_schema();
    let yaml = schema.to_yaml().unwrap();
    let parsed = Schema::from_yaml(&yaml).unwrap();

    assert_eq!(parsed.name, "shop");
    assert_eq!(parsed.data_table_names(), schema.data_table_names());
    assert_eq!(
        parsed.version_hash().unwrap(),
        schema.version_hash().unwrap()
    );
}

#[test]
fn test_from_yaml_authored_by_hand() {
    let yaml = r#"
name: shop
tables:
  orders:
    name: orders
    write_disposition: merge
    seen_data: true
    columns:
      id:
        name: id
        data_type: bigint
        primary_key: true
  orders__items:
    name: orders__items
    parent: orders
"#;
    let schema = Schema::from_yaml(yaml).unwrap();

    assert_eq!(schema.version, 1);
    assert!(schema.contains_table(VERSION_TABLE_NAME));
    assert_eq!(
        schema.resolved_write_disposition("orders__items").unwrap(),
        WriteDisposition::Merge
    );
    assert_eq!(schema.table("orders").unwrap().primary_key_columns(), vec!["id"]);
}
