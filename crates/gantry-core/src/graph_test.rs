use super::*;
use crate::table::Table;

fn nested_schema() -> Schema {
    let mut schema = Schema::new("shop");
    schema.add_table(Table::new("orders")).unwrap();
    schema
        .add_table(Table::nested("orders__items", "orders"))
        .unwrap();
    schema
        .add_table(Table::nested("orders__items__discounts", "orders__items"))
        .unwrap();
    schema
        .add_table(Table::nested("orders__shipments", "orders"))
        .unwrap();
    schema.add_table(Table::new("customers")).unwrap();
    schema
}

#[test]
fn test_build_and_contains() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    assert!(graph.contains("orders"));
    assert!(graph.contains("orders__items__discounts"));
    assert!(!graph.contains("unknown"));
}

#[test]
fn test_nested_tables_pre_order() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    let chain = graph.nested_tables("orders").unwrap();
    assert_eq!(
        chain,
        vec![
            "orders",
            "orders__items",
            "orders__items__discounts",
            "orders__shipments",
        ]
    );

    // Every parent appears before its children
    let items_pos = chain.iter().position(|n| n == "orders__items").unwrap();
    let discounts_pos = chain
        .iter()
        .position(|n| n == "orders__items__discounts")
        .unwrap();
    assert!(items_pos < discounts_pos);
}

#[test]
fn test_nested_tables_single_table() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    assert_eq!(graph.nested_tables("customers").unwrap(), vec!["customers"]);
}

#[test]
fn test_nested_tables_unknown_root() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    let result = graph.nested_tables("missing");
    assert!(matches!(
        result.unwrap_err(),
        CoreError::TableNotFound { .. }
    ));
}

#[test]
fn test_root_of() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    assert_eq!(graph.root_of("orders__items__discounts").unwrap(), "orders");
    assert_eq!(graph.root_of("orders").unwrap(), "orders");
    assert_eq!(graph.root_of("customers").unwrap(), "customers");
}

#[test]
fn test_roots() {
    let schema = nested_schema();
    let graph = TableGraph::build(&schema).unwrap();

    let roots = graph.roots();
    assert!(roots.contains(&"orders"));
    assert!(roots.contains(&"customers"));
    assert!(!roots.contains(&"orders__items"));
}

#[test]
fn test_unknown_parent() {
    let mut schema = Schema::new("shop");
    schema
        .add_table(Table::nested("orphan__rows", "orphan"))
        .unwrap();

    let result = TableGraph::build(&schema);
    assert!(matches!(
        result.unwrap_err(),
        CoreError::UnknownParent { .. }
    ));
}

#[test]
fn test_circular_nesting() {
    let mut schema = Schema::new("shop");
    schema.add_table(Table::nested("a", "b")).unwrap();
    schema.add_table(Table::nested("b", "a")).unwrap();

    let result = TableGraph::build(&schema);
    assert!(matches!(
        result.unwrap_err(),
        CoreError::CircularNesting { .. }
    ));
}
