use super::*;
use crate::{DiffOptions, OperationId, diff, plan};
use schema_sync_model::{Index, Schema, Table};

fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("email", LogicalType::Text).not_null())
}

fn plan_between(source: Vec<Table>, target: Vec<Table>) -> MigrationPlan {
    let source = Schema::from_tables(source).unwrap();
    let target = Schema::from_tables(target).unwrap();
    plan(&diff(&source, &target, &DiffOptions::default())).unwrap()
}

fn shop() -> Vec<Table> {
    let customers = Table::new("customers")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("name", LogicalType::Text).not_null())
        .constraint(Constraint::primary_key("customers_pkey", &["id"]));
    let orders = Table::new("orders")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("customer_id", LogicalType::Integer).not_null())
        .column(
            Column::new("total", LogicalType::Numeric(Some((10, 2))))
                .not_null()
                .with_default("0"),
        )
        .index(Index::new("idx_orders_customer", &["customer_id"]))
        .constraint(Constraint::primary_key("orders_pkey", &["id"]))
        .constraint(
            Constraint::foreign_key("orders_customer_id_fkey", &["customer_id"], "customers", &["id"])
                .with_actions(FkAction::Cascade, FkAction::NoAction),
        );
    vec![orders, customers]
}

#[test]
fn test_render_add_column_and_narrowing() {
    let target = Table::new("users")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("email", LogicalType::Varchar(Some(255))).not_null())
        .column(Column::new("last_login_at", LogicalType::Timestamp));
    let plan = plan_between(vec![users()], vec![target]);

    let sql = render(plan.operations(), Dialect::Postgres).unwrap();
    insta::assert_snapshot!(sql, @r#"
    -- Auto-generated migration script
    -- Generated by schema-sync for postgres

    -- Add column users.last_login_at (TIMESTAMP)
    ALTER TABLE "users" ADD COLUMN "last_login_at" TIMESTAMP;

    -- Change type of users.email from TEXT to VARCHAR(255)
    -- WARNING: users.email narrows from TEXT to VARCHAR(255); existing values may not fit
    ALTER TABLE "users" ALTER COLUMN "email" TYPE VARCHAR(255) USING "email"::VARCHAR(255);
    "#);
}

#[test]
fn test_render_new_tables_postgres() {
    let plan = plan_between(vec![], shop());

    let sql = render(plan.operations(), Dialect::Postgres).unwrap();
    insta::assert_snapshot!(sql, @r#"
    -- Auto-generated migration script
    -- Generated by schema-sync for postgres

    -- Create table customers
    CREATE TABLE "customers" (
        "id" INTEGER NOT NULL,
        "name" TEXT NOT NULL,
        CONSTRAINT "customers_pkey" PRIMARY KEY ("id")
    );

    -- Create table orders
    CREATE TABLE "orders" (
        "id" INTEGER NOT NULL,
        "customer_id" INTEGER NOT NULL,
        "total" NUMERIC(10,2) NOT NULL DEFAULT 0,
        CONSTRAINT "orders_pkey" PRIMARY KEY ("id")
    );

    -- Add index idx_orders_customer on orders
    CREATE INDEX "idx_orders_customer" ON "orders" ("customer_id");

    -- Add FOREIGN KEY constraint orders_customer_id_fkey on orders
    ALTER TABLE "orders" ADD CONSTRAINT "orders_customer_id_fkey" FOREIGN KEY ("customer_id") REFERENCES "customers" ("id") ON DELETE CASCADE;
    "#);
}

#[test]
fn test_render_mysql_modify_column() {
    let source = users().column(Column::new("bio", LogicalType::Text));
    let target = Table::new("users")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("email", LogicalType::Varchar(Some(255))).not_null());
    let plan = plan_between(vec![source], vec![target]);

    let sql = render(plan.operations(), Dialect::MySql).unwrap();
    insta::assert_snapshot!(sql, @r#"
    -- Auto-generated migration script
    -- Generated by schema-sync for mysql

    -- Drop column users.bio
    -- WARNING: dropping column users.bio deletes its data
    ALTER TABLE `users` DROP COLUMN `bio`;

    -- Change type of users.email from TEXT to VARCHAR(255)
    -- WARNING: users.email narrows from TEXT to VARCHAR(255); existing values may not fit
    ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(255) NOT NULL;
    "#);
}

#[test]
fn test_render_is_all_or_nothing() {
    let source = users().column(Column::new("bio", LogicalType::Text));
    let target = Table::new("users")
        .column(Column::new("id", LogicalType::Integer).not_null())
        .column(Column::new("email", LogicalType::Varchar(Some(255))).not_null());
    let plan = plan_between(vec![source], vec![target]);

    let err = render(plan.operations(), Dialect::Sqlite).unwrap_err();
    assert_eq!(
        err,
        RenderError::UnsupportedOperation {
            operation: OperationId::new("alter_column_type", "users", Some("email")),
            dialect: "sqlite",
        }
    );
    assert_eq!(
        err.to_string(),
        "alter_column_type:users.email cannot be rendered for sqlite"
    );
}

#[test]
fn test_render_unknown_type_mapping() {
    let target = users().column(Column::new("retention", LogicalType::Interval));
    let plan = plan_between(vec![users()], vec![target]);

    let err = render(plan.operations(), Dialect::MySql).unwrap_err();
    assert_eq!(
        err,
        RenderError::UnknownTypeMapping {
            operation: OperationId::new("add_column", "users", Some("retention")),
            logical_type: "INTERVAL".to_string(),
            dialect: "mysql",
        }
    );
}

#[test]
fn test_render_empty_plan() {
    let sql = render(&[], Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "-- Auto-generated migration script\n-- Generated by schema-sync for postgres\n\n-- No changes.\n"
    );
}

#[test]
fn test_render_is_deterministic() {
    let first = render(plan_between(vec![], shop()).operations(), Dialect::Postgres).unwrap();
    let second = render(plan_between(vec![], shop()).operations(), Dialect::Postgres).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_render_default_and_nullability_changes() {
    let source = Table::new("tickets").column(Column::new("status", LogicalType::Text));
    let target = Table::new("tickets")
        .column(Column::new("status", LogicalType::Text).not_null().with_default("'open'"));
    let plan = plan_between(vec![source], vec![target]);

    let statements: Vec<String> = plan
        .iter()
        .map(|op| render_statement(op, &POSTGRES).unwrap())
        .collect();
    assert_eq!(
        statements,
        vec![
            r#"ALTER TABLE "tickets" ALTER COLUMN "status" SET NOT NULL;"#,
            r#"ALTER TABLE "tickets" ALTER COLUMN "status" SET DEFAULT 'open';"#,
        ]
    );
}

#[test]
fn test_drop_constraint_statements_per_dialect() {
    let source = users().constraint(
        Constraint::foreign_key("users_team_id_fkey", &["team_id"], "teams", &["id"]),
    );
    let plan = plan_between(vec![source], vec![users()]);
    let op = &plan.operations()[0];

    assert_eq!(
        render_statement(op, &POSTGRES).unwrap(),
        r#"ALTER TABLE "users" DROP CONSTRAINT "users_team_id_fkey";"#
    );
    assert_eq!(
        render_statement(op, &MYSQL).unwrap(),
        "ALTER TABLE `users` DROP FOREIGN KEY `users_team_id_fkey`;"
    );
}

#[test]
fn test_render_report() {
    let source = users().column(Column::new("bio", LogicalType::Text));
    let target = vec![
        Table::new("users")
            .column(Column::new("id", LogicalType::Integer).not_null())
            .column(Column::new("email", LogicalType::Varchar(Some(255))).not_null()),
        Table::new("audit_log").column(Column::new("id", LogicalType::BigInt).not_null()),
    ];
    let diff = diff(
        &Schema::from_tables(vec![source]).unwrap(),
        &Schema::from_tables(target).unwrap(),
        &DiffOptions::default(),
    );

    insta::assert_snapshot!(render_report(&diff), @r"
    Differences found:

    + table audit_log
    ~ table users
        - column bio
        ~ column email: TEXT -> VARCHAR(255)
    ");
}

#[test]
fn test_render_report_empty() {
    let schema = Schema::from_tables(vec![users()]).unwrap();
    let diff = diff(&schema, &schema, &DiffOptions::default());
    assert_eq!(render_report(&diff), "No differences.\n");
}

#[test]
fn test_render_plan_listing() {
    let plan = plan_between(vec![], shop());
    insta::assert_snapshot!(render_plan(&plan), @r"
    1. create_table:customers
    2. create_table:orders
    3. add_index:orders.idx_orders_customer
       after: create_table:orders
    4. add_constraint:orders.orders_customer_id_fkey
       after: create_table:customers, create_table:orders
    ");
}

#[test]
fn test_vendor_type_without_mapping_is_rejected() {
    let target = users().column(Column::new("search", LogicalType::parse("tsvector")));
    let plan = plan_between(vec![users()], vec![target]);

    let err = render(plan.operations(), Dialect::MySql).unwrap_err();
    assert_eq!(
        err,
        RenderError::UnknownTypeMapping {
            operation: OperationId::new("add_column", "users", Some("search")),
            logical_type: "TSVECTOR".to_string(),
            dialect: "mysql",
        }
    );
    assert!(render(plan.operations(), Dialect::Sqlite).is_err());

    let sql = render(plan.operations(), Dialect::Postgres).unwrap();
    assert!(sql.contains(r#"ALTER TABLE "users" ADD COLUMN "search" TSVECTOR;"#));
}
