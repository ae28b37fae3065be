use pretty_assertions::assert_eq;
use tablesync::config::{Config, NamingConfig};
use tablesync::schema::ReferentialAction;
use tablesync::{
    ConstraintDecl, DefaultValue, FieldDescriptor, SqlValue, TableDescriptor, TableModel,
    TableSyncClient,
};

#[derive(TableModel)]
#[table(name = "accounts", unique = "first_name, last_name")]
#[allow(dead_code)]
struct Account {
    id: i64,
    #[column(size = 100, unique)]
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    #[column(precision = 10, scale = 2, default = 0)]
    balance: f64,
    #[column(default = -1)]
    rank: i32,
    #[column(default = "active", index)]
    status: String,
    #[column(references = "teams.id", on_delete = "set null")]
    team_id: Option<i64>,
    #[column(default_expr = "CURRENT_TIMESTAMP")]
    created_at: chrono::NaiveDateTime,
    #[column(skip)]
    cached_score: Vec<String>,
}

#[derive(TableModel)]
#[allow(dead_code)]
struct LegacyRecord {
    #[column(primary_key, auto_increment = false, name = "record_code", db_type = "CHAR(8)")]
    code: String,
    id: i32,
    r#type: String,
}

#[test]
fn derive_lists_fields_in_declaration_order() {
    let descriptor = Account::descriptor();

    assert_eq!(descriptor.struct_name, "Account");
    assert_eq!(descriptor.table_name.as_deref(), Some("accounts"));
    let names: Vec<&str> = descriptor.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "id",
            "email",
            "first_name",
            "last_name",
            "balance",
            "rank",
            "status",
            "team_id",
            "created_at"
        ]
    );
}

#[test]
fn derive_carries_types_hints_and_defaults() {
    let descriptor = Account::descriptor();
    let field = |name: &str| -> FieldDescriptor {
        descriptor
            .fields
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .unwrap()
    };

    assert_eq!(field("id"), FieldDescriptor::new("id", "i64"));
    assert_eq!(field("email"), FieldDescriptor::new("email", "String").size(100));
    assert_eq!(
        field("first_name"),
        FieldDescriptor::new("first_name", "String").nullable(true)
    );
    assert_eq!(
        field("balance"),
        FieldDescriptor::new("balance", "f64")
            .precision(10, 2)
            .default_value(DefaultValue::Literal(SqlValue::Int(0)))
    );
    assert_eq!(
        field("rank").default,
        Some(DefaultValue::Literal(SqlValue::Int(-1)))
    );
    assert_eq!(field("status").default, Some(DefaultValue::literal("active")));
    assert_eq!(field("created_at").rust_type, "chrono::NaiveDateTime");
    assert_eq!(
        field("created_at").default,
        Some(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()))
    );
}

#[test]
fn derive_collects_constraints() {
    assert_eq!(
        Account::descriptor().constraints,
        vec![
            ConstraintDecl::unique(&["first_name", "last_name"]),
            ConstraintDecl::unique(&["email"]),
            ConstraintDecl::index(&["status"]),
            ConstraintDecl::foreign_key("team_id", "teams", "id")
                .on_actions(ReferentialAction::SetNull, ReferentialAction::Restrict),
        ]
    );
}

#[test]
fn derive_handles_overrides_and_raw_identifiers() {
    let expected = TableDescriptor::new("LegacyRecord")
        .field(
            FieldDescriptor::new("code", "String")
                .column("record_code")
                .db_type("CHAR(8)")
                .primary_key(true)
                .auto_increment(false),
        )
        .field(FieldDescriptor::new("id", "i32"))
        .field(FieldDescriptor::new("type", "String"));
    assert_eq!(LegacyRecord::descriptor(), expected);
}

#[test]
fn derived_descriptor_introspects_into_a_valid_schema() {
    let config = Config::default();
    let mock = NoDatabase;
    let client = TableSyncClient::new(&mock, &config);

    let schema = client.target_schema(&LegacyRecord::descriptor()).unwrap();
    assert_eq!(schema.table_name, "legacy_records");
    let pk: Vec<&str> = schema.primary_key().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(pk, vec!["record_code"]);
    assert!(!schema.column("id").unwrap().is_primary_key);

    let accounts = client.target_schema(&Account::descriptor()).unwrap();
    let constraints = accounts.constraints();
    let index_names: Vec<&str> = constraints.indexes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        index_names,
        vec!["uq_accounts_first_name_last_name", "uq_accounts_email", "ix_accounts_status"]
    );
    assert_eq!(constraints.foreign_keys[0].name, "fk_accounts_team_id");
    assert_eq!(
        accounts.column("balance").unwrap().sql_type,
        "DECIMAL(10,2)"
    );
    assert_eq!(
        TableDescriptor::new("Account").resolved_table_name(&NamingConfig::default()),
        "accounts"
    );
}

/// Executor for tests that never reach the database
struct NoDatabase;

#[async_trait::async_trait]
impl tablesync::SqlExecutor for NoDatabase {
    async fn execute(&self, _sql: &str) -> tablesync::Result<u64> {
        unreachable!("no statements expected")
    }

    async fn execute_with(&self, _sql: &str, _params: &[SqlValue]) -> tablesync::Result<u64> {
        unreachable!("no statements expected")
    }

    async fn fetch_all(&self, _sql: &str, _params: &[SqlValue]) -> tablesync::Result<Vec<tablesync::Row>> {
        unreachable!("no queries expected")
    }
}
