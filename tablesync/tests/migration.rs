mod common;

use common::{column_row, index_row, live_users_columns, MockExecutor};
use pretty_assertions::assert_eq;
use tablesync::error::Error;
use tablesync::{Config, Row, SqlValue, TableModel, TableSyncClient};

#[derive(TableModel)]
#[table(name = "users")]
#[allow(dead_code)]
struct User {
    id: i64,
    #[column(unique)]
    email: String,
}

#[derive(TableModel)]
#[table(name = "users")]
#[allow(dead_code)]
struct UserWithPhone {
    id: i64,
    #[column(unique)]
    email: String,
    phone: Option<String>,
}

#[derive(TableModel)]
#[table(name = "users")]
#[allow(dead_code)]
struct UserWithPhoneAndAge {
    id: i64,
    #[column(unique)]
    email: String,
    phone: Option<String>,
    age: Option<i32>,
}

fn email_index() -> Vec<Row> {
    vec![index_row("uq_users_email", "email", true)]
}

const ADD_PHONE: &str = "ALTER TABLE `users` ADD COLUMN `phone` VARCHAR(255) NULL AFTER `email`";

#[tokio::test]
async fn missing_table_is_created_then_constrained() {
    let mock = MockExecutor::new();
    let config = Config::default();
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<User>().await.unwrap();

    let create = "CREATE TABLE IF NOT EXISTS `users` (\n  \
                  `id` BIGINT NOT NULL AUTO_INCREMENT,\n  \
                  `email` VARCHAR(255) NOT NULL,\n  \
                  PRIMARY KEY (`id`)\n\
                  ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";
    assert_eq!(
        mock.executed(),
        vec![
            create.to_string(),
            "ALTER TABLE `users` ADD CONSTRAINT `uq_users_email` UNIQUE (`email`)".to_string(),
        ]
    );
    assert!(report.diff.create_table.is_some());
    assert_eq!(report.executed, vec![create.to_string()]);
    assert_eq!(report.migration_id, None);
}

#[tokio::test]
async fn new_optional_field_becomes_one_add_column() {
    let mock = MockExecutor::new().with_table(live_users_columns(), email_index(), vec![]);
    let config = Config::default();
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<UserWithPhone>().await.unwrap();

    assert_eq!(mock.executed(), vec![ADD_PHONE.to_string()]);
    assert_eq!(report.executed, vec![ADD_PHONE.to_string()]);
    assert!(report.constraints.added.is_empty());

    let (sql, params) = &mock.queries()[0];
    assert!(sql.contains("information_schema.tables"));
    assert_eq!(params, &vec![SqlValue::from("users")]);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let mut columns = live_users_columns();
    columns.push(column_row("phone", "varchar(255)", true, "", None, ""));
    let mock = MockExecutor::new().with_table(columns, email_index(), vec![]);
    let config = Config::default();
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<UserWithPhone>().await.unwrap();

    assert!(mock.executed().is_empty());
    assert!(report.diff.is_empty());
    assert!(!report.has_changes());
}

#[tokio::test]
async fn default_policy_never_drops_or_tightens() {
    let columns = vec![
        column_row("id", "bigint", false, "PRI", None, "auto_increment"),
        column_row("email", "varchar(255)", true, "", None, ""),
        column_row("legacy", "int(11)", true, "", None, ""),
    ];
    let mock = MockExecutor::new().with_table(columns, email_index(), vec![]);
    let config = Config::default();
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<User>().await.unwrap();

    assert!(mock.executed().is_empty());
    assert!(report.diff.columns_to_remove.is_empty());
}

#[tokio::test]
async fn opted_in_policy_tightens_and_drops() {
    let columns = vec![
        column_row("id", "bigint", false, "PRI", None, "auto_increment"),
        column_row("email", "varchar(255)", true, "", None, ""),
        column_row("legacy", "int(11)", true, "", None, ""),
    ];
    let mock = MockExecutor::new().with_table(columns, email_index(), vec![]);
    let mut config = Config::default();
    config.migrations.allow_column_removal = true;
    config.migrations.enforce_not_null = true;
    let client = TableSyncClient::new(&mock, &config);

    client.sync::<User>().await.unwrap();

    assert_eq!(
        mock.executed(),
        vec![
            "ALTER TABLE `users` MODIFY COLUMN `email` VARCHAR(255) NOT NULL".to_string(),
            "ALTER TABLE `users` DROP COLUMN `legacy`".to_string(),
        ]
    );
}

#[tokio::test]
async fn failed_statement_stops_the_run_after_recording_history() {
    let mock = MockExecutor::new()
        .with_table(live_users_columns(), email_index(), vec![])
        .fail_on("ADD COLUMN `age`", "Duplicate column name 'age'");
    let mut config = Config::default();
    config.migrations.history_table = Some("tablesync_history".to_string());
    let client = TableSyncClient::new(&mock, &config);

    let err = client.sync::<UserWithPhoneAndAge>().await.unwrap_err();

    match err {
        Error::DdlExecutionError { statement, message } => {
            assert!(statement.contains("ADD COLUMN `age` INT NULL"));
            assert_eq!(message, "Database error: Duplicate column name 'age'");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let executed = mock.executed();
    assert_eq!(executed[0], ADD_PHONE);
    assert!(executed[1].starts_with("CREATE TABLE IF NOT EXISTS `tablesync_history`"));
    assert!(!executed.iter().any(|s| s.contains("`age`")));

    let bound = mock.bound();
    assert_eq!(bound.len(), 1);
    assert!(bound[0].0.starts_with("INSERT INTO `tablesync_history`"));
    assert_eq!(bound[0].1[1], SqlValue::from("users"));
    assert_eq!(bound[0].1[2], SqlValue::Int(1));
    assert_eq!(bound[0].1[3], SqlValue::from(ADD_PHONE));
}

#[tokio::test]
async fn history_records_column_and_constraint_statements() {
    let mock = MockExecutor::new();
    let mut config = Config::default();
    config.migrations.history_table = Some("tablesync_history".to_string());
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<User>().await.unwrap();

    let id = report.migration_id.unwrap();
    assert!(id.ends_with("_users"));
    // CREATE TABLE and the unique constraint share one id and one numbering
    let bound = mock.bound();
    assert_eq!(bound.len(), 2);
    assert!(bound.iter().all(|(_, params)| params[0] == SqlValue::from(id.as_str())));
    assert!(bound.iter().all(|(_, params)| params[1] == SqlValue::from("users")));
    let numbers: Vec<&SqlValue> = bound.iter().map(|(_, params)| &params[2]).collect();
    assert_eq!(numbers, vec![&SqlValue::Int(1), &SqlValue::Int(2)]);
    assert!(bound[1].1[3].to_string().contains("ADD CONSTRAINT `uq_users_email`"));
}

#[tokio::test]
async fn dry_run_plans_without_executing() {
    let mock = MockExecutor::new().with_table(live_users_columns(), vec![], vec![]);
    let mut config = Config::default();
    config.migrations.dry_run = true;
    let client = TableSyncClient::new(&mock, &config);

    let report = client.sync::<UserWithPhone>().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(
        report.planned,
        vec![
            ADD_PHONE.to_string(),
            "ALTER TABLE `users` ADD CONSTRAINT `uq_users_email` UNIQUE (`email`)".to_string(),
        ]
    );
    assert!(mock.executed().is_empty());
    assert!(mock.bound().is_empty());
    assert!(report.has_changes());
}
