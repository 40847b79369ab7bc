mod common;

use std::io::Write;

use common::MemoryQueryer;
use tabler::{
    CustomMigration, Error, MIGRATION_TABLE, Migration, MigrationState, Migrator, QueryMigration,
    Row, ScriptMigration, Value, Version, migrate,
};

fn stored(version: &str) -> Row {
    Row::new()
        .with("id", 1i64)
        .with("version", version)
        .with("migration_date", "2024-01-01 00:00:00")
}

fn step(sql: &str) -> Box<dyn Migration> {
    Box::new(QueryMigration::new(sql))
}

fn versions() -> Vec<Version> {
    vec![
        Version::new("1.0", vec![step("ALTER 1.0")]),
        Version::new("1.1", vec![step("ALTER 1.1 a"), step("ALTER 1.1 b")]),
        Version::new("1.2", vec![step("ALTER 1.2")]),
        Version::new("1.3", vec![step("ALTER 1.3")]),
    ]
}

fn applied(db: &MemoryQueryer) -> Vec<&str> {
    db.statements()
        .into_iter()
        .filter(|sql| sql.starts_with("ALTER"))
        .collect()
}

#[tokio::test]
async fn applies_pending_versions_in_order() {
    let mut db = MemoryQueryer::new().with_rows(vec![stored("1.0")]);
    let mut migrator = Migrator::new().unwrap();

    let report = migrator.run(&mut db, "1.2", &versions()).await.unwrap();

    assert_eq!(applied(&db), ["ALTER 1.1 a", "ALTER 1.1 b", "ALTER 1.2"]);
    assert_eq!(report.from, "1.0");
    assert_eq!(report.to, "1.2");
    assert_eq!(report.applied, 2);
    assert_eq!(migrator.state(), MigrationState::Migrated);

    let update = db.log.last().unwrap();
    assert_eq!(
        update.sql,
        format!("UPDATE `{MIGRATION_TABLE}` SET `version`=?,`migration_date`=? WHERE `id`=?")
    );
    assert_eq!(update.args[0], Value::from("1.2"));
    assert_eq!(update.args[2], Value::I64(1));
}

#[tokio::test]
async fn matching_version_is_a_no_op() {
    let mut db = MemoryQueryer::new().with_rows(vec![stored("1.2")]);
    let mut migrator = Migrator::new().unwrap();

    let report = migrator.run(&mut db, "1.2", &versions()).await.unwrap();

    assert_eq!(report.state, MigrationState::NoOp);
    assert_eq!(report.applied, 0);
    assert!(applied(&db).is_empty());
    assert_eq!(db.count_starting_with("UPDATE"), 0);
    assert_eq!(db.count_starting_with("INSERT"), 0);
}

#[tokio::test]
async fn stored_version_ahead_of_code_is_refused() {
    let mut db = MemoryQueryer::new().with_rows(vec![stored("2.0")]);

    let err = migrate(&mut db, "1.0", &versions()).await.unwrap_err();

    match err {
        Error::MigrationOrder { stored, target } => {
            assert_eq!(stored, "2.0");
            assert_eq!(target, "1.0");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(applied(&db).is_empty());
    assert_eq!(db.count_starting_with("UPDATE"), 0);
}

#[tokio::test]
async fn fresh_database_starts_at_zero() {
    let mut db = MemoryQueryer::new();

    let report = migrate(&mut db, "1.1", &versions()).await.unwrap();

    assert_eq!(report.from, "0");
    assert_eq!(
        db.statements()[0],
        format!(
            "CREATE TABLE IF NOT EXISTS `{MIGRATION_TABLE}` (\n\
             \t`id` bigint,\n\
             \t`version` VARCHAR(64),\n\
             \t`migration_date` datetime,\n\
             \tPRIMARY KEY (`id`)\n\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"
        )
    );
    let insert = db.log.iter().find(|e| e.sql.starts_with("INSERT")).unwrap();
    assert_eq!(insert.args[0], Value::I64(1));
    assert_eq!(insert.args[1], Value::from("0"));
    assert_eq!(applied(&db), ["ALTER 1.0", "ALTER 1.1 a", "ALTER 1.1 b"]);
}

#[tokio::test]
async fn failure_keeps_stored_version() {
    let mut db = MemoryQueryer::new()
        .with_rows(vec![stored("1.0")])
        .failing_on("ALTER 1.2");
    let mut migrator = Migrator::new().unwrap();

    let err = migrator.run(&mut db, "1.3", &versions()).await.unwrap_err();

    assert!(matches!(err, Error::Migration { ref version, .. } if version == "1.2"));
    assert_eq!(migrator.state(), MigrationState::Failed);
    assert_eq!(applied(&db), ["ALTER 1.1 a", "ALTER 1.1 b", "ALTER 1.2"]);
    assert_eq!(db.count_starting_with("UPDATE"), 0);
}

#[tokio::test]
async fn script_and_custom_migrations() {
    let mut script = tempfile::NamedTempFile::new().unwrap();
    write!(script, "ALTER TABLE `users` ADD `locale` VARCHAR(8)").unwrap();

    let versions = vec![Version::new(
        "1.1",
        vec![
            Box::new(ScriptMigration::new(script.path())) as Box<dyn Migration>,
            Box::new(CustomMigration::new(|q| {
                Box::pin(async move {
                    q.execute("UPDATE `users` SET `locale`='en'", &[]).await?;
                    Ok(())
                })
            })),
        ],
    )];
    let mut db = MemoryQueryer::new().with_rows(vec![stored("1.0")]);

    migrate(&mut db, "1.1", &versions).await.unwrap();

    let statements = db.statements();
    assert!(statements.contains(&"ALTER TABLE `users` ADD `locale` VARCHAR(8)"));
    assert!(statements.contains(&"UPDATE `users` SET `locale`='en'"));
}

#[tokio::test]
async fn missing_script_fails_the_version() {
    let dir = tempfile::tempdir().unwrap();
    let versions = vec![Version::new(
        "1.1",
        vec![Box::new(ScriptMigration::new(dir.path().join("missing.sql"))) as Box<dyn Migration>],
    )];
    let mut db = MemoryQueryer::new().with_rows(vec![stored("1.0")]);

    let err = migrate(&mut db, "1.1", &versions).await.unwrap_err();

    match err {
        Error::Migration { version, source } => {
            assert_eq!(version, "1.1");
            assert!(matches!(*source, Error::Script { .. }));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn failed_migrator_refuses_to_rerun() {
    let mut db = MemoryQueryer::new()
        .with_rows(vec![stored("1.0")])
        .failing_on("ALTER 1.1 b");
    let mut migrator = Migrator::new().unwrap();
    migrator.run(&mut db, "1.2", &versions()).await.unwrap_err();
    let executed = db.log.len();

    let err = migrator.run(&mut db, "1.2", &versions()).await.unwrap_err();

    assert!(matches!(err, Error::MigrationHalted));
    assert_eq!(migrator.state(), MigrationState::Failed);
    assert_eq!(db.log.len(), executed);
}
