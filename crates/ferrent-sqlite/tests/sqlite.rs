//! End-to-end tests against real SQLite databases.

use chrono::NaiveDate;
use ferrent_core::SqlValue;
use ferrent_orm::filter::{eq, in_list, is_null, like};
use ferrent_orm::{Db, Entity, Error, IsolationLevel, Schema, Table};
use ferrent_sqlite::{SqliteConfig, SqliteDriver};

// =============================================================================
// Zoo schema
// =============================================================================

#[allow(dead_code)]
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Habitat {
    pub id: i64,
    pub name: String,
    pub animals: Vec<Animal>,
}

#[allow(dead_code)]
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Animal {
    pub id: i64,
    #[orm("index")]
    pub name: String,
    #[orm("default:'wild'")]
    pub origin: String,
    pub habitat_id: Option<i64>,
}

#[allow(dead_code)]
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Keeper {
    pub id: i64,
    #[orm("unique")]
    pub email: String,
    pub active: bool,
    pub hired: NaiveDate,
}

#[derive(Schema)]
pub struct StaffSchema {
    pub keeper: Table<Keeper>,
}

#[derive(Schema)]
pub struct Zoo {
    pub habitat: Table<Habitat>,
    pub animal: Table<Animal>,
    pub staff: StaffSchema,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn connect(config: SqliteConfig) -> Db<Zoo> {
    init_tracing();
    Db::<Zoo>::open(SqliteDriver::new(config)).await.unwrap()
}

async fn open() -> Db<Zoo> {
    let db = connect(SqliteConfig::memory()).await;
    db.migrate().auto_migrate().await.unwrap();
    db
}

fn habitat(name: &str) -> Habitat {
    Habitat {
        name: name.to_string(),
        ..Habitat::default()
    }
}

fn animal(name: &str, habitat_id: Option<i64>) -> Animal {
    Animal {
        name: name.to_string(),
        habitat_id,
        ..Animal::default()
    }
}

fn keeper(email: &str) -> Keeper {
    Keeper {
        email: email.to_string(),
        active: true,
        hired: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ..Keeper::default()
    }
}

async fn column_names(db: &Db<Zoo>, table: &str) -> Vec<SqlValue> {
    db.raw(format!(
        "SELECT name FROM pragma_table_info('{table}') ORDER BY cid"
    ))
    .fetch()
    .await
    .unwrap()
    .into_iter()
    .map(|mut row| row.remove(0))
    .collect()
}

// =============================================================================
// Statements
// =============================================================================

#[tokio::test]
async fn test_insert_round_trip() {
    let db = open().await;
    let mut savanna = habitat("Savanna");
    db.insert(&db.habitat).one(&mut savanna).await.unwrap();
    assert_eq!(savanna.id, 1);

    let mut lion = animal("Lion", Some(savanna.id));
    db.insert(&db.animal).one(&mut lion).await.unwrap();
    assert!(lion.id > 0);

    let stored = db
        .select(&db.animal)
        .filter(eq(db.animal.id, lion.id))
        .one()
        .await
        .unwrap();
    assert_eq!(stored.name, "Lion");
    assert_eq!(stored.origin, "wild");
    assert_eq!(stored.habitat_id, Some(savanna.id));
}

#[tokio::test]
async fn test_batch_insert_writes_back_every_id() {
    let db = open().await;
    let mut animals = vec![
        animal("Cat", None),
        animal("Dog", None),
        Animal {
            origin: "farm".to_string(),
            ..animal("Cow", None)
        },
    ];
    db.insert(&db.animal).all(&mut animals).await.unwrap();
    let ids: Vec<i64> = animals.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let origins = db
        .select_columns(db.animal.origin)
        .order_by_asc(db.animal.id)
        .all()
        .await
        .unwrap();
    // a default column is sent as soon as one row sets it
    assert_eq!(origins, vec!["", "", "farm"]);
}

#[tokio::test]
async fn test_update_save_remove() {
    let db = open().await;
    let mut cat = animal("Cat", None);
    db.insert(&db.animal).one(&mut cat).await.unwrap();

    let updated = db
        .update(&db.animal)
        .set(db.animal.name, "Lynx")
        .matching(eq(db.animal.id, cat.id))
        .await
        .unwrap();
    assert_eq!(updated, 1);

    cat.name = "Puma".to_string();
    assert_eq!(db.save(&db.animal).one(&cat).await.unwrap(), 1);
    let names = db.select_columns(db.animal.name).all().await.unwrap();
    assert_eq!(names, vec!["Puma"]);

    assert_eq!(db.remove(&db.animal).by_value(&cat).await.unwrap(), 1);
    assert_eq!(db.select(&db.animal).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_matching_in_list() {
    let db = open().await;
    let mut animals = vec![
        animal("Cat", None),
        animal("Dog", None),
        animal("Eel", None),
    ];
    db.insert(&db.animal).all(&mut animals).await.unwrap();

    let deleted = db
        .delete(&db.animal)
        .matching(in_list(db.animal.name, ["Cat", "Eel"]))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    let nothing = db
        .delete(&db.animal)
        .matching(in_list(db.animal.name, Vec::<String>::new()))
        .await
        .unwrap();
    assert_eq!(nothing, 0);
    assert_eq!(db.delete(&db.animal).all().await.unwrap(), 1);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_join_and_projections() {
    let db = open().await;
    let mut savanna = habitat("Savanna");
    db.insert(&db.habitat).one(&mut savanna).await.unwrap();
    let mut animals = vec![
        animal("Lion", Some(savanna.id)),
        animal("Zebra", Some(savanna.id)),
        animal("Stray", None),
    ];
    db.insert(&db.animal).all(&mut animals).await.unwrap();

    let pairs = db
        .select_columns((db.animal.name, db.habitat.name))
        .join(db.animal.habitat_id, db.habitat.id)
        .order_by_asc(db.animal.id)
        .all()
        .await
        .unwrap();
    assert_eq!(
        pairs,
        vec![
            ("Lion".to_string(), "Savanna".to_string()),
            ("Zebra".to_string(), "Savanna".to_string()),
        ]
    );

    let homeless = db
        .select(&db.animal)
        .filter(is_null(db.animal.habitat_id))
        .all()
        .await
        .unwrap();
    assert_eq!(homeless.len(), 1);
    assert_eq!(homeless[0].name, "Stray");

    let upper = db
        .to_upper(db.animal.name)
        .filter(like(db.animal.name, "%e%"))
        .order_by_asc(db.animal.id)
        .all()
        .await
        .unwrap();
    assert_eq!(upper, vec!["ZEBRA"]);

    assert_eq!(db.count(db.animal.id).one().await.unwrap(), 3);
    assert_eq!(db.max(db.animal.id).one().await.unwrap(), Some(3.0));
    assert_eq!(
        db.sum(db.animal.habitat_id).one().await.unwrap(),
        Some(2.0)
    );
}

#[tokio::test]
async fn test_pagination() {
    let db = open().await;
    let mut animals: Vec<Animal> = (1..=5).map(|i| animal(&format!("A{i}"), None)).collect();
    db.insert(&db.animal).all(&mut animals).await.unwrap();

    let page = db
        .select(&db.animal)
        .order_by_asc(db.animal.id)
        .pagination(3, 2)
        .await
        .unwrap();
    assert_eq!(page.total_values, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.page_values, 1);
    assert!(page.has_previous);
    assert!(!page.has_next);
    assert_eq!(page.values[0].name, "A5");
}

#[tokio::test]
async fn test_one_and_find() {
    let db = open().await;
    let err = db
        .select(&db.animal)
        .filter(eq(db.animal.name, "Nobody"))
        .one()
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let mut ann = keeper("ann@zoo.test");
    db.insert(&db.staff.keeper).one(&mut ann).await.unwrap();
    let found = db
        .find(&db.staff.keeper)
        .by_value(&Keeper {
            email: "ann@zoo.test".to_string(),
            ..Keeper::default()
        })
        .await
        .unwrap();
    assert_eq!(found, ann);
    let by_key = db
        .find(&db.staff.keeper)
        .by_key(&Keeper {
            id: ann.id,
            ..Keeper::default()
        })
        .await
        .unwrap();
    assert_eq!(by_key.hired, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert!(by_key.active);
}

// =============================================================================
// Constraint violations
// =============================================================================

#[tokio::test]
async fn test_unique_violation_is_classified() {
    let db = open().await;
    db.insert(&db.staff.keeper)
        .one(&mut keeper("bob@zoo.test"))
        .await
        .unwrap();
    let err = db
        .insert(&db.staff.keeper)
        .one(&mut keeper("bob@zoo.test"))
        .await
        .unwrap_err();
    assert!(err.is_unique_value(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_failed_batch_inserts_nothing() {
    let db = open().await;
    let mut keepers = vec![
        keeper("ann@zoo.test"),
        keeper("bob@zoo.test"),
        keeper("ann@zoo.test"),
    ];
    let err = db
        .insert(&db.staff.keeper)
        .all(&mut keepers)
        .await
        .unwrap_err();
    assert!(err.is_unique_value(), "unexpected error: {err}");
    assert_eq!(db.count(db.staff.keeper.id).one().await.unwrap(), 0);

    let mut keepers = vec![keeper("ann@zoo.test"), keeper("bob@zoo.test")];
    db.insert(&db.staff.keeper)
        .all(&mut keepers)
        .await
        .unwrap();
    for stored in keepers {
        let email = db
            .select_columns(db.staff.keeper.email)
            .filter(eq(db.staff.keeper.id, stored.id))
            .one()
            .await
            .unwrap();
        assert_eq!(email, stored.email);
    }
}

#[tokio::test]
async fn test_foreign_key_violation_is_classified() {
    let db = open().await;
    let err = db
        .insert(&db.animal)
        .one(&mut animal("Ghost", Some(42)))
        .await
        .unwrap_err();
    assert!(err.is_foreign_key(), "unexpected error: {err}");
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_transaction_commit_and_rollback() {
    let db = &open().await;
    db.transaction(IsolationLevel::Default, |tx| async move {
        db.insert(&db.habitat)
            .on_transaction(&tx)
            .one(&mut habitat("Desert"))
            .await
    })
    .await
    .unwrap();

    let result = db
        .transaction(IsolationLevel::Serializable, |tx| async move {
            db.insert(&db.habitat)
                .on_transaction(&tx)
                .one(&mut habitat("Jungle"))
                .await?;
            Err::<(), _>(Error::NotFound)
        })
        .await;
    assert!(result.unwrap_err().is_not_found());

    let names = db.select_columns(db.habitat.name).all().await.unwrap();
    assert_eq!(names, vec!["Desert"]);
}

#[tokio::test]
async fn test_savepoint_keeps_outer_work() {
    let db = open().await;
    let tx = db.begin(IsolationLevel::Default).await.unwrap();
    db.insert(&db.habitat)
        .on_transaction(&tx)
        .one(&mut habitat("Tundra"))
        .await
        .unwrap();
    let nested = tx
        .nested(|inner| async move {
            inner
                .raw("INSERT INTO \"habitats\" (\"name\") VALUES (?)")
                .bind("Glacier".to_string())
                .execute()
                .await?;
            Err::<(), _>(Error::NotFound)
        })
        .await;
    assert!(nested.is_err());
    tx.commit().await.unwrap();

    let names = db.select_columns(db.habitat.name).all().await.unwrap();
    assert_eq!(names, vec!["Tundra"]);
}

// =============================================================================
// Migration
// =============================================================================

#[tokio::test]
async fn test_auto_migrate_is_additive_and_idempotent() {
    let db = connect(SqliteConfig::memory()).await;
    db.raw("CREATE TABLE \"habitats\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT)")
        .execute()
        .await
        .unwrap();
    db.migrate().auto_migrate().await.unwrap();
    db.migrate().auto_migrate().await.unwrap();

    assert_eq!(
        column_names(&db, "habitats").await,
        vec![SqlValue::Text("id".into()), SqlValue::Text("name".into())]
    );
    let indexes = db
        .raw("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'animals'")
        .fetch()
        .await
        .unwrap();
    assert!(indexes
        .iter()
        .any(|row| row[0] == SqlValue::Text("animals_idx_name".into())));
}

#[tokio::test]
async fn test_rename_and_drop() {
    let db = open().await;
    db.migrate()
        .on_table("Animal")
        .rename_column("origin", "Source")
        .await
        .unwrap();
    assert!(column_names(&db, "animals")
        .await
        .contains(&SqlValue::Text("source".into())));

    db.migrate()
        .on_table("Animal")
        .drop_column("source")
        .await
        .unwrap();
    assert!(!column_names(&db, "animals")
        .await
        .contains(&SqlValue::Text("source".into())));

    db.migrate()
        .on_schema("StaffSchema")
        .on_table("Keeper")
        .rename_table("Guard")
        .await
        .unwrap();
    let tables = db
        .raw("SELECT name FROM \"staff_schema\".sqlite_master WHERE type = 'table'")
        .fetch()
        .await
        .unwrap();
    assert!(tables.contains(&vec![SqlValue::Text("guards".into())]));

    db.migrate().on_table("Animal").drop_table().await.unwrap();
    let err = db.select(&db.animal).all().await.unwrap_err();
    assert!(matches!(err, Error::Driver(_)));
}

// =============================================================================
// Files and handles
// =============================================================================

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("zoo.db").display());

    let db = connect(SqliteConfig::new(&url).max_connections(2)).await;
    assert_eq!(db.stats().max_open, 2);
    db.migrate().auto_migrate().await.unwrap();
    db.insert(&db.habitat)
        .one(&mut habitat("Wetland"))
        .await
        .unwrap();
    db.insert(&db.staff.keeper)
        .one(&mut keeper("cy@zoo.test"))
        .await
        .unwrap();
    db.close().await.unwrap();
    assert!(dir.path().join("staff_schema.db").exists());

    let db = connect(SqliteConfig::new(&url)).await;
    let names = db.select_columns(db.habitat.name).all().await.unwrap();
    assert_eq!(names, vec!["Wetland"]);
    let emails = db
        .select_columns(db.staff.keeper.email)
        .all()
        .await
        .unwrap();
    assert_eq!(emails, vec!["cy@zoo.test"]);
}

#[tokio::test]
async fn test_memory_database_uses_one_connection() {
    let db = open().await;
    let stats = db.stats();
    assert_eq!(stats.max_open, 1);
    assert!(stats.open <= 1);
    assert_eq!(db.name(), "SQLite");
}
