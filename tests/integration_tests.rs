//! Integration tests for the record store
//!
//! These tests run against file-backed SQLite databases in temporary
//! directories and cover:
//! - Table creation and schema widening
//! - Record operations and their edge cases
//! - Concurrent writers racing on the same schema change
//! - Transaction rollback on failure

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use chrono::NaiveDate;
    use schemaless_sql::prelude::*;
    use schemaless_sql::ColumnType;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn url(dir: &TempDir) -> String {
        format!("sqlite:///{}", dir.path().join("test.db").display())
    }

    async fn open(dir: &TempDir) -> Database {
        Database::open(&url(dir), ConnectOptions::default())
            .await
            .expect("Failed to open database")
    }

    async fn users(dir: &TempDir) -> (Database, Arc<Table>) {
        let db = open(dir).await;
        let table = db.table("users").await.expect("Failed to open table");
        (db, table)
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (db, table) = users(&dir).await;

        let first = table.ensure().await.unwrap();
        let second = table.ensure().await.unwrap();
        assert_eq!(first.columns, second.columns);
        assert_eq!(db.table_names().await.unwrap(), vec!["users".to_string()]);

        // A separate handle on the same file sees the table and leaves it alone.
        let other = open(&dir).await;
        let third = other.table("users").await.unwrap().ensure().await.unwrap();
        assert_eq!(first.columns, third.columns);
    }

    #[tokio::test]
    async fn test_schema_is_union_of_inserted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        table.insert(&record! { "a" => 1 }).await.unwrap();
        assert_eq!(table.columns(), vec!["id", "a"]);

        table.insert(&record! { "b" => "x" }).await.unwrap();
        table.insert(&record! { "a" => 2, "c" => 1.5 }).await.unwrap();
        assert_eq!(table.columns(), vec!["id", "a", "b", "c"]);

        // Records without a field read it back as null.
        let rows = table.find(&Query::new().order_by("id")).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["b"], Value::Null);
        assert_eq!(rows[1]["b"], Value::from("x"));
        assert_eq!(rows[2]["c"], Value::Float(1.5));
    }

    #[tokio::test]
    async fn test_integer_boundary_in_fresh_field() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        table.insert(&record! { "n" => 2_147_483_647i64 }).await.unwrap();
        table.insert(&record! { "n" => 2_147_483_648i64 }).await.unwrap();

        let view = table.schema().view();
        assert_eq!(view.column("n").unwrap().column_type, ColumnType::Integer);

        let values: Vec<i64> = table
            .find(&Query::new().order_by("id"))
            .await
            .unwrap()
            .iter()
            .filter_map(|row| row["n"].as_int())
            .collect();
        assert_eq!(values, vec![2_147_483_647, 2_147_483_648]);
    }

    #[tokio::test]
    async fn test_insert_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        let id = table
            .insert(&record! { "name" => "a", "age" => 3 })
            .await
            .unwrap();
        assert_eq!(id, Some(Value::Int(1)));

        let row = table
            .find_one(&Query::new().where_eq("name", "a"))
            .await
            .unwrap()
            .expect("row not found");
        assert_eq!(row, record! { "id" => 1, "name" => "a", "age" => 3 });
    }

    #[tokio::test]
    async fn test_insert_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let (db, table) = users(&dir).await;

        assert_eq!(table.insert(&Record::new()).await.unwrap(), None);
        assert!(!db.has_table("users").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_without_widening_drops_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table.insert(&record! { "name" => "a" }).await.unwrap();

        let id = table
            .insert_with(&record! { "name" => "b", "extra" => 1 }, false)
            .await
            .unwrap();
        assert_eq!(id, Some(Value::Int(2)));
        assert_eq!(table.columns(), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_typed_values_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        let born = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
        let seen = born.and_hms_micro_opt(8, 30, 0, 250).unwrap();
        let record = record! {
            "active" => true,
            "born" => born,
            "seen" => seen,
            "prefs" => serde_json::json!({"theme": "dark", "tags": [1, 2]}),
            "avatar" => vec![0u8, 159, 255],
            "score" => 9.25,
            "price" => Value::decimal("12.500000"),
            "total" => Value::decimal("100.000000"),
            "balance" => Value::decimal("12345678901234.123456"),
        };
        table.insert(&record).await.unwrap();

        let row = table.find_one(&Query::new()).await.unwrap().unwrap();
        for (field, value) in &record {
            assert_eq!(&row[field.as_str()], value, "field {}", field);
        }
    }

    #[tokio::test]
    async fn test_insert_many() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        assert_eq!(table.insert_many(&[]).await.unwrap(), 0);

        let rows = vec![
            record! { "name" => "a", "note" => Value::Null },
            record! { "name" => "b", "age" => 30 },
            record! { "name" => "c", "age" => Value::Null },
        ];
        assert_eq!(table.insert_many(&rows).await.unwrap(), 3);
        assert_eq!(table.count(&Query::new()).await.unwrap(), 3);

        let view = table.schema().view();
        assert_eq!(view.column("age").unwrap().column_type, ColumnType::Integer);
        assert_eq!(view.column("note").unwrap().column_type, ColumnType::Text);
    }

    #[tokio::test]
    async fn test_insert_many_skips_rows_without_known_fields() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table.insert(&record! { "name" => "a" }).await.unwrap();

        let rows = vec![record! { "name" => "b" }, record! { "other" => 1 }];
        assert_eq!(table.insert_many_with(&rows, false).await.unwrap(), 1);
        assert_eq!(table.count(&Query::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let codes = db
            .create_table("codes", PrimaryKey::new("code", PrimaryKeyType::String, false))
            .await
            .unwrap();

        let rows = vec![
            record! { "code" => "a", "label" => "first" },
            record! { "code" => "a", "label" => "duplicate" },
        ];
        assert!(codes.insert_many(&rows).await.is_err());
        assert_eq!(codes.count(&Query::new()).await.unwrap(), 0);

        // The connection that failed is usable again.
        assert_eq!(codes.insert_many(&rows[..1]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_integer_key_without_autoincrement() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let items = db
            .create_table("items", PrimaryKey::new("id", PrimaryKeyType::Integer, false))
            .await
            .unwrap();

        let view = items.schema().view();
        assert_eq!(view.primary_key.as_deref(), Some("id"));
        assert!(!view.autoincrement);
        assert_eq!(view.column("id").unwrap().column_type, ColumnType::Integer);

        let id = items
            .insert(&record! { "id" => 7, "name" => "seven" })
            .await
            .unwrap();
        assert_eq!(id, None);

        // The caller owns the key: omitting it is rejected instead of generated.
        assert!(items.insert(&record! { "name" => "no key" }).await.is_err());
        assert_eq!(items.count(&Query::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        assert!(table
            .upsert(&record! { "email" => "a@x", "name" => "first" }, &["email"])
            .await
            .unwrap());
        assert!(table
            .upsert(&record! { "email" => "a@x", "name" => "second" }, &["email"])
            .await
            .unwrap());

        let rows = table.all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("second"));
    }

    #[tokio::test]
    async fn test_upsert_edge_cases() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        assert!(!table.upsert(&Record::new(), &["id"]).await.unwrap());
        assert!(!table.upsert(&record! { "name" => "a" }, &[]).await.unwrap());
        assert!(!table.exists());

        // No key field in the record: plain insert.
        assert!(table.upsert(&record! { "name" => "a" }, &["email"]).await.unwrap());
        assert!(table.upsert(&record! { "name" => "a" }, &["email"]).await.unwrap());
        assert_eq!(table.count(&Query::new()).await.unwrap(), 2);

        // Only key fields: the existing row is left as is.
        assert!(table.upsert(&record! { "name" => "a" }, &["name"]).await.unwrap());
        assert_eq!(table.count(&Query::new()).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_on_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table.insert(&record! { "email" => "seed", "hits" => 0 }).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    table
                        .upsert(&record! { "email" => "shared", "hits" => i }, &["email"])
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.expect("Task panicked").expect("Upsert failed"));
        }

        let shared = table
            .count(&Query::new().where_eq("email", "shared"))
            .await
            .unwrap();
        assert_eq!(shared, 1);
    }

    #[tokio::test]
    async fn test_update() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;

        // Absent table.
        assert_eq!(
            table.update(&record! { "id" => 1, "name" => "x" }, &["id"]).await.unwrap(),
            0
        );

        table
            .insert_many(&[
                record! { "name" => "a", "team" => "red" },
                record! { "name" => "b", "team" => "red" },
                record! { "name" => "c", "team" => "blue" },
            ])
            .await
            .unwrap();

        let n = table
            .update(&record! { "team" => "red", "score" => 10 }, &["team"])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            table.count(&Query::new().where_eq("score", 10)).await.unwrap(),
            2
        );

        // No usable key, nothing to set, or empty input: nothing happens.
        assert_eq!(table.update(&record! { "score" => 1 }, &["missing"]).await.unwrap(), 0);
        assert_eq!(table.update(&record! { "team" => "red" }, &["team"]).await.unwrap(), 0);
        assert_eq!(table.update(&record! { "team" => "red" }, &[]).await.unwrap(), 0);
        assert_eq!(table.update(&Record::new(), &["team"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        assert_eq!(table.delete(&Record::new()).await.unwrap(), 0);

        table
            .insert_many(&[
                record! { "name" => "a", "age" => 1 },
                record! { "name" => "b", "age" => 2 },
                record! { "name" => "c", "age" => 2 },
            ])
            .await
            .unwrap();

        assert_eq!(table.delete(&record! { "age" => 2 }).await.unwrap(), 2);
        assert_eq!(table.count(&Query::new()).await.unwrap(), 1);
        assert_eq!(table.delete(&Record::new()).await.unwrap(), 1);
        assert_eq!(table.count(&Query::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_filter_field_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table
            .insert_many(&[record! { "name" => "a" }, record! { "name" => "b" }])
            .await
            .unwrap();

        let rows = table
            .find(&Query::new().where_eq("nonexistent", 1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = table
            .find(&Query::new().where_eq("nonexistent", 1).where_eq("name", "b"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("b"));
    }

    #[tokio::test]
    async fn test_order_descending_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        let rows: Vec<Record> = [31, 45, 12, 45, 28]
            .iter()
            .enumerate()
            .map(|(i, age)| record! { "name" => format!("u{}", i), "age" => *age })
            .collect();
        table.insert_many(&rows).await.unwrap();

        let top = table
            .find(&Query::new().order_by("-age").order_by("name").limit(2))
            .await
            .unwrap();
        let picked: Vec<(String, i64)> = top
            .iter()
            .map(|r| (r["name"].as_string(), r["age"].as_int().unwrap()))
            .collect();
        assert_eq!(picked, vec![("u1".to_string(), 45), ("u3".to_string(), 45)]);

        let page = table
            .find(&Query::new().order_by("age").limit(2).offset(1))
            .await
            .unwrap();
        let ages: Vec<i64> = page.iter().filter_map(|r| r["age"].as_int()).collect();
        assert_eq!(ages, vec![28, 31]);

        let tail = table.find(&Query::new().order_by("age").offset(4)).await.unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[tokio::test]
    async fn test_null_filter_matches_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table
            .insert_many(&[
                record! { "name" => "a", "email" => "a@x" },
                record! { "name" => "b" },
            ])
            .await
            .unwrap();

        let rows = table
            .find(&Query::new().where_eq("email", Value::Null))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("b"));
    }

    #[tokio::test]
    async fn test_reads_on_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let (db, table) = users(&dir).await;

        assert!(table.all().await.unwrap().is_empty());
        assert!(table.find_one(&Query::new()).await.unwrap().is_none());
        assert_eq!(table.count(&Query::new()).await.unwrap(), 0);
        assert!(table.distinct("name", &Query::new()).await.unwrap().is_empty());
        assert_eq!(table.create_table_sql().await.unwrap(), None);
        assert!(!db.has_table("users").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_and_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table
            .insert_many(&[
                record! { "team" => "red", "active" => true },
                record! { "team" => "blue", "active" => false },
                record! { "team" => "red", "active" => true },
            ])
            .await
            .unwrap();

        assert_eq!(table.count(&Query::new()).await.unwrap(), 3);
        assert_eq!(
            table.count(&Query::new().where_eq("team", "red")).await.unwrap(),
            2
        );

        let mut teams = table.distinct("team", &Query::new()).await.unwrap();
        teams.sort_by_key(Value::as_string);
        assert_eq!(teams, vec![Value::from("blue"), Value::from("red")]);

        let active = table
            .distinct("active", &Query::new().where_eq("team", "red"))
            .await
            .unwrap();
        assert_eq!(active, vec![Value::Bool(true)]);

        assert!(table.distinct("unknown", &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reads_see_columns_added_by_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table.insert(&record! { "name" => "a" }).await.unwrap();

        // A second handle, as another process would, widens the table.
        let other = open(&dir).await;
        let other_users = other.table("users").await.unwrap();
        other_users
            .insert(&record! { "name" => "b", "city" => "Oslo" })
            .await
            .unwrap();

        let rows = table
            .find(&Query::new().where_eq("city", "Oslo"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("b"));
        assert!(table.columns().contains(&"city".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_add_one_column() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table.insert(&record! { "name" => "seed" }).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    table
                        .insert(&record! { "name" => format!("w{}", i), "color" => "blue" })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("Task panicked").expect("Insert failed");
        }

        let columns = table.columns();
        assert_eq!(columns.iter().filter(|c| *c == "color").count(), 1);
        assert_eq!(
            table.count(&Query::new().where_eq("color", "blue")).await.unwrap(),
            8
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_separate_handles_race_on_new_column() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, seed) = users(&dir).await;
        seed.insert(&record! { "name" => "seed" }).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..4 {
            // Each handle has its own pool and schema cache.
            let db = open(&dir).await;
            tasks.push(tokio::spawn(async move {
                let table = db.table("users").await?;
                table
                    .insert(&record! { "name" => format!("p{}", i), "color" => "red" })
                    .await
            }));
        }
        for task in tasks {
            task.await.expect("Task panicked").expect("Insert failed");
        }

        let view = seed.schema().refresh().await.unwrap();
        assert_eq!(view.column_names().filter(|c| *c == "color").count(), 1);
        assert_eq!(seed.count(&Query::new()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_create_table_sql() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, table) = users(&dir).await;
        table
            .insert(&record! { "name" => "a", "age" => 3, "active" => true })
            .await
            .unwrap();

        let sql = table.create_table_sql().await.unwrap().unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \"name\" VARCHAR(255), \
             \"age\" INTEGER, \"active\" BOOLEAN)"
        );
    }

    #[tokio::test]
    async fn test_get_table_shares_handles() {
        let dir = tempfile::tempdir().unwrap();
        let url = url(&dir);

        let a = get_table(&url, "users").await.unwrap();
        let b = get_table(&url, "users").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        a.insert(&record! { "name" => "a" }).await.unwrap();
        assert_eq!(b.count(&Query::new()).await.unwrap(), 1);
        assert!(close(&url));
    }

    #[tokio::test]
    async fn test_quoted_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir).await;
        let table = db.table("order").await.unwrap();

        table
            .insert(&record! { "select" => 1, "we\"ird key" => "v", "group by" => true })
            .await
            .unwrap();
        let row = table
            .find_one(&Query::new().where_eq("select", 1).order_by("-group by"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["we\"ird key"], Value::from("v"));
        assert_eq!(row["group by"], Value::Bool(true));
    }
}

#[cfg(feature = "postgres")]
mod postgres_tests {
    use schemaless_sql::prelude::*;

    async fn open() -> Database {
        let url = std::env::var("POSTGRES_URL").expect("POSTGRES_URL not set");
        Database::open(&url, ConnectOptions::default())
            .await
            .expect("Failed to connect")
    }

    #[tokio::test]
    #[ignore] // Requires a PostgreSQL server; set POSTGRES_URL
    async fn test_postgres_record_operations() {
        let db = open().await;
        db.drop_table("ssql_it_users").await.unwrap();
        let table = db.table("ssql_it_users").await.unwrap();

        let id = table
            .insert(&record! { "name" => "a", "age" => 3 })
            .await
            .unwrap();
        assert_eq!(id, Some(Value::Int(1)));

        table
            .upsert(&record! { "name" => "a", "age" => 4 }, &["name"])
            .await
            .unwrap();
        table
            .insert(&record! { "name" => "b", "age" => 9, "tags" => serde_json::json!(["x"]) })
            .await
            .unwrap();

        let top = table
            .find(&Query::new().order_by("-age").limit(1))
            .await
            .unwrap();
        assert_eq!(top[0]["name"], Value::from("b"));
        assert_eq!(top[0]["tags"], Value::Json(serde_json::json!(["x"])));
        assert_eq!(table.count(&Query::new()).await.unwrap(), 2);

        db.drop_table("ssql_it_users").await.unwrap();
    }
}
