mod support;

use std::time::Duration;

use pgtable::{
    Column, ConfigError, Error, Fields, Filter, Lenient, Order, Page, RetryPolicy, SqlType, Table,
    Value, Where,
};
use support::{CallKind, ScriptedProvider, row};

fn users(provider: &ScriptedProvider) -> Table<ScriptedProvider> {
    Table::builder("users")
        .column("id", Column::new(SqlType::Serial).primary_key())
        .column("name", Column::new(SqlType::Text).not_null())
        .column("email", Column::with_length(SqlType::Varchar, 255).unwrap().unique())
        .column("age", Column::new(SqlType::Integer))
        .cache_key("id")
        .build(provider.clone())
        .unwrap()
}

fn alice() -> pgtable::Row {
    row(&[
        ("id", Value::I32(1)),
        ("name", Value::from("alice")),
        ("email", Value::from("alice@example.com")),
        ("age", Value::I32(30)),
    ])
}

#[test]
fn test_builder_rejects_bad_configuration() {
    let provider = ScriptedProvider::new();
    let base = || Table::builder("users").column("id", Column::new(SqlType::Serial));

    assert_eq!(
        base().cache(true).build(provider.clone()).unwrap_err(),
        ConfigError::MissingCacheKey
    );
    assert_eq!(
        base().cache_key("nope").build(provider.clone()).unwrap_err(),
        ConfigError::UnknownCacheKey {
            name: "nope".into()
        }
    );
    assert_eq!(
        base()
            .cache_key("id")
            .cache_ttl(Duration::ZERO)
            .build(provider.clone())
            .unwrap_err(),
        ConfigError::ZeroTtl
    );
    assert_eq!(
        base()
            .cache_key("id")
            .cache_max_size(0)
            .build(provider.clone())
            .unwrap_err(),
        ConfigError::ZeroCacheSize
    );
    assert_eq!(
        base()
            .column("id", Column::new(SqlType::Text))
            .build(provider.clone())
            .unwrap_err(),
        ConfigError::DuplicateColumn { name: "id".into() }
    );
    assert_eq!(
        Table::builder("users").build(provider.clone()).unwrap_err(),
        ConfigError::NoColumns {
            table: "users".into()
        }
    );
    assert!(matches!(
        Table::builder("users; --")
            .column("id", Column::new(SqlType::Serial))
            .build(provider.clone()),
        Err(ConfigError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        base()
            .column("Full Name", Column::new(SqlType::Text))
            .build(provider.clone()),
        Err(ConfigError::InvalidIdentifier(_))
    ));
}

#[test]
fn test_cache_disabled_without_key() {
    let provider = ScriptedProvider::new();
    let table = Table::builder("logs")
        .column("line", Column::new(SqlType::Text))
        .build(provider)
        .unwrap();
    assert!(!table.cache_enabled());
    assert!(matches!(
        table.clear_cache(),
        Err(Error::Config(ConfigError::CacheDisabled { .. }))
    ));
}

#[tokio::test]
async fn test_insert_renders_known_columns() {
    support::init_tracing();
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);

    let fields = Fields::new()
        .set("name", "alice")
        .set("nickname", "ali")
        .set("email", "alice@example.com");
    let inserted = table.insert(&fields).await.unwrap();
    assert_eq!(inserted, Some(alice()));

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, CallKind::One);
    insta::assert_snapshot!(
        calls[0].sql,
        @"INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *"
    );
    assert_eq!(
        calls[0].params,
        vec![Value::from("alice"), Value::from("alice@example.com")]
    );
}

#[tokio::test]
async fn test_insert_without_known_columns() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let err = table
        .insert(&Fields::new().set("nickname", "ali"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_get_after_insert_is_served_from_cache() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);

    table
        .insert(&Fields::new().set("name", "alice"))
        .await
        .unwrap();
    let cached = table.get(&Where::new().eq("id", 1)).await.unwrap();

    assert_eq!(cached, Some(alice()));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_cache_key_values_compare_textually() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    table.insert(&Fields::new().set("name", "alice")).await.unwrap();

    // The row holds an INT4, the lookup uses an INT8.
    let cached = table.get(&Where::new().eq("id", 1i64)).await.unwrap();
    assert_eq!(cached, Some(alice()));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_delete_invalidates_cache() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    provider.rows(vec![alice()]);

    table.insert(&Fields::new().set("name", "alice")).await.unwrap();
    let deleted = table.delete(&Where::new().eq("id", 1)).await.unwrap();
    assert_eq!(deleted, vec![alice()]);

    let after = table.get(&Where::new().eq("id", 1)).await.unwrap();
    assert_eq!(after, None);

    let sql = provider.sql();
    assert_eq!(sql.len(), 3);
    insta::assert_snapshot!(sql[1], @"DELETE FROM users WHERE id = $1 RETURNING *");
    insta::assert_snapshot!(sql[2], @"SELECT * FROM users WHERE id = $1 LIMIT 1");
}

#[tokio::test]
async fn test_delete_requires_conditions() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let err = table.delete(&Where::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_update_numbers_set_before_where() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let mut updated = alice();
    updated.insert("name", "alicia");
    provider.rows(vec![updated.clone()]);

    let rows = table
        .update(
            &Where::new().eq("id", 1).filter("age", Filter::between(18, 65)),
            &Fields::new().set("name", "alicia").set("age", 31),
        )
        .await
        .unwrap();
    assert_eq!(rows, vec![updated.clone()]);

    let calls = provider.calls();
    insta::assert_snapshot!(
        calls[0].sql,
        @"UPDATE users SET name = $1, age = $2 WHERE id = $3 AND age BETWEEN $4 AND $5 RETURNING *"
    );
    assert_eq!(
        calls[0].params,
        vec![
            Value::from("alicia"),
            Value::I32(31),
            Value::I32(1),
            Value::I32(18),
            Value::I32(65),
        ]
    );

    // The returned row refreshed the cache.
    let cached = table.get(&Where::new().eq("id", 1)).await.unwrap();
    assert_eq!(cached, Some(updated));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_update_changing_key_drops_old_entry() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let before = row(&[("id", Value::I32(1)), ("email", Value::from("a"))]);
    let after = row(&[("id", Value::I32(2)), ("email", Value::from("a"))]);
    provider.rows(vec![before]);
    provider.rows(vec![after.clone()]);

    table.insert(&Fields::new().set("email", "a")).await.unwrap();
    table
        .update(&Where::new().eq("email", "a"), &Fields::new().set("id", 2))
        .await
        .unwrap();

    assert_eq!(table.get(&Where::new().eq("id", 1)).await.unwrap(), None);
    assert_eq!(provider.call_count(), 3);

    assert_eq!(table.get(&Where::new().eq("id", 2)).await.unwrap(), Some(after));
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_update_keeps_unrelated_entries() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    provider.rows(vec![]);

    table.insert(&Fields::new().set("name", "alice")).await.unwrap();
    table
        .update(&Where::new().eq("email", "bob@example.com"), &Fields::new().set("age", 40))
        .await
        .unwrap();

    assert_eq!(table.get(&Where::new().eq("id", 1)).await.unwrap(), Some(alice()));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_update_without_known_fields() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let err = table
        .update(&Where::new().eq("id", 1), &Fields::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_filters_bypass_cache() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    table.insert(&Fields::new().set("name", "alice")).await.unwrap();

    table
        .get(&Where::new().filter("id", Filter::any_of([1, 2])))
        .await
        .unwrap();
    assert_eq!(provider.call_count(), 2);
    insta::assert_snapshot!(provider.sql()[1], @"SELECT * FROM users WHERE id = ANY($1) LIMIT 1");
}

#[tokio::test]
async fn test_cached_row_must_satisfy_every_condition() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    table.insert(&Fields::new().set("name", "alice")).await.unwrap();

    let hit = table
        .get(&Where::new().eq("id", 1).eq("name", "alice"))
        .await
        .unwrap();
    assert_eq!(hit, Some(alice()));
    assert_eq!(provider.call_count(), 1);

    let miss = table
        .get(&Where::new().eq("id", 1).eq("name", "bob"))
        .await
        .unwrap();
    assert_eq!(miss, None);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_rows_expire() {
    let provider = ScriptedProvider::new();
    let table = Table::builder("users")
        .column("id", Column::new(SqlType::Serial).primary_key())
        .column("name", Column::new(SqlType::Text))
        .cache_key("id")
        .cache_ttl(Duration::from_secs(30))
        .build(provider.clone())
        .unwrap();
    let row = row(&[("id", Value::I32(7)), ("name", Value::from("x"))]);
    provider.rows(vec![row.clone()]);
    table.insert(&Fields::new().set("name", "x")).await.unwrap();

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(table.get(&Where::new().eq("id", 7)).await.unwrap(), Some(row));
    assert_eq!(provider.call_count(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(table.get(&Where::new().eq("id", 7)).await.unwrap(), None);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_select_projection() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![row(&[("id", Value::I32(1)), ("name", Value::from("alice"))])]);

    let rows = table
        .select(&["id", "name"], &Where::new().eq("id", 1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    insta::assert_snapshot!(provider.sql()[0], @"SELECT id, name FROM users WHERE id = $1");

    // Partial rows are not cached.
    table.get(&Where::new().eq("id", 1)).await.unwrap();
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_select_projects_cached_rows() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    table.gets(&Where::new().eq("id", 1)).await.unwrap();

    let rows = table
        .select(&["email"], &Where::new().eq("id", 1))
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![row(&[("email", Value::from("alice@example.com"))])]
    );
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_select_rejects_bad_projection() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let err = table
        .select(&["id, (SELECT 1)"], &Where::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_get_page() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);

    table
        .get_page(
            &Page::new(3, 20).order_by("age", Order::Desc),
            &Where::new().eq("name", "alice"),
        )
        .await
        .unwrap();
    table.get_page(&Page::default(), &Where::new()).await.unwrap();

    let sql = provider.sql();
    insta::assert_snapshot!(
        sql[0],
        @"SELECT * FROM users WHERE name = $1 ORDER BY age DESC LIMIT 20 OFFSET 40"
    );
    insta::assert_snapshot!(sql[1], @"SELECT * FROM users WHERE 1=1 LIMIT 10 OFFSET 0");
}

#[tokio::test]
async fn test_get_page_validates() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let bad_order = Page::default().order_by("age DESC; DROP TABLE users", Order::Asc);
    assert!(matches!(
        table.get_page(&bad_order, &Where::new()).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        table.get_page(&Page::new(0, 10), &Where::new()).await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_search_shifts_where_placeholders() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);

    table
        .search(
            &["name", "email"],
            "john",
            &Page::new(2, 10),
            &Where::new()
                .eq("name", "active")
                .filter("age", Filter::between(18, 30)),
        )
        .await
        .unwrap();

    let calls = provider.calls();
    insta::assert_snapshot!(
        calls[0].sql,
        @"SELECT * FROM users WHERE (name::text ILIKE $1 OR email::text ILIKE $1) AND (name = $2 AND age BETWEEN $3 AND $4) ORDER BY id ASC LIMIT 10 OFFSET 10"
    );
    assert_eq!(
        calls[0].params,
        vec![
            Value::from("%john%"),
            Value::from("active"),
            Value::I32(18),
            Value::I32(30),
        ]
    );
}

#[tokio::test]
async fn test_search_requires_columns() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    let err = table
        .search(&[], "x", &Page::default(), &Where::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    let err = table.count_search(&[], "x", &Where::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_counts_and_exists() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.scalar(Value::I64(12));
    provider.scalar(Value::I64(3));
    provider.scalar(true);

    assert_eq!(
        table
            .count(&Where::new().filter("age", Filter::between(18, 30)))
            .await
            .unwrap(),
        12
    );
    assert_eq!(
        table
            .count_search(&["name"], "al", &Where::new())
            .await
            .unwrap(),
        3
    );
    assert!(table.exists(&Where::new().eq("email", "a@b.c")).await.unwrap());

    let sql = provider.sql();
    insta::assert_snapshot!(sql[0], @"SELECT COUNT(*) FROM users WHERE age BETWEEN $1 AND $2");
    insta::assert_snapshot!(sql[1], @"SELECT COUNT(*) FROM users WHERE name::text ILIKE $1");
    insta::assert_snapshot!(sql[2], @"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)");
}

#[tokio::test]
async fn test_query_passes_through() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![row(&[("n", Value::I64(1))])]);

    let rows = table
        .query("SELECT count(*) AS n FROM users WHERE age > $1", &[Value::I32(3)])
        .await
        .unwrap();
    assert_eq!(rows[0]["n"], Value::I64(1));
    assert_eq!(
        provider.sql(),
        ["SELECT count(*) AS n FROM users WHERE age > $1"]
    );
}

#[tokio::test]
async fn test_drop_and_truncate_clear_cache() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.rows(vec![alice()]);
    table.insert(&Fields::new().set("name", "alice")).await.unwrap();

    table.truncate().await.unwrap();
    table.get(&Where::new().eq("id", 1)).await.unwrap();
    table.drop().await.unwrap();

    let calls = provider.calls();
    assert_eq!(calls[1].kind, CallKind::Execute);
    insta::assert_snapshot!(calls[1].sql, @"TRUNCATE TABLE users");
    assert_eq!(calls[2].kind, CallKind::One);
    insta::assert_snapshot!(calls[3].sql, @"DROP TABLE IF EXISTS users");
}

#[tokio::test]
async fn test_database_errors_surface_and_can_be_swallowed() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.fail("relation \"users\" does not exist");
    provider.fail("relation \"users\" does not exist");

    let err = table.get_all().await.unwrap_err();
    assert!(matches!(err, Error::Database { .. }));

    let rows = table.get_all().await.lenient("get_all");
    assert_eq!(rows, None);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_busy_connection() {
    let provider = ScriptedProvider::new();
    let table = users(&provider);
    provider.busy_for(3);

    table.get_all().await.unwrap();
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_on_busy_connection() {
    let provider = ScriptedProvider::new();
    let table = Table::builder("users")
        .column("id", Column::new(SqlType::Serial))
        .retry(RetryPolicy {
            attempts: 2,
            backoff: Duration::from_millis(100),
        })
        .build(provider.clone())
        .unwrap();
    provider.busy_for(u32::MAX);

    let err = table.get_all().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionBusy { attempts: 2 }));
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_column_edits() {
    let provider = ScriptedProvider::new();
    let mut table = users(&provider);

    table
        .set_column("age", Column::new(SqlType::SmallInt))
        .unwrap();
    assert_eq!(table.column("age").unwrap().sql_type(), SqlType::SmallInt);

    table.set_column("bio", Column::new(SqlType::Text)).unwrap();
    let names: Vec<&str> = table.columns().map(|c| c.name()).collect();
    assert_eq!(names, ["id", "name", "email", "age", "bio"]);

    table.remove_column("bio").unwrap();
    assert!(table.column("bio").is_none());
    assert!(matches!(
        table.remove_column("bio"),
        Err(Error::Config(ConfigError::UnknownColumn { .. }))
    ));
    assert!(matches!(
        table.remove_column("id"),
        Err(Error::Config(ConfigError::CacheKeyColumn { .. }))
    ));
}
