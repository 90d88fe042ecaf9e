//! SurrealDB adapter tests against the in-memory engine
//!
//! Every test connects to its own `mem://` instance, so state never leaks
//! between tests.

#![cfg(feature = "surrealdb")]

use serde::{Deserialize, Serialize};

use dockside::entity::{Entity, FieldDef, Relation, Schema};
use dockside::prelude::*;
use dockside::surreal::{self, SurrealClient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Owner {
    id: String,
    name: String,
}

impl Schema for Owner {
    const TABLE: &'static str = "owners";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[FieldDef::column("id"), FieldDef::indexed("name")];
        FIELDS
    }
}

impl Entity for Owner {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Category {
    id: String,
    name: String,
    owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<Owner>,
}

impl Schema for Category {
    const TABLE: &'static str = "categories";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::column("id"),
            FieldDef::unique("name"),
            FieldDef::column("owner_id"),
            FieldDef::has_one("owner", "owners", "owner_id", Owner::fields),
        ];
        FIELDS
    }
}

impl Entity for Category {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Todo {
    id: String,
    title: String,
    is_completed: bool,
    category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Schema for Todo {
    const TABLE: &'static str = "todos";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::column("id"),
            FieldDef::indexed("title"),
            FieldDef::column("is_completed"),
            FieldDef::column("category_id"),
            FieldDef::has_one("category", "categories", "category_id", Category::fields),
            FieldDef::column("deleted_at"),
        ];
        FIELDS
    }

    fn soft_delete_field() -> Option<&'static str> {
        Some("deleted_at")
    }
}

impl Entity for Todo {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

fn todo(id: &str, title: &str, completed: bool, category_id: Option<&str>) -> Todo {
    Todo {
        id: id.to_string(),
        title: title.to_string(),
        is_completed: completed,
        category_id: category_id.map(str::to_string),
        category: None,
        deleted_at: None,
    }
}

async fn client() -> SurrealClient {
    let config = SurrealDbConfig {
        url: "mem://".to_string(),
        namespace: "test".to_string(),
        database: "test".to_string(),
        username: None,
        password: None,
        max_retries: 0,
        retry_delay_secs: 1,
    };
    surreal::connect(&config).await.expect("in-memory connect")
}

async fn seed_todos(client: &SurrealClient, todos: Vec<Todo>) {
    let commands = SurrealCommandRepository::<Todo>::new(client.clone());
    let count = todos.len() as u64;
    commands.add_range(todos).await.expect("stage");
    let affected = commands.save().await.expect("save");
    assert_eq!(affected, count);
}

async fn seed_categories(client: &SurrealClient, categories: Vec<Category>) {
    let commands = SurrealCommandRepository::<Category>::new(client.clone());
    commands.add_range(categories).await.expect("stage");
    commands.save().await.expect("save");
}

#[tokio::test]
async fn add_save_and_read_back() {
    let client = client().await;
    seed_todos(&client, vec![todo("t1", "write docs", false, None)]).await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let found = queries
        .get_by_id(&"t1".to_string(), QueryOptions::default())
        .await
        .expect("query")
        .expect("present");
    assert_eq!(found.title, "write docs");
    assert!(!found.is_completed);

    let missing = queries
        .get_by_id(&"nope".to_string(), QueryOptions::default())
        .await
        .expect("query");
    assert!(missing.is_none());
}

#[tokio::test]
async fn get_by_ids_returns_only_present_entities() {
    let client = client().await;
    seed_todos(
        &client,
        vec![todo("t1", "a", false, None), todo("t2", "b", false, None)],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let found = queries
        .get_by_ids(
            &["t1".to_string(), "missing".to_string(), "t2".to_string()],
            QueryOptions::default(),
        )
        .await
        .expect("query");
    assert_eq!(found.len(), 2);

    let none = queries
        .get_by_ids(&[], QueryOptions::default())
        .await
        .expect("query");
    assert!(none.is_empty());
}

#[tokio::test]
async fn paging_windows_an_ordered_set() {
    let client = client().await;
    let todos = (1..=12)
        .map(|n| todo(&format!("t{n:02}"), &format!("task {n:02}"), false, None))
        .collect();
    seed_todos(&client, todos).await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let page = queries
        .get_all(
            QueryBuilder::new()
                .order_by_path("title", false)
                .into_options(),
            Some(PageRequest::new(2, 5)),
        )
        .await
        .expect("query");

    let titles: Vec<&str> = page.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(
        titles,
        ["task 06", "task 07", "task 08", "task 09", "task 10"]
    );
}

#[tokio::test]
async fn filters_narrow_the_result() {
    let client = client().await;
    seed_todos(
        &client,
        vec![
            todo("t1", "open", false, None),
            todo("t2", "done", true, None),
            todo("t3", "also open", false, None),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let open = queries
        .get_all(
            QueryBuilder::new()
                .filter(FilterCondition::eq("is_completed", false))
                .order_by_path("id", false)
                .into_options(),
            None,
        )
        .await
        .expect("query");
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].id, "t1");
}

#[tokio::test]
async fn includes_populate_navigations() {
    let client = client().await;
    seed_categories(
        &client,
        vec![Category {
            id: "c1".into(),
            name: "Work".into(),
            owner_id: None,
            owner: None,
        }],
    )
    .await;
    seed_todos(&client, vec![todo("t1", "with category", false, Some("c1"))]).await;

    let queries = SurrealQueryRepository::<Todo>::new(client);

    let bare = queries
        .get_by_id(&"t1".to_string(), QueryOptions::default())
        .await
        .expect("query")
        .expect("present");
    assert!(bare.category.is_none());

    let included = queries
        .get_by_id(
            &"t1".to_string(),
            QueryBuilder::new()
                .include(Relation::<Todo, Category>::new("category"))
                .into_options(),
        )
        .await
        .expect("query")
        .expect("present");
    let category = included.category.expect("category loaded");
    assert_eq!(category.name, "Work");
    assert_eq!(category.id, "c1");
}

#[tokio::test]
async fn nested_includes_load_the_whole_chain() {
    let client = client().await;
    {
        let owners = SurrealCommandRepository::<Owner>::new(client.clone());
        owners
            .add(Owner {
                id: "o1".into(),
                name: "Ada".into(),
            })
            .await
            .expect("stage");
        owners.save().await.expect("save");
    }
    seed_categories(
        &client,
        vec![Category {
            id: "c1".into(),
            name: "Work".into(),
            owner_id: Some("o1".into()),
            owner: None,
        }],
    )
    .await;
    seed_todos(&client, vec![todo("t1", "nested", false, Some("c1"))]).await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let loaded = queries
        .get_by_id(
            &"t1".to_string(),
            QueryBuilder::new()
                .include(Relation::<Todo, Category>::new("category"))
                .then_include(Relation::<Category, Owner>::new("owner"))
                .into_options(),
        )
        .await
        .expect("query")
        .expect("present");
    let owner = loaded
        .category
        .expect("category loaded")
        .owner
        .expect("owner loaded");
    assert_eq!(owner.name, "Ada");
}

#[tokio::test]
async fn dotted_filters_cross_navigations() {
    let client = client().await;
    seed_categories(
        &client,
        vec![
            Category {
                id: "c1".into(),
                name: "Work".into(),
                owner_id: None,
                owner: None,
            },
            Category {
                id: "c2".into(),
                name: "Home".into(),
                owner_id: None,
                owner: None,
            },
        ],
    )
    .await;
    seed_todos(
        &client,
        vec![
            todo("t1", "work task", false, Some("c1")),
            todo("t2", "home task", false, Some("c2")),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let work = queries
        .get_all(
            QueryBuilder::new()
                .filter(FilterCondition::eq("category.name", "Work"))
                .into_options(),
            None,
        )
        .await
        .expect("query");
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].id, "t1");
}

#[tokio::test]
async fn ordering_by_a_navigation_path() {
    let client = client().await;
    seed_categories(
        &client,
        vec![
            Category {
                id: "c1".into(),
                name: "Zebra".into(),
                owner_id: None,
                owner: None,
            },
            Category {
                id: "c2".into(),
                name: "Alpha".into(),
                owner_id: None,
                owner: None,
            },
        ],
    )
    .await;
    seed_todos(
        &client,
        vec![
            todo("t1", "first by id", false, Some("c1")),
            todo("t2", "second by id", false, Some("c2")),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let ordered = queries
        .get_all(
            QueryBuilder::new()
                .order_by_path("category.name", false)
                .into_options(),
            None,
        )
        .await
        .expect("query");
    assert_eq!(ordered[0].id, "t2");
    assert_eq!(ordered[1].id, "t1");
}

#[tokio::test]
async fn first_last_and_single_respect_order_and_cardinality() {
    let client = client().await;
    seed_todos(
        &client,
        vec![
            todo("t1", "alpha", false, None),
            todo("t2", "beta", true, None),
            todo("t3", "gamma", false, None),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);

    let first = queries
        .first(QueryBuilder::new().order_by_path("title", false).into_options())
        .await
        .expect("query")
        .expect("present");
    assert_eq!(first.title, "alpha");

    let last = queries
        .last(QueryBuilder::new().order_by_path("title", false).into_options())
        .await
        .expect("query")
        .expect("present");
    assert_eq!(last.title, "gamma");

    let one = queries
        .single(
            QueryBuilder::new()
                .filter(FilterCondition::eq("is_completed", true))
                .into_options(),
        )
        .await
        .expect("query")
        .expect("present");
    assert_eq!(one.id, "t2");

    let too_many = queries
        .single(
            QueryBuilder::new()
                .filter(FilterCondition::eq("is_completed", false))
                .into_options(),
        )
        .await
        .expect_err("two matches");
    assert_eq!(too_many.kind, RepositoryErrorKind::CardinalityViolation);

    let none = queries
        .single(
            QueryBuilder::new()
                .filter(FilterCondition::eq("title", "missing"))
                .into_options(),
        )
        .await
        .expect("query");
    assert!(none.is_none());
}

#[tokio::test]
async fn comparator_ordering_sorts_in_process() {
    let client = client().await;
    seed_todos(
        &client,
        vec![
            todo("t1", "bb", false, None),
            todo("t2", "a", false, None),
            todo("t3", "ccc", false, None),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let by_length = queries
        .get_all(
            QueryBuilder::new()
                .order_with(|a: &Todo, b: &Todo| a.title.len().cmp(&b.title.len()))
                .into_options(),
            None,
        )
        .await
        .expect("query");
    let titles: Vec<&str> = by_length.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["a", "bb", "ccc"]);
}

#[tokio::test]
async fn aggregates_count_any_and_all() {
    let client = client().await;
    seed_todos(
        &client,
        vec![
            todo("t1", "a", true, None),
            todo("t2", "b", true, None),
            todo("t3", "c", false, None),
        ],
    )
    .await;

    let queries = SurrealQueryRepository::<Todo>::new(client);
    let done = [FilterCondition::eq("is_completed", true)];

    assert_eq!(queries.count(&done).await.expect("count"), 2);
    assert_eq!(queries.count(&[]).await.expect("count"), 3);
    assert!(queries.any(&done).await.expect("any"));
    assert!(!queries
        .any(&[FilterCondition::eq("title", "zzz")])
        .await
        .expect("any"));
    assert!(!queries.all_match(&done).await.expect("all"));
    // no filters: vacuously true
    assert!(queries.all_match(&[]).await.expect("all"));
}

#[tokio::test]
async fn soft_deleted_rows_hide_unless_filters_are_bypassed() {
    let client = client().await;
    let mut deleted = todo("t1", "gone", false, None);
    deleted.deleted_at = Some(chrono::Utc::now());
    seed_todos(&client, vec![deleted, todo("t2", "here", false, None)]).await;

    let queries = SurrealQueryRepository::<Todo>::new(client);

    let visible = queries
        .get_all(QueryOptions::default(), None)
        .await
        .expect("query");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "t2");

    let all = queries
        .get_all(QueryBuilder::new().ignore_filters().into_options(), None)
        .await
        .expect("query");
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let client = client().await;
    seed_todos(&client, vec![todo("t1", "before", false, None)]).await;

    let commands = SurrealCommandRepository::<Todo>::new(client.clone());
    let queries = SurrealQueryRepository::<Todo>::new(client);

    let mut changed = todo("t1", "after", true, None);
    changed.title = "after".into();
    commands.update(changed).await.expect("stage");
    commands.save().await.expect("save");

    let reread = queries
        .get_by_id(&"t1".to_string(), QueryOptions::default())
        .await
        .expect("query")
        .expect("present");
    assert_eq!(reread.title, "after");
    assert!(reread.is_completed);

    commands.delete(reread).await.expect("stage");
    commands.save().await.expect("save");

    let gone = queries
        .get_by_id(&"t1".to_string(), QueryOptions::default())
        .await
        .expect("query");
    assert!(gone.is_none());
}

#[tokio::test]
async fn detach_drops_staged_changes_without_persisting() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client.clone());
    commands.add(todo("t1", "kept", false, None)).await.expect("stage");
    commands.add(todo("t2", "dropped", false, None)).await.expect("stage");
    commands.detach(&"t2".to_string()).await.expect("detach");

    let affected = commands.save().await.expect("save");
    assert_eq!(affected, 1);

    let queries = SurrealQueryRepository::<Todo>::new(client);
    assert!(queries
        .get_by_id(&"t2".to_string(), QueryOptions::default())
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn transaction_lifecycle_is_enforced() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client.clone());

    let err = commands.commit(true).await.expect_err("no transaction");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);

    let err = commands.rollback().await.expect_err("no transaction");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);

    commands
        .begin_transaction(Some(IsolationLevel::Serializable))
        .await
        .expect("begin");
    let err = commands
        .begin_transaction(None)
        .await
        .expect_err("already open");
    assert_eq!(err.kind, RepositoryErrorKind::TransactionActive);

    commands.add(todo("t1", "committed", false, None)).await.expect("stage");
    let affected = commands.commit(true).await.expect("commit");
    assert_eq!(affected, 1);

    let err = commands.commit(true).await.expect_err("spent");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);

    let queries = SurrealQueryRepository::<Todo>::new(client);
    assert!(queries
        .get_by_id(&"t1".to_string(), QueryOptions::default())
        .await
        .expect("query")
        .is_some());
}

#[tokio::test]
async fn rollback_discards_the_open_transaction() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client.clone());

    commands.begin_transaction(None).await.expect("begin");
    commands.add(todo("t1", "never sent", false, None)).await.expect("stage");
    commands.rollback().await.expect("rollback");

    let queries = SurrealQueryRepository::<Todo>::new(client);
    assert!(queries
        .get_by_id(
            &"t1".to_string(),
            QueryBuilder::new().ignore_filters().into_options()
        )
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn commit_without_accepting_retains_the_staged_set() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client);

    commands.begin_transaction(None).await.expect("begin");
    commands.add(todo("t1", "once", false, None)).await.expect("stage");
    commands.commit(false).await.expect("commit");

    // the retained insert collides with itself on replay
    commands.begin_transaction(None).await.expect("begin");
    let err = commands.commit(true).await.expect_err("duplicate create");
    assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);

    // the failed commit spent the handle
    let err = commands.commit(true).await.expect_err("handle spent");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);

    // but the staged set survives: a fresh transaction replays it again
    commands.begin_transaction(None).await.expect("begin");
    let err = commands.commit(true).await.expect_err("still staged");
    assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
}

#[tokio::test]
async fn a_failing_save_checked_leaves_no_transaction_behind() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Category>::new(client);

    // index bootstrap happens on the first begin
    commands.begin_transaction(None).await.expect("begin");
    commands
        .add(Category {
            id: "c1".into(),
            name: "Work".into(),
            owner_id: None,
            owner: None,
        })
        .await
        .expect("stage");
    commands.commit(true).await.expect("commit");

    commands
        .add(Category {
            id: "c2".into(),
            name: "Work".into(),
            owner_id: None,
            owner: None,
        })
        .await
        .expect("stage");
    let err = commands.save_checked().await.expect_err("duplicate name");
    assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);

    // the failure was classified and no open handle remains
    let err = commands.rollback().await.expect_err("nothing open");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);
    let err = commands.commit(true).await.expect_err("nothing open");
    assert_eq!(err.kind, RepositoryErrorKind::NoActiveTransaction);
}

#[tokio::test]
async fn begin_transaction_creates_declared_indexes() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Category>::new(client.clone());
    commands.begin_transaction(None).await.expect("begin");
    commands.rollback().await.expect("rollback");

    let mut response = client
        .query("INFO FOR TABLE categories")
        .await
        .expect("info")
        .check()
        .expect("info");
    let info: Option<serde_json::Value> = response.take(0).expect("payload");
    let indexes = info
        .and_then(|v| v.get("indexes").cloned())
        .expect("indexes map");
    assert!(indexes
        .as_object()
        .expect("object")
        .contains_key("idx_categories_name"));
}

#[tokio::test]
async fn unique_index_rejects_duplicates() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Category>::new(client);

    // index bootstrap happens on the first begin
    commands.begin_transaction(None).await.expect("begin");
    commands
        .add(Category {
            id: "c1".into(),
            name: "Work".into(),
            owner_id: None,
            owner: None,
        })
        .await
        .expect("stage");
    commands.commit(true).await.expect("commit");

    commands
        .add(Category {
            id: "c2".into(),
            name: "Work".into(),
            owner_id: None,
            owner: None,
        })
        .await
        .expect("stage");
    let err = commands.save().await.expect_err("duplicate name");
    assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
}

#[tokio::test]
async fn save_expecting_reports_the_actual_count() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client);
    commands.add(todo("t1", "only one", false, None)).await.expect("stage");
    // mismatch logs a warning but never fails
    let affected = commands.save_expecting(5).await.expect("save");
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn projections_shape_the_output() {
    let client = client().await;
    seed_todos(&client, vec![todo("t1", "project me", true, None)]).await;

    #[derive(Debug, Deserialize)]
    struct TodoSummary {
        id: String,
        title: String,
    }

    #[derive(Debug, Deserialize)]
    struct TodoLabel {
        label: String,
    }

    let queries = SurrealQueryRepository::<Todo>::new(client);

    let conventional: Vec<TodoSummary> = queries
        .get_all_projected(
            QueryOptions::default(),
            None,
            &ProjectionSpec::convention(),
        )
        .await
        .expect("query");
    assert_eq!(conventional[0].id, "t1");
    assert_eq!(conventional[0].title, "project me");

    let renamed: Option<TodoLabel> = queries
        .first_projected(
            QueryOptions::default(),
            &ProjectionSpec::config(ProjectionConfig::new().map("title", "label")),
        )
        .await
        .expect("query");
    assert_eq!(renamed.expect("present").label, "project me");

    let mapped: Option<String> = queries
        .single_projected(
            QueryOptions::default(),
            &ProjectionSpec::mapper(|t: &Todo| t.title.to_uppercase()),
        )
        .await
        .expect("query");
    assert_eq!(mapped.expect("present"), "PROJECT ME");
}

#[tokio::test]
async fn raw_queries_pass_through() {
    let client = client().await;
    seed_todos(
        &client,
        vec![todo("t1", "raw", true, None), todo("t2", "raw too", false, None)],
    )
    .await;

    #[derive(Debug, Deserialize)]
    struct TitleRow {
        title: String,
    }

    let queries = SurrealQueryRepository::<Todo>::new(client.clone());
    let rows: Vec<TitleRow> = queries
        .query_raw(
            "SELECT title FROM todos WHERE is_completed = $p1",
            &[FilterValue::Boolean(true)],
        )
        .await
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "raw");

    let count: Option<u64> = queries
        .scalar_raw("SELECT count() AS count FROM todos GROUP ALL", &[])
        .await
        .expect("query");
    assert_eq!(count, Some(2));

    let err = queries
        .query_raw::<TitleRow>("   ", &[])
        .await
        .expect_err("empty text");
    assert_eq!(err.kind, RepositoryErrorKind::InvalidArgument);

    let commands = SurrealCommandRepository::<Todo>::new(client);
    let affected = commands
        .execute_raw(
            "UPDATE todos SET is_completed = true WHERE is_completed = $p1",
            &[FilterValue::Boolean(false)],
        )
        .await
        .expect("execute");
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn scalar_statements_execute_with_zero_affected() {
    let client = client().await;
    let commands = SurrealCommandRepository::<Todo>::new(client);

    // a RETURN produces a scalar, not a record set
    let affected = commands
        .execute_raw("RETURN 1 + 1", &[])
        .await
        .expect("execute");
    assert_eq!(affected, 0);
}

#[tokio::test]
async fn invalid_paths_surface_as_invalid_argument_at_execution() {
    let client = client().await;
    let queries = SurrealQueryRepository::<Todo>::new(client);

    let err = queries
        .get_all(
            QueryBuilder::new()
                .order_by_path("category.colour", false)
                .into_options(),
            None,
        )
        .await
        .expect_err("unknown member");
    assert_eq!(err.kind, RepositoryErrorKind::InvalidArgument);
    assert!(err.message.contains("colour"));

    let err = queries
        .get_all(
            QueryBuilder::new().include_path("title").into_options(),
            None,
        )
        .await
        .expect_err("scalar include");
    assert_eq!(err.kind, RepositoryErrorKind::InvalidArgument);
}
