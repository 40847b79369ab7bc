mod common;

use common::MemoryQueryer;
use tabler::{
    Error, FieldDescriptor, Model, QueryerExt, Record, Row, StructDescriptor, Table,
    TableDescriptor, Tabler, Value, resolve_templates, resolve_templates_strict,
};

#[derive(Debug, Clone, Default, PartialEq, Record)]
pub struct Article {
    #[embed]
    pub model: Model,
    pub title: String,
    #[db = "author"]
    pub author_name: String,
    pub views: u32,
}

fn articles() -> Table<Article> {
    Table::new("articles").unwrap()
}

fn id_only() -> TableDescriptor {
    TableDescriptor::build(&StructDescriptor::new(
        "Row",
        vec![FieldDescriptor::of::<u64>("ID")],
    ))
    .unwrap()
}

#[test]
fn unresolved_templates_are_dropped() {
    let resolved = resolve_templates("{{ID}} = ? AND {{Missing}} = ?", &id_only());
    assert_eq!(resolved, "`id` = ? AND  = ?");
}

#[test]
fn strict_resolution_reports_the_field() {
    let err = resolve_templates_strict("{{ID}} = ? AND {{Missing}} = ?", &id_only()).unwrap_err();
    assert!(matches!(err, Error::UnresolvedField(ref f) if f == "Missing"));

    let ok = resolve_templates_strict("{{ ID }} > 0", &id_only()).unwrap();
    assert_eq!(ok, "`id` > 0");
}

#[test]
fn templates_use_physical_names() {
    let table = articles();
    assert_eq!(
        table.resolve_query_templates("{{author_name}} = ? OR {{title}} LIKE ?"),
        "`author` = ? OR `title` LIKE ?"
    );
    assert_eq!(table.resolve_query_templates("no templates"), "no templates");
}

#[test]
fn clauses_render_in_order() {
    let select = articles()
        .select("{{author_name}}, COUNT(*)")
        .r#where("{{views}} > ?")
        .group_by("{{author_name}}")
        .order_by("{{author_name}} ASC")
        .limit(20, 10);

    assert_eq!(
        select.query(),
        "SELECT `author`, COUNT(*) FROM `articles` WHERE `views` > ? \
         GROUP BY `author` ORDER BY `author` ASC LIMIT 20, 10"
    );
}

#[test]
fn empty_clauses_are_omitted() {
    let select = articles().select("*").r#where("").order_by("");
    assert_eq!(select.query(), "SELECT * FROM `articles`");
}

#[test]
fn nested_select_wraps_the_inner_query() {
    let recent = articles()
        .select("*")
        .order_by("{{created_at}} DESC")
        .limit(0, 100);
    let outer = recent
        .select("{{title}}")
        .r#as("recent")
        .r#where("{{views}} > ?");

    assert_eq!(
        outer.query(),
        "SELECT `title` FROM (SELECT * FROM `articles` \
         ORDER BY `created_at` DESC LIMIT 0, 100) AS recent WHERE `views` > ?"
    );
}

#[tokio::test]
async fn first_limits_to_one_row() {
    let row = Row::new().with("id", 9u64).with("title", "Hello").with("author", "ada");
    let mut db = MemoryQueryer::new().with_rows(vec![row]);

    let found = articles()
        .select("*")
        .r#where("{{id}} = ?")
        .first(&mut db, &[9u64.into()])
        .await
        .unwrap()
        .unwrap();

    assert_eq!(found.model.id, 9);
    assert_eq!(found.author_name, "ada");
    assert_eq!(found.views, 0);
    assert_eq!(db.log[0].sql, "SELECT * FROM `articles` WHERE `id` = ? LIMIT 0, 1");
    assert_eq!(db.log[0].args, vec![Value::U64(9)]);
}

#[tokio::test]
async fn first_on_empty_result_is_none() {
    let mut db = MemoryQueryer::new();
    let found = articles().select("*").first(&mut db, &[]).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn raw_queries_fill_records() {
    let rows = vec![
        Row::new().with("id", 1u64).with("title", "one"),
        Row::new().with("id", 2u64).with("title", "two"),
    ];
    let mut db = MemoryQueryer::new().with_rows(rows);

    let mut dest: Vec<Article> = Vec::new();
    db.query_into(&mut dest, "SELECT `id`, `title` FROM `articles`", &[])
        .await
        .unwrap();
    assert_eq!(dest.len(), 2);
    assert_eq!(dest[1].title, "two");

    let mut one = Article::default();
    let err = db
        .query_one_into(&mut one, "SELECT * FROM `articles` WHERE 0", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RowNotFound));
}

#[tokio::test]
async fn first_keeps_the_offset() {
    let mut db = MemoryQueryer::new();
    let found = articles()
        .select("*")
        .order_by("{{views}} DESC")
        .limit(20, 10)
        .first(&mut db, &[])
        .await
        .unwrap();

    assert!(found.is_none());
    assert_eq!(
        db.log[0].sql,
        "SELECT * FROM `articles` ORDER BY `views` DESC LIMIT 20, 1"
    );
}
