//! End-to-end tests of the workspace facade: ingest a temporary docs tree,
//! then query it.

use std::fs;
use std::path::Path;

use docmgr_workspace::diagnostics::DiagnosticContext;
use docmgr_workspace::frontmatter;
use docmgr_workspace::{
    find_taxonomy, CancelToken, DocQuery, IndexOptions, OrderBy, QueryError, RelatedFile, Symptom,
    Workspace, WorkspaceContext, WorkspaceError,
};
use tempfile::TempDir;

const TICKET_DIR: &str = "ttmp/2025/12/12/MEN-1--x";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// The reference tree: an index with related files, a control doc, skipped
/// directories, an archived doc and a document with broken YAML.
fn setup_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        &format!("{}/index.md", TICKET_DIR),
        "---\nTitle: MEN-1 overview\nTicket: MEN-1\nDocType: index\nStatus: active\nTopics: [a, B]\nOwners: [alice]\nRelatedFiles:\n  - Path: backend/main.go\n    Note: entrypoint\n  - web/app.ts\nLastUpdated: 2025-12-12T10:00:00Z\n---\n# Overview\n\nThe deployment pipeline for payments.\n",
    );
    write(
        root,
        &format!("{}/tasks.md", TICKET_DIR),
        "---\nTitle: Tasks\nTicket: MEN-1\nDocType: tasks\n---\n- [ ] ship\n",
    );
    write(
        root,
        &format!("{}/design/api.md", TICKET_DIR),
        "---\nTitle: API design\nTicket: MEN-1\nDocType: design-doc\nTopics: [Backend]\nRelatedFiles: [backend/api/handler.go]\nLastUpdated: 2025-11-01T08:00:00Z\n---\nHandlers and routes.\n",
    );
    write(
        root,
        "ttmp/_guidelines/reference.md",
        "---\nTitle: Guidelines\nTicket: MEN-1\nDocType: reference\n---\n",
    );
    write(
        root,
        &format!("{}/.meta/x.md", TICKET_DIR),
        "---\nTitle: Meta\nTicket: MEN-1\nDocType: index\n---\n",
    );
    write(
        root,
        "ttmp/2025/12/13/MEN-2--old/archive/notes.md",
        "---\nTitle: Old notes\nTicket: MEN-2\nDocType: notes\n---\n",
    );
    write(
        root,
        "ttmp/2025/12/14/MEN-3--broken/index.md",
        "---\nTitle: Broken\nTicket: MEN-3\nTopics: [a\n---\nbody\n",
    );
    tmp
}

fn context(tmp: &TempDir) -> WorkspaceContext {
    WorkspaceContext {
        root: tmp.path().join("ttmp"),
        config_dir: tmp.path().to_path_buf(),
        repo_root: tmp.path().to_path_buf(),
        config: None,
    }
}

async fn indexed(tmp: &TempDir, include_body: bool) -> Workspace {
    let mut ws = Workspace::new(context(tmp)).unwrap();
    ws.init_index(IndexOptions { include_body }, &CancelToken::new())
        .await
        .unwrap();
    ws
}

async fn paths(ws: &Workspace, q: &DocQuery) -> Vec<String> {
    ws.query_docs(q, &CancelToken::new())
        .await
        .unwrap()
        .docs
        .into_iter()
        .map(|d| d.path)
        .collect()
}

fn ends_with(paths: &[String], suffix: &str) -> bool {
    paths.iter().any(|p| p.ends_with(suffix))
}

#[tokio::test]
async fn test_ticket_scope_hides_control_docs() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::ticket("MEN-1");
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 2);
    assert!(ends_with(&found, "MEN-1--x/index.md"));
    assert!(ends_with(&found, "design/api.md"));
    assert!(!ends_with(&found, "tasks.md"));

    q.options.include_control_docs = true;
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 3);
    assert!(ends_with(&found, "tasks.md"));
    assert!(!found.iter().any(|p| p.contains("_guidelines") || p.contains(".meta")));
}

#[tokio::test]
async fn test_related_file_reverse_lookup() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::repo();
    q.filters.related_file = vec!["backend/main.go".into()];
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("MEN-1--x/index.md"));

    q.filters.related_file = vec!["main.go".into()];
    assert_eq!(paths(&ws, &q).await, found);

    let abs = tmp.path().join("backend/main.go");
    q.filters.related_file = vec![abs.to_string_lossy().to_string()];
    assert_eq!(paths(&ws, &q).await, found);

    q.filters.related_file = vec!["other/main.go".into()];
    assert!(paths(&ws, &q).await.is_empty());
}

#[tokio::test]
async fn test_related_dir_requires_full_segment() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::repo();
    q.filters.related_dir = vec!["backend/".into()];
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 2);

    q.filters.related_dir = vec!["backend/api".into()];
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("design/api.md"));

    q.filters.related_dir = vec!["back".into()];
    assert!(paths(&ws, &q).await.is_empty());
}

#[tokio::test]
async fn test_parse_failure_surfaces() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::ticket("MEN-3");
    assert!(paths(&ws, &q).await.is_empty());

    q.options.include_errors = true;
    let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
    assert_eq!(res.docs.len(), 1);
    let handle = &res.docs[0];
    assert!(handle.document.is_none());
    assert!(!handle.read_err.as_deref().unwrap_or_default().is_empty());

    let yaml = ws
        .ingest_diagnostics()
        .iter()
        .find(|t| t.symptom == Symptom::YamlSyntax)
        .expect("yaml diagnostic");
    match &yaml.context {
        DiagnosticContext::FrontmatterParse(ctx) => assert_eq!(ctx.line, 4),
        other => panic!("unexpected context {:?}", other),
    }
}

#[tokio::test]
async fn test_skipped_due_to_parse_diagnostic() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::ticket("MEN-3");
    q.options.include_diagnostics = true;
    let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
    assert!(res.docs.is_empty());
    assert_eq!(res.diagnostics.len(), 1);
    assert_eq!(res.diagnostics[0].symptom, Symptom::QuerySkippedDueToParse);
}

#[tokio::test]
async fn test_contradictory_query_is_an_error() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::ticket("MEN-1");
    q.filters.ticket = Some("MEN-2".into());
    let err = ws.query_docs(&q, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Query {
            error: QueryError::ContradictoryScopeAndFilter { .. },
            ..
        }
    ));
    let tax = err.taxonomy().expect("taxonomy");
    assert_eq!(tax.symptom, Symptom::ContradictoryScopeAndFilter);
}

#[tokio::test]
async fn test_topics_case_insensitive() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::repo();
    q.filters.topics_any = vec!["backend".into()];
    let lower = paths(&ws, &q).await;
    q.filters.topics_any = vec!["BACKEND".into()];
    let upper = paths(&ws, &q).await;
    assert_eq!(lower, upper);
    // `B` on the index is not `backend`
    assert_eq!(lower.len(), 1);
    assert!(lower[0].ends_with("design/api.md"));
}

#[tokio::test]
async fn test_visibility_defaults() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let found = paths(&ws, &DocQuery::repo()).await;
    assert!(!found.iter().any(|p| p.contains("/archive/")));
    assert!(!ends_with(&found, "tasks.md"));

    let mut q = DocQuery::repo();
    q.options.include_archived_path = true;
    assert!(ends_with(&paths(&ws, &q).await, "archive/notes.md"));
}

#[tokio::test]
async fn test_related_files_round_trip() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let index = tmp.path().join(TICKET_DIR).join("index.md");
    let res = ws
        .query_docs(
            &DocQuery::doc(index.to_string_lossy().to_string()),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(res.docs.len(), 1);
    let doc = res.docs[0].document.as_ref().unwrap();
    assert_eq!(
        doc.related_files,
        vec![
            RelatedFile::new("backend/main.go", "entrypoint"),
            RelatedFile::new("web/app.ts", ""),
        ]
    );
    assert_eq!(doc.topics, vec!["a", "B"]);
    assert_eq!(doc.owners, vec!["alice"]);
    assert_eq!(doc.ticket.as_deref(), Some("MEN-1"));
}

#[tokio::test]
async fn test_order_and_time_range() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::ticket("MEN-1");
    q.options.order_by = OrderBy::LastUpdated;
    let found = paths(&ws, &q).await;
    assert!(found[0].ends_with("design/api.md"));

    q.options.reverse = true;
    let found = paths(&ws, &q).await;
    assert!(found[0].ends_with("MEN-1--x/index.md"));

    q.filters.since = Some("2025-12-01".into());
    let found = paths(&ws, &q).await;
    assert_eq!(found.len(), 1);
    assert!(found[0].ends_with("MEN-1--x/index.md"));

    q.filters.since = Some("the other day".into());
    let err = ws.query_docs(&q, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Query {
            error: QueryError::InvalidDate { field: "since", .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_text_query() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;

    let mut q = DocQuery::repo();
    q.options.order_by = OrderBy::Rank;
    if ws.fts_available() {
        q.filters.text_query = Some("deployment".into());
        let found = paths(&ws, &q).await;
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("MEN-1--x/index.md"));
    } else {
        q.filters.text_query = Some("overview".into());
        q.options.include_diagnostics = true;
        let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
        assert_eq!(res.docs.len(), 1);
        assert!(res
            .diagnostics
            .iter()
            .any(|t| t.symptom == Symptom::FtsUnavailable));
    }
}

#[tokio::test]
async fn test_include_body() {
    let tmp = setup_tree();
    let index = tmp.path().join(TICKET_DIR).join("index.md");
    let mut q = DocQuery::doc(index.to_string_lossy().to_string());
    q.options.include_body = true;

    let ws = indexed(&tmp, true).await;
    let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
    assert!(res.docs[0]
        .body
        .as_deref()
        .unwrap_or_default()
        .contains("deployment pipeline"));

    let ws = indexed(&tmp, false).await;
    let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
    assert_eq!(res.docs[0].body, None);
}

#[tokio::test]
async fn test_init_index_is_idempotent() {
    let tmp = setup_tree();
    let mut ws = indexed(&tmp, false).await;
    let first = ws.stats().await.unwrap();
    let mut q = DocQuery::repo();
    q.options.include_errors = true;
    q.options.include_archived_path = true;
    q.options.include_control_docs = true;
    let first_paths = paths(&ws, &q).await;

    ws.init_index(IndexOptions::default(), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(ws.stats().await.unwrap(), first);
    assert_eq!(paths(&ws, &q).await, first_paths);
    assert_eq!(first.docs, 5);
    assert_eq!(first.parse_failures, 1);
}

#[tokio::test]
async fn test_inferred_ticket_for_parse_failure() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;
    let pool = ws.db().unwrap();
    let ticket: Option<String> =
        sqlx::query_scalar("SELECT ticket_id FROM docs WHERE parse_ok = 0")
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(ticket.as_deref(), Some("MEN-3"));
}

#[tokio::test]
async fn test_cancelled_init_leaves_no_index() {
    let tmp = setup_tree();
    let mut ws = Workspace::new(context(&tmp)).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = ws
        .init_index(IndexOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::Cancelled));
    assert!(ws.db().is_none());
}

#[tokio::test]
async fn test_query_errors_carry_taxonomy() {
    let tmp = setup_tree();
    let ws = indexed(&tmp, false).await;
    let err = ws
        .query_docs(&DocQuery::doc("  "), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Query {
            error: QueryError::EmptyDocPath,
            ..
        }
    ));
    assert_eq!(err.taxonomy().unwrap().symptom, Symptom::InvalidQuery);
    assert_eq!(
        find_taxonomy(&err).map(|t| t.path.as_str()),
        Some("scope.doc_path")
    );
}

#[test]
fn test_frontmatter_error_chain_yields_taxonomy() {
    let tmp = setup_tree();
    let broken = tmp.path().join("ttmp/2025/12/14/MEN-3--broken/index.md");
    let err = frontmatter::validate_file(&broken).unwrap_err();
    let tax = find_taxonomy(&err).expect("taxonomy in chain");
    assert_eq!(tax.symptom, Symptom::YamlSyntax);
}

#[tokio::test]
async fn test_nested_note_with_colon_is_indexed() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        &format!("{}/index.md", TICKET_DIR),
        "---\nTitle: T\nTicket: MEN-1\nDocType: index\nRelatedFiles:\n  - Path: backend/main.go\n    Note: Fix: the thing\n---\n",
    );
    let ws = indexed(&tmp, false).await;
    assert_eq!(ws.ingest_report().parse_failures, 0);

    let mut q = DocQuery::repo();
    q.filters.related_file = vec!["backend/main.go".into()];
    let res = ws.query_docs(&q, &CancelToken::new()).await.unwrap();
    assert_eq!(res.docs.len(), 1);
    let doc = res.docs[0].document.as_ref().expect("parsed document");
    assert_eq!(doc.related_files[0].note, "Fix: the thing");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_document_in_ticket_scope() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        &format!("{}/index.md", TICKET_DIR),
        "---\nTitle: T\nTicket: MEN-1\nDocType: index\n---\n",
    );
    write(
        tmp.path(),
        "shared/design.md",
        "---\nTitle: Shared design\nTicket: MEN-1\nDocType: design-doc\n---\n",
    );
    std::os::unix::fs::symlink(
        tmp.path().join("shared/design.md"),
        tmp.path().join(TICKET_DIR).join("design.md"),
    )
    .unwrap();
    let ws = indexed(&tmp, false).await;

    let found = paths(&ws, &DocQuery::ticket("MEN-1")).await;
    assert_eq!(found.len(), 2);
    assert!(ends_with(&found, "MEN-1--x/design.md"));
    assert!(ends_with(&found, "MEN-1--x/index.md"));
}
