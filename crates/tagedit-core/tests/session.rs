use std::path::Path;

use pretty_assertions::assert_eq;

use tagedit_core::backend::{BackendOp, FileTag};
use tagedit_core::memory::MemoryBackend;
use tagedit_core::{SessionError, TagRow, TagSession};

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn scenario_backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_tags(&["photo", "year", "draft"])
        .with_file_tags("f.txt", &[("photo", ""), ("year", "2020")])
}

fn rows_of<B: tagedit_core::TagBackend>(session: &TagSession<B>) -> Vec<TagRow> {
    session.rows().iter().cloned().collect()
}

fn assert_untagged_rows_have_no_value<B: tagedit_core::TagBackend>(session: &TagSession<B>) {
    for row in session.rows() {
        assert!(row.tagged || row.value.is_empty(), "row {:?}", row);
    }
}

#[test]
fn load_lists_file_tags_first_then_known_tags() {
    let backend = scenario_backend();
    let session = TagSession::open(&backend, "f.txt").expect("open");
    assert_eq!(
        rows_of(&session),
        vec![
            TagRow::tagged("photo", ""),
            TagRow::tagged("year", "2020"),
            TagRow::untagged("draft"),
        ]
    );
}

#[test]
fn load_never_duplicates_names() {
    let backend = MemoryBackend::new()
        .with_tags(&["draft", "year"])
        .with_file_tags("f.txt", &[("year", "2020"), ("year", "2021")]);
    let session = TagSession::open(&backend, "f.txt").expect("open");
    assert_eq!(
        rows_of(&session),
        vec![TagRow::tagged("year", "2020"), TagRow::untagged("draft")]
    );
}

#[test]
fn toggle_untagged_row_tags_it() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let row = session.toggle("draft").expect("toggle").clone();
    assert_eq!(row, TagRow::tagged("draft", ""));
    assert_eq!(backend.calls(), vec![argv(&["tag", "f.txt", "draft"])]);
}

#[test]
fn toggle_twice_round_trips() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    session.toggle("draft").expect("tag");
    let row = session.toggle("draft").expect("untag").clone();
    assert_eq!(row, TagRow::untagged("draft"));
    assert!(backend
        .file_tags(Path::new("f.txt"))
        .iter()
        .all(|tag| tag.name != "draft"));
    assert_untagged_rows_have_no_value(&session);
}

#[test]
fn toggle_tagged_row_untags_with_its_value() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let row = session.toggle("year").expect("toggle").clone();
    assert_eq!(row, TagRow::untagged("year"));
    assert_eq!(backend.calls(), vec![argv(&["untag", "f.txt", "year=2020"])]);
}

#[test]
fn toggle_failure_leaves_row_unchanged() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Tag);

    let err = session.toggle("draft").expect_err("fails");
    assert!(matches!(err, SessionError::Backend(_)));
    assert_eq!(
        session.rows().find_by_name("draft"),
        Some(&TagRow::untagged("draft"))
    );
}

#[test]
fn add_replaces_existing_value() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let row = session.add("year", "2021").expect("add").clone();
    assert_eq!(row, TagRow::tagged("year", "2021"));
    assert_eq!(backend.calls(), vec![argv(&["tag", "f.txt", "year=2021"])]);
    assert_eq!(session.rows().len(), 3);
}

#[test]
fn add_without_value_for_valued_tag_is_rejected() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let err = session.add("year", "").expect_err("rejected");
    assert!(matches!(err, SessionError::ValueRequired(ref name) if name == "year"));
    assert!(err.is_validation());
    assert!(backend.calls().is_empty());
    assert_eq!(
        session.rows().find_by_name("year"),
        Some(&TagRow::tagged("year", "2020"))
    );
}

#[test]
fn add_empty_name_is_rejected() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    assert!(matches!(session.add("  ", "x"), Err(SessionError::EmptyName)));
    assert!(backend.calls().is_empty());
}

#[test]
fn add_new_tag_appends_row() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    session.add("color", "red").expect("add");
    assert_eq!(
        session.rows().get(3),
        Some(&TagRow::tagged("color", "red"))
    );
    assert!(backend
        .file_tags(Path::new("f.txt"))
        .contains(&FileTag::new("color", "red")));
}

#[test]
fn add_same_value_twice_keeps_one_row() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    session.add("year", "2020").expect("first");
    session.add("year", "2020").expect("second");
    let years: Vec<&TagRow> = session
        .rows()
        .iter()
        .filter(|row| row.name == "year")
        .collect();
    assert_eq!(years, vec![&TagRow::tagged("year", "2020")]);
}

#[test]
fn add_failure_changes_nothing() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Tag);

    assert!(session.add("color", "red").is_err());
    assert!(session.rows().find_by_name("color").is_none());
}

#[test]
fn edit_name_renames_globally_and_updates_row() {
    let backend = scenario_backend().with_file_tags("other.txt", &[("photo", "")]);
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    let row = session.edit_name("photo", "picture").expect("rename").clone();
    assert_eq!(row, TagRow::tagged("picture", ""));
    assert_eq!(
        backend.file_tags(Path::new("other.txt")),
        vec![FileTag::new("picture", "")]
    );
}

#[test]
fn edit_name_same_name_is_noop() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    session.edit_name("photo", "photo").expect("noop");
    assert!(backend.calls().is_empty());
}

#[test]
fn edit_name_to_existing_name_is_rejected() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    assert!(matches!(
        session.edit_name("photo", "draft"),
        Err(SessionError::NameTaken(_))
    ));
    assert!(backend.calls().is_empty());
}

#[test]
fn edit_name_failure_keeps_old_name() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Rename);

    assert!(session.edit_name("photo", "picture").is_err());
    assert!(session.rows().find_by_name("photo").is_some());
    assert!(session.rows().find_by_name("picture").is_none());
}

#[test]
fn edit_value_untags_old_then_tags_new() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let row = session.edit_value("year", "1999").expect("edit").clone();
    assert_eq!(row, TagRow::tagged("year", "1999"));
    assert_eq!(
        backend.calls(),
        vec![
            argv(&["untag", "f.txt", "year=2020"]),
            argv(&["tag", "f.txt", "year=1999"]),
        ]
    );
}

#[test]
fn edit_value_same_value_is_noop() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    session.edit_value("year", "2020").expect("noop");
    assert!(backend.calls().is_empty());
}

#[test]
fn nameless_file_tag_fails_the_load() {
    let backend = MemoryBackend::new()
        .with_tags(&["photo"])
        .with_file_tags("f.txt", &[("", "x"), ("photo", "")]);
    let err = TagSession::open(&backend, "f.txt")
        .err()
        .expect("open fails");
    assert!(matches!(
        err,
        SessionError::Backend(tagedit_core::BackendError::Parse {
            op: BackendOp::ListFileTags,
            ..
        })
    ));
}

#[test]
fn edit_value_untag_failure_aborts() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Untag);
    backend.clear_calls();

    let err = session.edit_value("year", "1999").expect_err("fails");
    assert!(matches!(err, SessionError::Backend(_)));
    assert!(!err.is_partial());
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(
        session.rows().find_by_name("year"),
        Some(&TagRow::tagged("year", "2020"))
    );
}

#[test]
fn edit_value_retag_failure_is_partial() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Tag);

    let err = session.edit_value("year", "1999").expect_err("fails");
    assert!(err.is_partial());
    match err {
        SessionError::PartialFailure {
            name,
            old_value,
            new_value,
            ..
        } => {
            assert_eq!(name, "year");
            assert_eq!(old_value, "2020");
            assert_eq!(new_value, "1999");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The backend lost the binding; the rows still show the loaded value.
    assert!(backend
        .file_tags(Path::new("f.txt"))
        .iter()
        .all(|tag| tag.name != "year"));
    assert_eq!(
        session.rows().find_by_name("year"),
        Some(&TagRow::tagged("year", "2020"))
    );

    backend.clear_failures();
    session.reload().expect("reload");
    assert_eq!(session.rows().find_by_name("year"), Some(&TagRow::untagged("year")));
}

#[test]
fn edit_value_on_untagged_row_tags_it() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    let row = session.edit_value("draft", "v2").expect("edit").clone();
    assert_eq!(row, TagRow::tagged("draft", "v2"));
    assert_eq!(backend.calls(), vec![argv(&["tag", "f.txt", "draft=v2"])]);
}

#[test]
fn delete_removes_row_everywhere() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    let removed = session.delete("photo").expect("delete");
    assert_eq!(removed, TagRow::tagged("photo", ""));
    assert!(session.rows().find_by_name("photo").is_none());
    assert!(!backend.all_tags().contains(&"photo".to_string()));
}

#[test]
fn delete_failure_keeps_row() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.fail_on(BackendOp::Delete);

    let err = session.delete("photo").expect_err("fails");
    assert!(matches!(err, SessionError::Backend(ref source) if source.op() == BackendOp::Delete));
    assert_eq!(
        session.rows().find_by_name("photo"),
        Some(&TagRow::tagged("photo", ""))
    );
}

#[test]
fn unknown_rows_are_validation_errors() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");
    backend.clear_calls();

    assert!(matches!(session.toggle("nope"), Err(SessionError::UnknownTag(_))));
    assert!(matches!(session.delete("nope"), Err(SessionError::UnknownTag(_))));
    assert!(backend.calls().is_empty());
}

#[test]
fn value_suggestions_are_advisory() {
    let backend = scenario_backend().with_file_tags("g.txt", &[("year", "2021")]);
    let session = TagSession::open(&backend, "f.txt").expect("open");
    assert_eq!(
        session.suggest_values("year"),
        vec!["2020".to_string(), "2021".to_string()]
    );

    backend.fail_on(BackendOp::ListValues);
    assert!(session.suggest_values("year").is_empty());
    assert_eq!(session.suggest_tags("d"), vec!["draft"]);
}

#[test]
fn untagged_rows_stay_valueless_across_operations() {
    let backend = scenario_backend();
    let mut session = TagSession::open(&backend, "f.txt").expect("open");

    session.toggle("year").expect("untag");
    assert_untagged_rows_have_no_value(&session);
    session.add("draft", "x").expect("add");
    assert_untagged_rows_have_no_value(&session);
    session.edit_value("draft", "y").expect("edit");
    session.toggle("draft").expect("untag");
    assert_untagged_rows_have_no_value(&session);
}
