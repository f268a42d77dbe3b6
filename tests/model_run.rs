use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use fixture_pipeline::config::YamlLoader;
use fixture_pipeline::content::Content;
use fixture_pipeline::managers::{ModelManager, RunOptions, RunOutcome};
use fixture_pipeline::processors::ProcessorRegistry;
use fixture_pipeline::spec::ModelSpec;
use fixture_pipeline::store::{ReadMode, VersionedFile};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

const LAYER: &str = r#"
name: intermediate
stage: intermediate
models:
  - name: football_matches
    trigger: automatic
    sources:
      - name: espn
        path: landing/espn.json
        versioning: { field: created_at, mode: newest, type: datetime }
    output:
      name: football_matches
      path: intermediate/football_matches.json
      layer: intermediate
      unique: { field_sets: [[id]], version_col: created_at, keep: last }
      non-nullable: { fields: [home] }
    processing:
      processor: select_source
      source: espn
    static_fields:
      - { name: sport, value: football }
  - name: admin_fixes
    trigger: manual
    sources:
      - name: espn
        path: landing/espn.json
    output:
      name: admin_fixes
      path: intermediate/admin_fixes.json
      layer: intermediate
    processing:
      processor: select_source
      source: espn
"#;

fn models(repo: &Path) -> Vec<ModelSpec> {
    let now = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    YamlLoader::new(now)
        .parse_layer(LAYER, Path::new("intermediate.yml"), repo)
        .unwrap()
        .models
}

fn write_source(repo: &Path, rows: Value) {
    fs::create_dir_all(repo.join("landing")).unwrap();
    fs::write(
        repo.join("landing/espn.json"),
        serde_json::to_string_pretty(&rows).unwrap(),
    )
    .unwrap();
}

fn output(repo: &Path, name: &str) -> Content {
    VersionedFile::open(repo.join("intermediate").join(name))
        .unwrap()
        .read(&ReadMode::All)
        .unwrap()
}

fn ids(content: &Content) -> Vec<String> {
    (0..content.len())
        .map(|i| content.text(i, "id").unwrap().into_owned())
        .collect()
}

#[test]
fn incremental_runs_only_process_new_rows() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    let manager = ModelManager::new(&specs[0], &registry);

    write_source(
        repo.path(),
        json!([
            {"id": "1", "home": "A", "created_at": "2023-01-01"},
            {"id": "2", "home": "B", "created_at": "2023-01-02"}
        ]),
    );
    assert_eq!(manager.run(RunOptions::default()).unwrap(), RunOutcome::Completed { rows: 2 });

    let journal = VersionedFile::open(repo.path().join("intermediate/football_matches.json"))
        .unwrap()
        .last_write()
        .unwrap()
        .unwrap();
    let recorded = journal.source_versions();
    let espn = recorded.get("espn").unwrap();
    assert_eq!(espn.version_field(), "created_at");
    assert_eq!(espn.version_cutoff(), "2023-01-02");

    // nothing new: the watermark holds and the output is unchanged
    let before = output(repo.path(), "football_matches.json");
    assert_eq!(manager.run(RunOptions::default()).unwrap(), RunOutcome::Completed { rows: 0 });
    assert_eq!(output(repo.path(), "football_matches.json"), before);

    // an update of id 1 and a new id 3 arrive
    write_source(
        repo.path(),
        json!([
            {"id": "1", "home": "A", "created_at": "2023-01-01"},
            {"id": "2", "home": "B", "created_at": "2023-01-02"},
            {"id": "1", "home": "A2", "created_at": "2023-01-03"},
            {"id": "3", "home": "C", "created_at": "2023-01-03"}
        ]),
    );
    assert_eq!(manager.run(RunOptions::default()).unwrap(), RunOutcome::Completed { rows: 2 });

    let out = output(repo.path(), "football_matches.json");
    assert_eq!(ids(&out), vec!["2", "1", "3"]);
    assert_eq!(out.text(1, "home").as_deref(), Some("A2"));
    assert_eq!(out.text(0, "sport").as_deref(), Some("football"));
}

#[test]
fn constraints_drop_null_rows() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    write_source(
        repo.path(),
        json!([
            {"id": "1", "home": "nan", "created_at": "2023-01-01"},
            {"id": "2", "home": "B", "created_at": "2023-01-02"}
        ]),
    );
    ModelManager::new(&specs[0], &registry)
        .run(RunOptions::default())
        .unwrap();
    assert_eq!(ids(&output(repo.path(), "football_matches.json")), vec!["2"]);
}

#[test]
fn manual_models_are_gated_without_side_effects() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    write_source(repo.path(), json!([{"id": "1", "home": "A", "created_at": "2023-01-01"}]));

    let manager = ModelManager::new(&specs[1], &registry);
    assert_eq!(manager.run(RunOptions::default()).unwrap(), RunOutcome::Gated);
    assert!(!repo.path().join("intermediate").exists());

    let manual = RunOptions {
        manual: true,
        ..RunOptions::default()
    };
    assert_eq!(manager.run(manual).unwrap(), RunOutcome::Completed { rows: 1 });
}

#[test]
fn dry_run_writes_nothing() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    write_source(repo.path(), json!([{"id": "1", "home": "A", "created_at": "2023-01-01"}]));

    let dry = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };
    let manager = ModelManager::new(&specs[0], &registry);
    assert_eq!(manager.run(dry).unwrap(), RunOutcome::DryRun { rows: 1 });
    assert!(!repo.path().join("intermediate").exists());
}

#[test]
fn reset_reprocesses_everything() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    write_source(
        repo.path(),
        json!([
            {"id": "1", "home": "A", "created_at": "2023-01-01"},
            {"id": "2", "home": "B", "created_at": "2023-01-02"}
        ]),
    );
    let manager = ModelManager::new(&specs[0], &registry);
    manager.run(RunOptions::default()).unwrap();

    let reset = RunOptions {
        reset: true,
        ..RunOptions::default()
    };
    // dry run ignores the reset but still reads from the floor
    let dry_reset = RunOptions {
        dry_run: true,
        ..reset
    };
    assert_eq!(manager.run(dry_reset).unwrap(), RunOutcome::DryRun { rows: 2 });
    assert!(repo.path().join("intermediate/football_matches.json").exists());

    assert_eq!(manager.run(reset).unwrap(), RunOutcome::Completed { rows: 2 });
    let journal = VersionedFile::open(repo.path().join("intermediate/football_matches.json"))
        .unwrap()
        .last_write()
        .unwrap()
        .unwrap();
    assert_eq!(journal.version, 1);
    assert_eq!(journal.rows, 2);
}

#[test]
fn unparseable_source_version_fails_before_writing() {
    let repo = tempfile::tempdir().unwrap();
    let registry = ProcessorRegistry::builtin();
    let specs = models(repo.path());
    write_source(repo.path(), json!([{"id": "1", "home": "A", "created_at": "someday"}]));

    let err = ModelManager::new(&specs[0], &registry)
        .run(RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, fixture_pipeline::PipelineError::DataValidation(_)));
    assert!(!repo.path().join("intermediate/football_matches.json").exists());
}
