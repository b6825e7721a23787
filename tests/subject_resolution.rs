use std::fs;
use std::path::Path;

use bidsvars::constants::groups::DATASET_GROUP;
use bidsvars::{
    ConfigModel, DirectoryIndex, FileTypeCatalog, KeyNames, LabelLevel, Scalar, SubjectResolver,
    Value, Wildcard, WildcardPolicy, standard_model,
};

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("relative path has no parent"))
        .expect("failed creating dataset dirs");
    fs::write(&path, b"").expect("failed writing dataset file");
}

fn write_sidecar(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("relative path has no parent"))
        .expect("failed creating dataset dirs");
    fs::write(&path, body).expect("failed writing sidecar");
}

fn set_many(model: &mut ConfigModel, label: &str, values: &[&str]) {
    let value = Value::Many(values.iter().map(|value| Scalar::from(*value)).collect());
    model
        .group_mut(DATASET_GROUP)
        .unwrap()
        .get_mut(label)
        .unwrap()
        .set_value(value)
        .unwrap();
}

fn study_model() -> ConfigModel {
    let mut model = standard_model(
        "study",
        &["func", "fmap", "physio"],
        LabelLevel::Minimal,
        FileTypeCatalog::builtin(),
    )
    .expect("failed building standard model");
    // Runs are not part of the minimal label set.
    model
        .group_mut(DATASET_GROUP)
        .unwrap()
        .add(
            Wildcard::new(
                "func_run",
                None,
                WildcardPolicy {
                    iterable: true,
                    ..WildcardPolicy::default()
                },
            )
            .unwrap(),
        )
        .unwrap();
    set_many(&mut model, "func_task", &["mid"]);
    set_many(&mut model, "func_run", &["1", "2"]);
    set_many(&mut model, "func_suffix", &["bold"]);
    set_many(&mut model, "fmap_suffix", &["phasediff"]);
    set_many(&mut model, "physio_recording", &["cardiac"]);
    set_many(&mut model, "physio_suffix", &["physio"]);
    model
}

#[test]
fn complete_subjects_survive_a_directory_resolution() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let root = temp.path();

    touch(root, "sub-1/func/sub-1_task-mid_run-1_bold.nii.gz");
    touch(root, "sub-1/func/sub-1_task-mid_run-2_bold.nii.gz");
    touch(
        root,
        "sub-1/func/sub-1_task-mid_run-1_recording-cardiac_physio.tsv.gz",
    );
    touch(root, "sub-1/fmap/sub-1_phasediff.nii.gz");
    write_sidecar(
        root,
        "sub-1/fmap/sub-1_phasediff.json",
        r#"{"IntendedFor": ["sub-1_task-mid_run-1_bold.nii.gz"]}"#,
    );
    // Subject 2 misses the second functional run.
    touch(root, "sub-2/func/sub-2_task-mid_run-1_bold.nii.gz");
    touch(
        root,
        "sub-2/func/sub-2_task-mid_run-1_recording-cardiac_physio.tsv.gz",
    );
    touch(root, "sub-2/fmap/sub-2_phasediff.nii.gz");
    write_sidecar(
        root,
        "sub-2/fmap/sub-2_phasediff.json",
        r#"{"IntendedFor": ["sub-2_task-mid_run-1_bold.nii.gz"]}"#,
    );

    let index = DirectoryIndex::open(root).expect("failed indexing dataset tree");
    let mut model = study_model();
    let resolver =
        SubjectResolver::new(&index, KeyNames::builtin(), FileTypeCatalog::builtin());
    let report = resolver.resolve(&mut model).expect("resolution failed");

    // Two runs, one fieldmap, one recording per subject.
    assert_eq!(report.expected_per_subject, 4);
    assert_eq!(report.retained, vec!["1"]);
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].subject, "2");
    assert_eq!(report.excluded[0].observed, 3);
    assert!(
        report
            .log
            .contains(&"subject 2 not included. Has 3 of 4 required files.".to_string())
    );

    let subject = model
        .group(DATASET_GROUP)
        .unwrap()
        .get("subject")
        .unwrap()
        .value()
        .cloned()
        .unwrap();
    assert_eq!(subject, Value::Many(vec![Scalar::from("1")]));
}

#[test]
fn unreadable_fieldmap_sidecars_count_toward_the_subject() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let root = temp.path();

    touch(root, "sub-1/func/sub-1_task-mid_run-1_bold.nii.gz");
    touch(root, "sub-1/func/sub-1_task-mid_run-2_bold.nii.gz");
    touch(
        root,
        "sub-1/func/sub-1_task-mid_run-1_recording-cardiac_physio.tsv.gz",
    );
    touch(root, "sub-1/fmap/sub-1_phasediff.nii.gz");
    write_sidecar(root, "sub-1/fmap/sub-1_phasediff.json", "{not json");

    let index = DirectoryIndex::open(root).expect("failed indexing dataset tree");
    let mut model = study_model();
    let resolver =
        SubjectResolver::new(&index, KeyNames::builtin(), FileTypeCatalog::builtin());
    let report = resolver.resolve(&mut model).expect("resolution failed");

    assert_eq!(report.retained, vec!["1"]);
    assert!(report.excluded.is_empty());
}

#[test]
fn resolved_subjects_persist_through_the_document() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let dataset = temp.path().join("dataset");
    fs::create_dir(&dataset).expect("failed creating dataset root");

    touch(&dataset, "sub-1/func/sub-1_task-mid_run-1_bold.nii.gz");
    touch(&dataset, "sub-1/func/sub-1_task-mid_run-2_bold.nii.gz");
    touch(
        &dataset,
        "sub-1/func/sub-1_task-mid_run-1_recording-cardiac_physio.tsv.gz",
    );
    touch(&dataset, "sub-1/fmap/sub-1_phasediff.nii.gz");
    write_sidecar(
        &dataset,
        "sub-1/fmap/sub-1_phasediff.json",
        r#"{"IntendedFor": ["sub-1_task-mid_run-1_bold.nii.gz"]}"#,
    );

    let index = DirectoryIndex::open(&dataset).expect("failed indexing dataset tree");
    let mut model = study_model();
    SubjectResolver::new(&index, KeyNames::builtin(), FileTypeCatalog::builtin())
        .resolve(&mut model)
        .expect("resolution failed");

    let path = temp.path().join("study.json");
    model.save_to(&path).expect("failed saving model");
    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        document["study"][DATASET_GROUP]["subject"],
        serde_json::json!(["1"])
    );
}
