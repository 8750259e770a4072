use crate::{
    annotations::AnnotationSet,
    file_util::{self, key_to_filename},
    result::trace_ok_err,
};
use chrono::{SecondsFormat, Utc};
use easyyolo_domain::{to_yolo, yoloerr, YoloResult};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

/// Minimal string store the annotation set is written to after each change.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> YoloResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> YoloResult<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> YoloResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }
    fn set(&mut self, key: &str, value: &str) -> YoloResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One json file per key inside `folder`. The folder is created with the first write.
#[derive(Clone, Debug)]
pub struct FileStore {
    folder: PathBuf,
}
impl FileStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
    pub fn folder(&self) -> &Path {
        &self.folder
    }
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.folder.join(key_to_filename(key))
    }
}
impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> YoloResult<Option<String>> {
        let path = self.path_of(key);
        if path.exists() {
            file_util::read_to_string(&path).map(Some)
        } else {
            Ok(None)
        }
    }
    fn set(&mut self, key: &str, value: &str) -> YoloResult<()> {
        let path = self.path_of(key);
        file_util::write(&path, value)?;
        debug!("wrote {} bytes to {path:?}", value.len());
        Ok(())
    }
}

/// Reads the annotation set stored under `key`. Missing entries, failing stores and broken json
/// all result in an empty set.
pub fn load_annotations(store: &impl KeyValueStore, key: &str) -> AnnotationSet {
    let Some(Some(json_str)) = trace_ok_err(store.get(key)) else {
        return AnnotationSet::default();
    };
    match serde_json::from_str::<AnnotationSet>(&json_str) {
        Ok(mut set) => {
            set.retain_valid();
            set
        }
        Err(e) => {
            error!("stored annotations under {key} are malformed, starting empty. {e:?}");
            AnnotationSet::default()
        }
    }
}

pub fn save_annotations(
    store: &mut impl KeyValueStore,
    key: &str,
    set: &AnnotationSet,
) -> YoloResult<()> {
    let json_str = serde_json::to_string(set).map_err(to_yolo)?;
    store.set(key, &json_str)
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub export_date: String,
    pub image_count: usize,
    pub total_annotations: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ExportDoc {
    pub annotations: AnnotationSet,
    pub metadata: ExportMetadata,
}
impl ExportDoc {
    pub fn new(annotations: AnnotationSet) -> Self {
        let metadata = ExportMetadata {
            export_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            image_count: annotations.image_count(),
            total_annotations: annotations.total_annotations(),
        };
        Self {
            annotations,
            metadata,
        }
    }
}

pub fn export_to_string(set: &AnnotationSet) -> YoloResult<String> {
    serde_json::to_string_pretty(&ExportDoc::new(set.clone())).map_err(to_yolo)
}

pub fn export_to_path<P>(set: &AnnotationSet, path: P) -> YoloResult<()>
where
    P: AsRef<Path> + Debug,
{
    let json_str = export_to_string(set)?;
    file_util::write(&path, json_str)?;
    info!(
        "exported {} annotations of {} images to {path:?}",
        set.total_annotations(),
        set.image_count()
    );
    Ok(())
}

/// Only the `annotations` entry of the document is used, metadata is optional. Invalid
/// annotations are dropped with a warning.
pub fn import_from_str(json_str: &str) -> YoloResult<AnnotationSet> {
    let mut doc: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| yoloerr!("could not parse import file, {e}"))?;
    let annotations = doc
        .get_mut("annotations")
        .map(serde_json::Value::take)
        .ok_or_else(|| yoloerr!("import file has no annotations"))?;
    let mut set: AnnotationSet = serde_json::from_value(annotations)
        .map_err(|e| yoloerr!("annotations in import file are malformed, {e}"))?;
    let n_dropped = set.retain_valid();
    if n_dropped > 0 {
        info!("skipped {n_dropped} invalid annotations while importing");
    }
    Ok(set)
}

pub fn import_from_path<P>(path: P) -> YoloResult<AnnotationSet>
where
    P: AsRef<Path> + Debug,
{
    let bytes = fs::read(&path).map_err(|e| yoloerr!("could not read {path:?}, {e:?}"))?;
    let json_str = String::from_utf8(bytes).map_err(to_yolo)?;
    import_from_str(&json_str)
}

#[cfg(test)]
use crate::{
    annotations::make_test_anno, defer_folder_removal, file_util::DEFAULT_TMPDIR,
    tracing_setup::init_tracing_for_tests,
};

#[cfg(test)]
fn make_set() -> AnnotationSet {
    let mut set = AnnotationSet::default();
    set.push("a.png", make_test_anno(1, [0.0, 0.0, 10.0, 10.0], "cat"));
    set.push("a.png", make_test_anno(2, [5.0, 6.0, 11.5, 20.0], "dog"));
    set.push("b.png", make_test_anno(3, [1.0, 2.0, 3.0, 4.0], "cat"));
    set
}

#[test]
fn test_save_load() {
    let key = "easyYoloAnnotations";
    let mut store = MemoryStore::new();
    assert!(load_annotations(&store, key).is_empty());
    for set in [AnnotationSet::default(), make_set()] {
        save_annotations(&mut store, key, &set).unwrap();
        assert_eq!(load_annotations(&store, key), set);
    }
}

#[test]
fn test_load_malformed() {
    init_tracing_for_tests();
    let key = "easyYoloAnnotations";
    let mut store = MemoryStore::new();
    store.set(key, "{not json").unwrap();
    assert!(load_annotations(&store, key).is_empty());
    store.set(key, r#"{"a.png": [{"id": 1}]}"#).unwrap();
    assert!(load_annotations(&store, key).is_empty());
    let invalid_height = r#"{"a.png": [
        {"id": 1, "x": 0, "y": 0, "width": 4, "height": -4, "label": "a"},
        {"id": 2, "x": 0, "y": 0, "width": 4, "height": 4, "label": "a"}
    ]}"#;
    store.set(key, invalid_height).unwrap();
    let loaded = load_annotations(&store, key);
    assert_eq!(loaded.total_annotations(), 1);
    assert_eq!(loaded.get("a.png")[0].id, 2);
}

#[test]
fn test_file_store() {
    let folder = DEFAULT_TMPDIR.join("persistence_test_file_store");
    defer_folder_removal!(&folder);
    let mut store = FileStore::new(&folder);
    assert_eq!(store.get("key").unwrap(), None);
    let set = make_set();
    save_annotations(&mut store, "key", &set).unwrap();
    assert!(store.path_of("key").exists());
    assert_eq!(load_annotations(&store, "key"), set);
}

#[test]
fn test_export_import() {
    let set = make_set();
    let s = export_to_string(&set).unwrap();
    let v: serde_json::Value = serde_json::from_str(&s).unwrap();
    assert_eq!(v["metadata"]["imageCount"], 2);
    assert_eq!(v["metadata"]["totalAnnotations"], 3);
    assert!(v["metadata"]["exportDate"].as_str().unwrap().ends_with('Z'));
    assert_eq!(import_from_str(&s).unwrap(), set);

    let only_annos = r#"{"annotations": {"x.jpg": [{"id": 4, "x": 0, "y": 0, "width": 4, "height": 4, "label": "a"}]}}"#;
    let imported = import_from_str(only_annos).unwrap();
    assert_eq!(imported.total_annotations(), 1);
    assert_eq!(imported.get("x.jpg")[0].confidence, 1.0);

    let with_invalid = r#"{"annotations": {
        "x.jpg": [
            {"id": 4, "x": 0, "y": 0, "width": 4, "height": 4, "label": "a"},
            {"id": 5, "x": -3, "y": 0, "width": 4, "height": 4, "label": "a"},
            {"id": 6, "x": 1, "y": 1, "width": 0, "height": 4, "label": "a"}
        ],
        "y.jpg": [{"id": 7, "x": 1, "y": 1, "width": 2, "height": 2, "label": "b", "confidence": 3.0}]
    }}"#;
    let imported = import_from_str(with_invalid).unwrap();
    assert_eq!(imported.total_annotations(), 1);
    assert_eq!(imported.get("x.jpg")[0].id, 4);
    assert_eq!(imported.image_count(), 1);

    assert!(import_from_str(r#"{"metadata": {}}"#).is_err());
    assert!(import_from_str("[1, 2").is_err());
    assert!(import_from_str(r#"{"annotations": 5}"#).is_err());
}

#[test]
fn test_export_import_path() {
    let folder = DEFAULT_TMPDIR.join("persistence_test_export_import_path");
    defer_folder_removal!(&folder);
    let path = folder.join("export.json");
    let set = make_set();
    export_to_path(&set, &path).unwrap();
    assert_eq!(import_from_path(&path).unwrap(), set);
    assert!(import_from_path(folder.join("missing.json")).is_err());
}
