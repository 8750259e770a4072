use crate::result::trace_ok_warn;
use chrono::Utc;
use easyyolo_domain::{yoloerr, BbF, YoloResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

fn default_confidence() -> f64 {
    1.0
}

/// One labeled box in image space.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    /// 1 for boxes drawn by a human, below 1 for machine suggestions
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Annotation {
    pub fn new(id: u64, bb: BbF, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            id,
            x: bb.x,
            y: bb.y,
            width: bb.w,
            height: bb.h,
            label: label.into(),
            confidence,
        }
    }
    pub fn bb(&self) -> BbF {
        BbF::from_arr(&[self.x, self.y, self.width, self.height])
    }
    /// Rewrites the geometry, identity and label stay.
    pub fn set_bb(&mut self, bb: BbF) {
        self.x = bb.x;
        self.y = bb.y;
        self.width = bb.w;
        self.height = bb.h;
    }
    pub fn iou(&self, other: &Annotation) -> f64 {
        self.bb().iou(&other.bb())
    }
    pub fn validate(&self) -> YoloResult<()> {
        let bb = self.bb();
        if !bb.is_finite() {
            Err(yoloerr!("annotation {} has non-finite coordinates", self.id))
        } else if self.x < 0.0 || self.y < 0.0 {
            Err(yoloerr!("annotation {} starts outside the image", self.id))
        } else if !bb.has_positive_extent() {
            Err(yoloerr!(
                "annotation {} has no extent, {}x{}",
                self.id,
                self.width,
                self.height
            ))
        } else if self.label.trim().is_empty() {
            Err(yoloerr!("annotation {} has an empty label", self.id))
        } else if !(0.0..=1.0).contains(&self.confidence) {
            Err(yoloerr!(
                "confidence {} of annotation {} not in [0, 1]",
                self.confidence,
                self.id
            ))
        } else {
            Ok(())
        }
    }
}

/// Creation time in milliseconds but strictly larger than `last` such that two boxes created
/// within the same millisecond still differ. `None` if `last` is already `u64::MAX`.
pub fn fresh_id(last: Option<u64>) -> Option<u64> {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    match last {
        Some(last) if last >= now => last.checked_add(1),
        _ => Some(now),
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_images: usize,
    pub total_annotations: usize,
    pub annotations_by_class: BTreeMap<String, usize>,
}

/// Annotations of all images keyed by image name. The order inside one image is the drawing
/// order, later boxes are on top.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct AnnotationSet {
    images: BTreeMap<String, Vec<Annotation>>,
}

impl AnnotationSet {
    pub fn get(&self, key: &str) -> &[Annotation] {
        self.images.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Vec<Annotation>> {
        self.images.get_mut(key)
    }
    pub fn push(&mut self, key: &str, anno: Annotation) {
        self.images.entry(key.to_string()).or_default().push(anno);
    }
    /// Removes the annotation at `idx` keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str, idx: usize) -> Option<Annotation> {
        let annos = self.images.get_mut(key)?;
        if idx < annos.len() {
            Some(annos.remove(idx))
        } else {
            None
        }
    }
    /// Removes all given indices, duplicates and indices out of range are ignored. Returns the
    /// number of removed annotations.
    pub fn remove_multiple(&mut self, key: &str, indices: &[usize]) -> usize {
        let mut indices = indices.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|idx| self.remove(key, idx))
            .count()
    }
    pub fn clear(&mut self) {
        self.images.clear();
    }
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.images.keys()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Annotation>)> {
        self.images.iter()
    }
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
    pub fn total_annotations(&self) -> usize {
        self.images.values().map(Vec::len).sum()
    }
    pub fn max_id(&self) -> Option<u64> {
        self.images.values().flatten().map(|a| a.id).max()
    }
    /// Drops annotations that fail [`Annotation::validate`] together with images left without
    /// annotations by that. Returns the number of dropped annotations.
    pub fn retain_valid(&mut self) -> usize {
        let mut n_dropped = 0;
        self.images.retain(|key, annos| {
            let n_before = annos.len();
            annos.retain(|anno| trace_ok_warn(anno.validate()).is_some());
            let n_dropped_here = n_before - annos.len();
            if n_dropped_here > 0 {
                warn!("dropped {n_dropped_here} invalid annotations of {key}");
            }
            n_dropped += n_dropped_here;
            n_dropped_here == 0 || !annos.is_empty()
        });
        n_dropped
    }
    /// Smallest id not used by any annotation.
    pub fn free_id(&self) -> u64 {
        let used = self
            .images
            .values()
            .flatten()
            .map(|a| a.id)
            .collect::<BTreeSet<_>>();
        (0..=u64::MAX)
            .find(|id| !used.contains(id))
            .unwrap_or_default()
    }
    /// Distinct labels in lexicographic order, the position of a label is its class index.
    pub fn labels_sorted(&self) -> Vec<&str> {
        let mut labels = self
            .images
            .values()
            .flatten()
            .map(|a| a.label.as_str())
            .collect::<Vec<_>>();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
    pub fn statistics(&self) -> Statistics {
        let mut annotations_by_class = BTreeMap::new();
        for anno in self.images.values().flatten() {
            *annotations_by_class.entry(anno.label.clone()).or_insert(0) += 1;
        }
        Statistics {
            total_images: self.image_count(),
            total_annotations: self.total_annotations(),
            annotations_by_class,
        }
    }
}

impl FromIterator<(String, Vec<Annotation>)> for AnnotationSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Annotation>)>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub fn make_test_anno(id: u64, xywh: [f64; 4], label: &str) -> Annotation {
    Annotation::new(id, BbF::from_arr(&xywh), label, 1.0)
}

#[test]
fn test_serde_confidence_default() {
    let s = r#"{"id": 7, "x": 1, "y": 2, "width": 3, "height": 4.5, "label": "cat"}"#;
    let anno: Annotation = serde_json::from_str(s).unwrap();
    assert_eq!(anno.confidence, 1.0);
    assert_eq!(anno.bb(), BbF::from_arr(&[1.0, 2.0, 3.0, 4.5]));
    let v = serde_json::to_value(&anno).unwrap();
    assert_eq!(v["width"], 3.0);
    assert_eq!(v["confidence"], 1.0);
}

#[test]
fn test_validate() {
    let good = make_test_anno(1, [0.0, 0.0, 10.0, 10.0], "cat");
    assert!(good.validate().is_ok());
    let mut bad = good.clone();
    bad.width = 0.0;
    assert!(bad.validate().is_err());
    let mut bad = good.clone();
    bad.x = -1.0;
    assert!(bad.validate().is_err());
    let mut bad = good.clone();
    bad.label = "  ".into();
    assert!(bad.validate().is_err());
    let mut bad = good.clone();
    bad.confidence = 1.5;
    assert!(bad.validate().is_err());
    let mut bad = good;
    bad.y = f64::NAN;
    assert!(bad.validate().is_err());
}

#[test]
fn test_set_remove() {
    let mut set = AnnotationSet::default();
    assert!(set.get("a.png").is_empty());
    for i in 0..5 {
        set.push("a.png", make_test_anno(i, [0.0, 0.0, 10.0, 10.0], "cat"));
    }
    set.push("b.png", make_test_anno(9, [1.0, 1.0, 5.0, 5.0], "dog"));
    assert_eq!(set.image_count(), 2);
    assert_eq!(set.total_annotations(), 6);
    assert_eq!(set.max_id(), Some(9));

    let removed = set.remove("a.png", 1).unwrap();
    assert_eq!(removed.id, 1);
    let ids = set.get("a.png").iter().map(|a| a.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![0, 2, 3, 4]);
    assert!(set.remove("a.png", 10).is_none());
    assert!(set.remove("c.png", 0).is_none());

    assert_eq!(set.remove_multiple("a.png", &[0, 3, 3, 17]), 2);
    let ids = set.get("a.png").iter().map(|a| a.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_statistics() {
    let mut set = AnnotationSet::default();
    set.push("a.png", make_test_anno(1, [0.0, 0.0, 10.0, 10.0], "cat"));
    set.push("a.png", make_test_anno(2, [0.0, 0.0, 10.0, 10.0], "dog"));
    set.push("b.png", make_test_anno(3, [0.0, 0.0, 10.0, 10.0], "cat"));
    let stats = set.statistics();
    assert_eq!(stats.total_images, 2);
    assert_eq!(stats.total_annotations, 3);
    assert_eq!(stats.annotations_by_class["cat"], 2);
    assert_eq!(stats.annotations_by_class["dog"], 1);
    assert_eq!(set.labels_sorted(), vec!["cat", "dog"]);
    let v = serde_json::to_value(&stats).unwrap();
    assert_eq!(v["totalImages"], 2);
    assert_eq!(v["annotationsByClass"]["cat"], 2);
}

#[test]
fn test_fresh_id() {
    let a = fresh_id(None);
    let b = fresh_id(a);
    assert!(b > a);
    assert_eq!(fresh_id(Some(u64::MAX - 1)), Some(u64::MAX));
    assert_eq!(fresh_id(Some(u64::MAX)), None);
}

#[test]
fn test_retain_valid() {
    let mut set = AnnotationSet::default();
    set.push("a.jpg", make_test_anno(1, [0.0, 0.0, 5.0, 5.0], "cat"));
    set.push("a.jpg", make_test_anno(2, [0.0, 0.0, -5.0, 5.0], "cat"));
    set.push("b.jpg", make_test_anno(3, [0.0, 0.0, 5.0, 5.0], " "));
    set.push("c.jpg", make_test_anno(4, [1.0, 1.0, 2.0, 2.0], "dog"));
    assert_eq!(set.retain_valid(), 2);
    assert_eq!(set.image_count(), 2);
    assert_eq!(set.get("a.jpg").len(), 1);
    assert_eq!(set.get("a.jpg")[0].id, 1);
    assert!(set.get("b.jpg").is_empty());
    assert_eq!(set.retain_valid(), 0);
}

#[test]
fn test_free_id() {
    let mut set = AnnotationSet::default();
    assert_eq!(set.free_id(), 0);
    set.push("a.jpg", make_test_anno(0, [0.0, 0.0, 5.0, 5.0], "cat"));
    set.push("a.jpg", make_test_anno(u64::MAX, [0.0, 0.0, 5.0, 5.0], "cat"));
    set.push("b.jpg", make_test_anno(1, [0.0, 0.0, 5.0, 5.0], "dog"));
    assert_eq!(set.free_id(), 2);
}
