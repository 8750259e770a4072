//! Darknet/YOLO text labels: one line `<class_idx> <cx> <cy> <w> <h>` per box, everything
//! normalized by the natural image size.
use crate::annotations::{Annotation, AnnotationSet};
use easyyolo_domain::{yoloerr, BbF, ShapeI, YoloResult};

/// Class names in the order of their indices.
pub fn class_names(set: &AnnotationSet) -> Vec<String> {
    set.labels_sorted().into_iter().map(str::to_string).collect()
}

pub fn to_yolo_line(anno: &Annotation, class_idx: usize, shape: ShapeI) -> YoloResult<String> {
    let [cx, cy, w, h] = anno.bb().to_yolo_normalized(shape)?;
    Ok(format!("{class_idx} {cx:.6} {cy:.6} {w:.6} {h:.6}"))
}

/// Lines of the image `key`, class indices refer to [`class_names`] of the whole set.
pub fn yolo_lines(set: &AnnotationSet, key: &str, shape: ShapeI) -> YoloResult<Vec<String>> {
    let classes = class_names(set);
    set.get(key)
        .iter()
        .map(|anno| {
            let class_idx = classes
                .iter()
                .position(|c| c == &anno.label)
                .ok_or_else(|| yoloerr!("label {} has no class", anno.label))?;
            to_yolo_line(anno, class_idx, shape)
        })
        .collect()
}

/// Reads YOLO lines back into annotations with ids starting at `first_id`. Empty lines are
/// skipped.
pub fn parse_yolo_lines(
    text: &str,
    classes: &[String],
    shape: ShapeI,
    first_id: u64,
) -> YoloResult<Vec<Annotation>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            if tokens.len() != 5 {
                return Err(yoloerr!("expected 5 values in yolo line '{line}'"));
            }
            let class_idx = tokens[0]
                .parse::<usize>()
                .map_err(|e| yoloerr!("invalid class index in '{line}', {e}"))?;
            let label = classes
                .get(class_idx)
                .ok_or_else(|| yoloerr!("class index {class_idx} out of range"))?;
            let mut cxcywh = [0.0; 4];
            for (dst, token) in cxcywh.iter_mut().zip(&tokens[1..]) {
                *dst = token
                    .parse::<f64>()
                    .map_err(|e| yoloerr!("invalid number in '{line}', {e}"))?;
            }
            let bb = BbF::from_yolo_normalized(cxcywh, shape);
            let id = first_id
                .checked_add(i as u64)
                .ok_or_else(|| yoloerr!("no id left for yolo line {i} after {first_id}"))?;
            Ok(Annotation::new(id, bb, label.as_str(), 1.0))
        })
        .collect()
}

#[cfg(test)]
use crate::annotations::make_test_anno;

#[test]
fn test_yolo_lines() {
    let mut set = AnnotationSet::default();
    set.push("a.png", make_test_anno(1, [200.0, 200.0, 400.0, 300.0], "dog"));
    set.push("a.png", make_test_anno(2, [0.0, 0.0, 160.0, 120.0], "cat"));
    set.push("b.png", make_test_anno(3, [0.0, 0.0, 10.0, 10.0], "bird"));
    let shape = ShapeI::new(1600, 1200);
    let lines = yolo_lines(&set, "a.png", shape).unwrap();
    assert_eq!(
        lines,
        vec![
            "2 0.250000 0.291667 0.250000 0.250000".to_string(),
            "1 0.050000 0.050000 0.100000 0.100000".to_string(),
        ]
    );
    assert!(yolo_lines(&set, "missing.png", shape).unwrap().is_empty());
    assert!(yolo_lines(&set, "a.png", ShapeI::new(0, 0)).is_err());
}

#[test]
fn test_parse_yolo_lines() {
    let classes = vec!["bird".to_string(), "cat".to_string()];
    let shape = ShapeI::new(200, 100);
    let text = "1 0.5 0.5 0.5 0.2\n\n0 0.1 0.1 0.2 0.2\n";
    let annos = parse_yolo_lines(text, &classes, shape, 10).unwrap();
    assert_eq!(annos.len(), 2);
    assert_eq!(annos[0].label, "cat");
    assert!(annos[0].bb().all_corners_close(BbF::from_arr(&[50.0, 40.0, 100.0, 20.0])));
    assert_eq!(annos[1].id, 11);
    assert!(parse_yolo_lines("5 0.5 0.5 0.1 0.1", &classes, shape, 0).is_err());
    assert!(parse_yolo_lines("0 0.5 0.5 0.1", &classes, shape, 0).is_err());
    assert!(parse_yolo_lines("0 a 0.5 0.1 0.1", &classes, shape, 0).is_err());
}

#[test]
fn test_parse_yolo_lines_id_range() {
    let classes = vec!["bird".to_string()];
    let shape = ShapeI::new(100, 100);
    let one = "0 0.5 0.5 0.2 0.2";
    let annos = parse_yolo_lines(one, &classes, shape, u64::MAX).unwrap();
    assert_eq!(annos[0].id, u64::MAX);
    let two = "0 0.5 0.5 0.2 0.2\n0 0.3 0.3 0.1 0.1";
    assert!(parse_yolo_lines(two, &classes, shape, u64::MAX).is_err());
    assert_eq!(
        parse_yolo_lines(two, &classes, shape, u64::MAX - 1).unwrap()[1].id,
        u64::MAX
    );
}
