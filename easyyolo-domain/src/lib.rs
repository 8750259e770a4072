//! Geometry of the image domain for the EasyYOLO annotation editor: points, shapes and
//! axis-aligned boxes, plus the conversions between display space and image space.
mod bb;
mod core;
pub mod result;
pub use bb::BbF;
pub use core::{floats_close, PtF, Shape, ShapeF, ShapeI, TPtF, FLOAT_TOLERANCE};
pub use result::{to_yolo, YoloError, YoloResult};

/// Display pixels per image pixel such that the longer side of the image fits into
/// `max_display_size`. Images are never enlarged and a display size of zero means no limit.
pub fn display_scale(shape_orig: ShapeI, max_display_size: u32) -> TPtF {
    let max_side = shape_orig.max_side();
    if max_side == 0 || max_display_size == 0 || max_side <= max_display_size {
        1.0
    } else {
        TPtF::from(max_display_size) / TPtF::from(max_side)
    }
}

/// Size of the canvas an image of shape `shape_orig` is displayed on at `scale`.
pub fn shape_scaled(shape_orig: ShapeI, scale: TPtF) -> ShapeI {
    let w = (TPtF::from(shape_orig.w) * scale).round();
    let h = (TPtF::from(shape_orig.h) * scale).round();
    ShapeI::new(w as u32, h as u32)
}

/// Display space to image space.
pub fn view_to_orig(bb: BbF, scale: TPtF) -> BbF {
    bb.scale(1.0 / scale)
}

/// Image space to display space.
pub fn orig_to_view(bb: BbF, scale: TPtF) -> BbF {
    bb.scale(scale)
}

pub fn view_pos_to_orig_pos(pos: PtF, scale: TPtF) -> PtF {
    pos / scale
}

pub fn orig_pos_to_view_pos(pos: PtF, scale: TPtF) -> PtF {
    pos * scale
}

#[cfg(test)]
fn make_test_bbs() -> Vec<BbF> {
    vec![
        BbF::from_arr(&[0.0, 0.0, 10.0, 10.0]),
        BbF::from_arr(&[5.0, 5.0, 10.0, 10.0]),
        BbF::from_arr(&[9.0, 9.0, 10.0, 10.0]),
    ]
}

#[test]
fn test_display_scale() {
    assert_eq!(display_scale(ShapeI::new(1600, 1200), 800), 0.5);
    assert_eq!(display_scale(ShapeI::new(1200, 1600), 800), 0.5);
    assert_eq!(display_scale(ShapeI::new(640, 480), 800), 1.0);
    assert_eq!(display_scale(ShapeI::new(800, 800), 800), 1.0);
    assert_eq!(display_scale(ShapeI::new(0, 0), 800), 1.0);
    assert_eq!(display_scale(ShapeI::new(1600, 1200), 0), 1.0);
    assert_eq!(
        shape_scaled(ShapeI::new(1600, 1200), 0.5),
        ShapeI::new(800, 600)
    );
    let scale = display_scale(ShapeI::new(1000, 333), 800);
    assert_eq!(shape_scaled(ShapeI::new(1000, 333), scale), ShapeI::new(800, 266));
}

#[test]
fn test_view_orig_roundtrip() {
    for bb in make_test_bbs() {
        for scale in [0.5, 0.25, 1.0, 0.8, 0.123_456, 3.0] {
            let back = view_to_orig(orig_to_view(bb, scale), scale);
            assert!(back.all_corners_close(bb), "{bb:?} vs {back:?}, scale {scale}");
        }
    }
    let p = PtF { x: 150.0, y: 90.0 };
    assert!(orig_pos_to_view_pos(view_pos_to_orig_pos(p, 0.3), 0.3).is_close_to(p));
}

#[test]
fn test_serde_layout() {
    let bb = BbF::from_arr(&[1.0, 2.0, 3.0, 4.0]);
    let s = serde_json::to_string(&bb).unwrap();
    assert_eq!(s, r#"{"x":1.0,"y":2.0,"w":3.0,"h":4.0}"#);
}
