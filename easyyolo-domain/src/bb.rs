use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{PtF, ShapeF, ShapeI, TPtF};
use crate::{result::YoloResult, yoloerr};

/// Axis-aligned box in image or display coordinates. `(x, y)` is the top-left corner.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct BbF {
    pub x: TPtF,
    pub y: TPtF,
    pub w: TPtF,
    pub h: TPtF,
}

impl BbF {
    /// `[x, y, w, h]`
    pub fn from_arr(a: &[TPtF; 4]) -> Self {
        BbF {
            x: a[0],
            y: a[1],
            w: a[2],
            h: a[3],
        }
    }

    pub fn x_max(&self) -> TPtF {
        self.x + self.w
    }

    pub fn y_max(&self) -> TPtF {
        self.y + self.h
    }

    pub fn shape(&self) -> ShapeF {
        ShapeF::new(self.w, self.h)
    }

    /// The box spanned by two arbitrary corners, regardless of the direction of the drag.
    pub fn from_points(p1: PtF, p2: PtF) -> Self {
        let x_min = p1.x.min(p2.x);
        let y_min = p1.y.min(p2.y);
        Self {
            x: x_min,
            y: y_min,
            w: p1.x.max(p2.x) - x_min,
            h: p1.y.max(p2.y) - y_min,
        }
    }

    pub fn min(&self) -> PtF {
        PtF {
            x: self.x,
            y: self.y,
        }
    }

    pub fn max(&self) -> PtF {
        PtF {
            x: self.x_max(),
            y: self.y_max(),
        }
    }

    pub fn covers_y(&self, y: TPtF) -> bool {
        self.y_max() >= y && self.y <= y
    }
    pub fn covers_x(&self, x: TPtF) -> bool {
        self.x_max() >= x && self.x <= x
    }

    /// Edges count as inside.
    pub fn contains<P>(&self, p: P) -> bool
    where
        P: Into<PtF>,
    {
        let p = p.into();
        self.covers_x(p.x) && self.covers_y(p.y)
    }

    pub fn area(&self) -> TPtF {
        self.w * self.h
    }

    /// Multiplies position and extent by `factor`.
    #[must_use]
    pub fn scale(&self, factor: TPtF) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            w: self.w * factor,
            h: self.h * factor,
        }
    }

    pub fn center(&self) -> PtF {
        PtF {
            x: self.x + self.w * 0.5,
            y: self.y + self.h * 0.5,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    pub fn has_positive_extent(&self) -> bool {
        self.w > 0.0 && self.h > 0.0
    }

    pub fn is_contained_in(&self, shape: ShapeF) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x + self.w <= shape.w && self.y + self.h <= shape.h
    }

    /// Cuts off everything outside of the image. Boxes completely outside are squashed onto the
    /// border and end up with zero extent.
    #[must_use]
    pub fn new_fit_to_image(x: f64, y: f64, w: f64, h: f64, shape: ShapeF) -> Self {
        let clip = |var: f64, size_bx: f64, size_im: f64| {
            if var < 0.0 {
                let size_bx = size_bx + var;
                (0.0, size_bx.clamp(0.0, size_im))
            } else {
                let var = var.min(size_im);
                (var, ((size_bx + var).min(size_im) - var).max(0.0))
            }
        };
        let (x, w) = clip(x, w, shape.w);
        let (y, h) = clip(y, h, shape.h);
        Self::from_arr(&[x, y, w, h])
    }

    #[must_use]
    pub fn fit_to_image(&self, shape: ShapeF) -> Self {
        Self::new_fit_to_image(self.x, self.y, self.w, self.h, shape)
    }

    /// Moves the box by `(x_shift, y_shift)` but keeps it completely inside the image. The extent
    /// is preserved unless the box is larger than the image.
    #[must_use]
    pub fn translate_within(&self, x_shift: f64, y_shift: f64, shape: ShapeF) -> Self {
        let w = self.w.min(shape.w);
        let h = self.h.min(shape.h);
        let x = (self.x + x_shift).clamp(0.0, (shape.w - w).max(0.0));
        let y = (self.y + y_shift).clamp(0.0, (shape.h - h).max(0.0));
        Self { x, y, w, h }
    }

    pub fn follow_movement(&self, from: PtF, to: PtF, shape: ShapeF) -> Self {
        self.translate_within(to.x - from.x, to.y - from.y, shape)
    }

    /// Intersection over union, 0 for disjoint boxes or boxes without area.
    pub fn iou(&self, other: &BbF) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Center based box normalized by the image size, i.e., `(cx, cy, w, h)` in `[0, 1]`.
    pub fn to_yolo_normalized(&self, shape: ShapeI) -> YoloResult<[f64; 4]> {
        if shape.is_empty() {
            return Err(yoloerr!(
                "cannot normalize box {:?} with empty image shape {:?}",
                self,
                shape
            ));
        }
        let (w_im, h_im) = (f64::from(shape.w), f64::from(shape.h));
        let c = self.center();
        Ok([c.x / w_im, c.y / h_im, self.w / w_im, self.h / h_im])
    }

    pub fn from_yolo_normalized(cxcywh: [f64; 4], shape: ShapeI) -> Self {
        let (w_im, h_im) = (f64::from(shape.w), f64::from(shape.h));
        let [cx, cy, w, h] = cxcywh;
        let w = w * w_im;
        let h = h * h_im;
        Self {
            x: cx * w_im - w * 0.5,
            y: cy * h_im - h * 0.5,
            w,
            h,
        }
    }

    pub fn all_corners_close(&self, other: BbF) -> bool {
        fn close_floats(a: f64, b: f64) -> bool {
            (a - b).abs() < 1e-8
        }
        close_floats(self.x, other.x)
            && close_floats(self.y, other.y)
            && close_floats(self.w, other.w)
            && close_floats(self.h, other.h)
    }
}

impl From<&[TPtF; 4]> for BbF {
    fn from(a: &[TPtF; 4]) -> Self {
        Self::from_arr(a)
    }
}

impl Display for BbF {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bb_str = format!("[{}, {}, {}, {}]", self.x, self.y, self.w, self.h);
        f.write_str(bb_str.as_str())
    }
}

#[test]
fn test_from_points_any_direction() {
    let anchor = PtF { x: 100.0, y: 100.0 };
    let expected = BbF::from_arr(&[50.0, 60.0, 50.0, 40.0]);
    assert_eq!(BbF::from_points(anchor, (50.0, 60.0).into()), expected);
    assert_eq!(BbF::from_points((50.0, 60.0).into(), anchor), expected);
    assert_eq!(
        BbF::from_points((100.0, 60.0).into(), (50.0, 100.0).into()),
        expected
    );
    let degenerate = BbF::from_points((2.0, 3.0).into(), (4.0, 3.0).into());
    assert_eq!(degenerate, BbF::from_arr(&[2.0, 3.0, 2.0, 0.0]));
    assert_eq!(degenerate.max(), PtF { x: 4.0, y: 3.0 });
}

#[test]
fn test_contains() {
    let bb = BbF::from_arr(&[10.0, 10.0, 20.0, 5.0]);
    assert!(bb.contains((10.0, 10.0)));
    assert!(bb.contains((30.0, 15.0)));
    assert!(!bb.contains((30.1, 15.0)));
    assert!(!bb.contains((9.9, 12.0)));
    assert!(bb.contains(PtF { x: 20.0, y: 12.5 }));
    assert_eq!(bb.x_max(), 30.0);
    assert_eq!(bb.y_max(), 15.0);
    assert_eq!(bb.shape(), ShapeF::new(20.0, 5.0));
    assert_eq!(bb.area(), 100.0);
}

#[test]
fn test_scale_roundtrip() {
    let bb = BbF::from_arr(&[200.0, 200.0, 400.0, 300.0]);
    for scale in [0.5, 0.1, 1.0, 0.333, 2.75] {
        assert!(bb.scale(scale).scale(1.0 / scale).all_corners_close(bb));
    }
}

#[test]
fn test_fit_and_translate() {
    let shape = ShapeF::new(100.0, 50.0);
    let bb = BbF::new_fit_to_image(-10.0, 40.0, 30.0, 30.0, shape);
    assert_eq!(bb, BbF::from_arr(&[0.0, 40.0, 20.0, 10.0]));
    assert!(bb.is_contained_in(shape));
    let bb = BbF::from_arr(&[10.0, 10.0, 20.0, 20.0]);
    assert_eq!(
        bb.translate_within(-50.0, 100.0, shape),
        BbF::from_arr(&[0.0, 30.0, 20.0, 20.0])
    );
    assert_eq!(
        bb.follow_movement((5.0, 5.0).into(), (6.0, 7.0).into(), shape),
        BbF::from_arr(&[11.0, 12.0, 20.0, 20.0])
    );
}

#[test]
fn test_iou() {
    let a = BbF::from_arr(&[0.0, 0.0, 10.0, 10.0]);
    let b = BbF::from_arr(&[5.0, 0.0, 10.0, 10.0]);
    assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-12);
    assert_eq!(a.iou(&a), 1.0);
    let c = BbF::from_arr(&[10.0, 10.0, 5.0, 5.0]);
    assert_eq!(a.iou(&c), 0.0);
}

#[test]
fn test_yolo_normalized() {
    let shape = ShapeI::new(200, 100);
    let bb = BbF::from_arr(&[50.0, 25.0, 100.0, 50.0]);
    let n = bb.to_yolo_normalized(shape).unwrap();
    assert_eq!(n, [0.5, 0.5, 0.5, 0.5]);
    assert!(BbF::from_yolo_normalized(n, shape).all_corners_close(bb));
    assert!(bb.to_yolo_normalized(ShapeI::new(0, 10)).is_err());
}

#[test]
fn test_from_arr_ref() {
    let bb: BbF = (&[23.4, 2.0, 15.2, 31.0]).into();
    assert_eq!(bb.min(), PtF { x: 23.4, y: 2.0 });
    assert!(bb.max().is_close_to(PtF { x: 38.6, y: 33.0 }));
}

#[test]
fn test_display() {
    let bb = BbF::from_arr(&[1.0, 2.5, 3.0, 4.0]);
    assert_eq!(format!("{bb}"), "[1, 2.5, 3, 4]");
}
