use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

pub type TPtF = f64;

/// Tolerance used when comparing coordinates that went through a scale and back.
pub const FLOAT_TOLERANCE: TPtF = 1e-9;

pub fn floats_close(x: TPtF, y: TPtF) -> bool {
    (x - y).abs() < FLOAT_TOLERANCE
}

pub type ShapeI = Shape<u32>;
pub type ShapeF = Shape<TPtF>;

/// Width and height, in pixels for images and canvases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Shape<T> {
    pub w: T,
    pub h: T,
}
impl<T> Shape<T> {
    pub fn new(w: T, h: T) -> Self {
        Self { w, h }
    }
}

impl ShapeI {
    pub fn from_im<I>(im: &I) -> Self
    where
        I: GenericImageView,
    {
        Self {
            w: im.width(),
            h: im.height(),
        }
    }
    pub fn max_side(&self) -> u32 {
        self.w.max(self.h)
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl From<ShapeI> for ShapeF {
    fn from(value: ShapeI) -> Self {
        Self {
            w: f64::from(value.w),
            h: f64::from(value.h),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct PtF {
    pub x: TPtF,
    pub y: TPtF,
}

impl PtF {
    pub fn len_square(&self) -> TPtF {
        self.x * self.x + self.y * self.y
    }
    pub fn is_close_to(&self, other: Self) -> bool {
        floats_close(self.x, other.x) && floats_close(self.y, other.y)
    }
    /// Moves the point into `[0, w] x [0, h]`.
    #[must_use]
    pub fn clamp_to(&self, shape: ShapeF) -> Self {
        Self {
            x: self.x.clamp(0.0, shape.w.max(0.0)),
            y: self.y.clamp(0.0, shape.h.max(0.0)),
        }
    }
    /// Nearest pixel, saturating at the limits of `i32`.
    pub fn round_signed(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Mul<TPtF> for PtF {
    type Output = Self;
    fn mul(self, rhs: TPtF) -> Self::Output {
        PtF {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}
impl Div<TPtF> for PtF {
    type Output = Self;
    fn div(self, rhs: TPtF) -> Self::Output {
        PtF {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}
impl Sub for PtF {
    type Output = PtF;
    fn sub(self, rhs: Self) -> Self::Output {
        PtF {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
impl Add for PtF {
    type Output = PtF;
    fn add(self, rhs: Self) -> Self::Output {
        PtF {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl From<(TPtF, TPtF)> for PtF {
    fn from(value: (TPtF, TPtF)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}
impl From<PtF> for (TPtF, TPtF) {
    fn from(p: PtF) -> (TPtF, TPtF) {
        (p.x, p.y)
    }
}

#[test]
fn test_point_ops() {
    let p = PtF { x: 2.0, y: 3.0 };
    let q = PtF { x: 1.0, y: 1.0 };
    assert_eq!(p - q, PtF { x: 1.0, y: 2.0 });
    assert_eq!(p + q, PtF { x: 3.0, y: 4.0 });
    assert_eq!(p * 2.0, PtF { x: 4.0, y: 6.0 });
    assert!((p / 2.0).is_close_to(PtF { x: 1.0, y: 1.5 }));
    assert_eq!((p - q).len_square(), 5.0);
    assert_eq!(<(f64, f64)>::from(p), (2.0, 3.0));
}

#[test]
fn test_clamp_and_round() {
    let shape = ShapeF::new(10.0, 5.0);
    assert_eq!(
        PtF { x: -3.0, y: 7.0 }.clamp_to(shape),
        PtF { x: 0.0, y: 5.0 }
    );
    assert_eq!(PtF { x: 4.0, y: 2.0 }.clamp_to(shape), PtF { x: 4.0, y: 2.0 });
    assert_eq!(PtF { x: -1.5, y: 2.4 }.round_signed(), (-2, 2));
    assert_eq!(PtF { x: 1e20, y: -1e20 }.round_signed(), (i32::MAX, i32::MIN));
}

#[test]
fn test_shape() {
    assert_eq!(ShapeI::new(1200, 1600).max_side(), 1600);
    assert_eq!(ShapeI::new(7, 3).max_side(), 7);
    assert!(ShapeI::new(0, 3).is_empty());
    let im = image::RgbaImage::new(4, 2);
    assert_eq!(ShapeI::from_im(&im), ShapeI::new(4, 2));
    assert_eq!(ShapeF::from(ShapeI::new(4, 2)), ShapeF::new(4.0, 2.0));
}
