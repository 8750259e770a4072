use easyyolo_domain::{
    display_scale, orig_pos_to_view_pos, orig_to_view, shape_scaled, view_pos_to_orig_pos,
    view_to_orig, BbF, PtF, ShapeF, ShapeI, TPtF,
};
use image::{imageops, imageops::FilterType, RgbaImage};

/// Relation between the canvas an image is shown on and the image itself. Annotations live in
/// image space, pointers and drawing in display space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// display pixels per image pixel
    pub scale: TPtF,
    pub shape_orig: ShapeI,
    pub shape_view: ShapeI,
}
impl Viewport {
    pub fn new(shape_orig: ShapeI, max_display_size: u32) -> Self {
        let scale = display_scale(shape_orig, max_display_size);
        Self {
            scale,
            shape_orig,
            shape_view: shape_scaled(shape_orig, scale),
        }
    }
    pub fn to_image_space(&self, bb_view: BbF) -> BbF {
        view_to_orig(bb_view, self.scale)
    }
    pub fn to_display_space(&self, bb_orig: BbF) -> BbF {
        orig_to_view(bb_orig, self.scale)
    }
    pub fn pos_to_image_space(&self, pos_view: PtF) -> PtF {
        view_pos_to_orig_pos(pos_view, self.scale)
    }
    pub fn pos_to_display_space(&self, pos_orig: PtF) -> PtF {
        orig_pos_to_view_pos(pos_orig, self.scale)
    }
    pub fn canvas(&self) -> ShapeF {
        self.shape_view.into()
    }
    pub fn image(&self) -> ShapeF {
        self.shape_orig.into()
    }
}

/// Scales the image to the canvas of the viewport. Nothing is copied if the sizes match.
pub fn scale_to_canvas(im: &RgbaImage, viewport: &Viewport) -> Option<RgbaImage> {
    let shape_view = viewport.shape_view;
    if ShapeI::from_im(im) == shape_view || shape_view.is_empty() {
        None
    } else {
        Some(imageops::resize(
            im,
            shape_view.w,
            shape_view.h,
            FilterType::Triangle,
        ))
    }
}

#[test]
fn test_viewport() {
    let vp = Viewport::new(ShapeI::new(1600, 1200), 800);
    assert_eq!(vp.scale, 0.5);
    assert_eq!(vp.shape_view, ShapeI::new(800, 600));
    let bb_view = BbF::from_arr(&[100.0, 100.0, 200.0, 150.0]);
    let bb_orig = vp.to_image_space(bb_view);
    assert_eq!(bb_orig, BbF::from_arr(&[200.0, 200.0, 400.0, 300.0]));
    assert!(vp.to_display_space(bb_orig).all_corners_close(bb_view));
    let p = vp.pos_to_image_space(PtF { x: 10.0, y: 4.0 });
    assert!(p.is_close_to(PtF { x: 20.0, y: 8.0 }));
    assert!(vp.pos_to_display_space(p).is_close_to(PtF { x: 10.0, y: 4.0 }));

    let small = Viewport::new(ShapeI::new(320, 200), 800);
    assert_eq!(small.scale, 1.0);
    assert_eq!(small.canvas(), ShapeF::new(320.0, 200.0));
}

#[test]
fn test_scale_to_canvas() {
    let im = RgbaImage::new(40, 20);
    let vp = Viewport::new(ShapeI::from_im(&im), 20);
    let scaled = scale_to_canvas(&im, &vp).unwrap();
    assert_eq!(scaled.dimensions(), (20, 10));
    let vp = Viewport::new(ShapeI::from_im(&im), 800);
    assert!(scale_to_canvas(&im, &vp).is_none());
}
