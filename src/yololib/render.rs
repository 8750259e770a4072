use crate::{annotations::Annotation, cfg::EditorCfg, cfg::Rgba, util::label_text, view::Viewport};
use easyyolo_domain::{BbF, PtF, ShapeI};
use image::RgbaImage;

/// Whatever the editor paints on, coordinates are in display space.
pub trait RenderSurface {
    fn resize(&mut self, shape: ShapeI);
    fn clear(&mut self);
    /// Draws the image with its top-left corner at the canvas origin.
    fn draw_image(&mut self, im: &RgbaImage);
    fn stroke_rect(&mut self, bb: BbF, color: Rgba, thickness: f64);
    /// Fills the rectangle and blends with the alpha channel of `color`.
    fn fill_rect(&mut self, bb: BbF, color: Rgba);
    /// `pos` is the top-left corner of the text.
    fn fill_text(&mut self, text: &str, pos: PtF, color: Rgba, font_size: f64);
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

/// Everything visible. Rendering only reads it.
pub struct Scene<'a> {
    /// the image already scaled to the canvas
    pub im_view: &'a RgbaImage,
    pub viewport: &'a Viewport,
    pub annotations: &'a [Annotation],
    pub selected: Option<usize>,
    pub hovered: Option<usize>,
    /// box currently being drawn in display space
    pub live_rect: Option<BbF>,
}

fn draw_box(surface: &mut impl RenderSurface, bb: BbF, color: Rgba, text: &str, cfg: &EditorCfg) {
    surface.stroke_rect(bb, color, cfg.outline_thickness);
    if !text.is_empty() {
        let text_height = cfg.font_size + 4.0;
        let text_width = surface.text_width(text, cfg.font_size);
        let bg = BbF::from_arr(&[bb.x, bb.y - text_height, text_width + 8.0, text_height]);
        surface.fill_rect(bg, cfg.colors.background);
        let pos = PtF {
            x: bb.x + 4.0,
            y: bb.y - text_height + 2.0,
        };
        surface.fill_text(text, pos, cfg.colors.text, cfg.font_size);
    }
}

pub fn handle_rects(bb: BbF, size: f64) -> [BbF; 4] {
    let half = size * 0.5;
    let corner = |x: f64, y: f64| BbF::from_arr(&[x - half, y - half, size, size]);
    [
        corner(bb.x, bb.y),
        corner(bb.x + bb.w, bb.y),
        corner(bb.x, bb.y + bb.h),
        corner(bb.x + bb.w, bb.y + bb.h),
    ]
}

/// One full paint: image, all boxes with labels, handles of the selected box and finally the box
/// that is being drawn.
pub fn render(surface: &mut impl RenderSurface, scene: &Scene, cfg: &EditorCfg) {
    surface.resize(scene.viewport.shape_view);
    surface.clear();
    surface.draw_image(scene.im_view);
    for (idx, anno) in scene.annotations.iter().enumerate() {
        let bb = scene.viewport.to_display_space(anno.bb());
        let color = if Some(idx) == scene.selected {
            cfg.colors.active
        } else if Some(idx) == scene.hovered {
            cfg.colors.hover
        } else {
            cfg.colors.saved
        };
        draw_box(
            surface,
            bb,
            color,
            &label_text(&anno.label, anno.confidence),
            cfg,
        );
    }
    if let Some(anno) = scene.selected.and_then(|idx| scene.annotations.get(idx)) {
        let bb = scene.viewport.to_display_space(anno.bb());
        for handle in handle_rects(bb, cfg.handle_draw_px) {
            surface.fill_rect(handle, cfg.colors.active);
        }
    }
    if let Some(live) = scene.live_rect {
        draw_box(
            surface,
            live,
            cfg.colors.active,
            &cfg.placeholder_label,
            cfg,
        );
    }
}

#[cfg(test)]
use crate::{
    annotations::make_test_anno,
    test_helpers::{DrawOp, RecordingSurface},
};

#[cfg(test)]
fn render_test_scene(
    annotations: &[Annotation],
    selected: Option<usize>,
    hovered: Option<usize>,
    live_rect: Option<BbF>,
) -> Vec<DrawOp> {
    let cfg = EditorCfg::default();
    let im = RgbaImage::new(100, 50);
    let viewport = Viewport::new(ShapeI::new(200, 100), 100);
    let scene = Scene {
        im_view: &im,
        viewport: &viewport,
        annotations,
        selected,
        hovered,
        live_rect,
    };
    let mut surface = RecordingSurface::default();
    render(&mut surface, &scene, &cfg);
    surface.ops
}

#[test]
fn test_render_order_and_colors() {
    let cfg = EditorCfg::default();
    let mut annos = vec![
        make_test_anno(1, [20.0, 40.0, 40.0, 20.0], "cat"),
        make_test_anno(2, [100.0, 40.0, 40.0, 20.0], "dog"),
        make_test_anno(3, [0.0, 60.0, 10.0, 20.0], "bird"),
    ];
    annos[2].confidence = 0.85;
    let ops = render_test_scene(&annos, Some(0), Some(1), None);
    assert_eq!(ops[0], DrawOp::Resize(ShapeI::new(100, 50)));
    assert_eq!(ops[1], DrawOp::Clear);
    assert_eq!(ops[2], DrawOp::Image(100, 50));
    let strokes = ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::StrokeRect(bb, color) => Some((*bb, *color)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(strokes.len(), 3);
    assert_eq!(strokes[0], (BbF::from_arr(&[10.0, 20.0, 20.0, 10.0]), cfg.colors.active));
    assert_eq!(strokes[1].1, cfg.colors.hover);
    assert_eq!(strokes[2].1, cfg.colors.saved);
    let texts = ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text(t, _) => Some(t.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["cat", "dog", "bird (85.0%)"]);
    // handles of the selected box come after all boxes
    let handles = &ops[ops.len() - 4..];
    for (op, corner) in handles.iter().zip([(10.0, 20.0), (30.0, 20.0), (10.0, 30.0), (30.0, 30.0)]) {
        let expected = BbF::from_arr(&[corner.0 - 3.0, corner.1 - 3.0, 6.0, 6.0]);
        assert_eq!(op, &DrawOp::FillRect(expected, cfg.colors.active));
    }
}

#[test]
fn test_render_live_rect_on_top() {
    let cfg = EditorCfg::default();
    let annos = vec![make_test_anno(1, [20.0, 40.0, 40.0, 20.0], "cat")];
    let live = BbF::from_arr(&[5.0, 5.0, 30.0, 30.0]);
    let ops = render_test_scene(&annos, None, None, Some(live));
    let n = ops.len();
    assert_eq!(ops[n - 3], DrawOp::StrokeRect(live, cfg.colors.active));
    assert_eq!(ops[n - 1], DrawOp::Text(cfg.placeholder_label.clone(), PtF { x: 9.0, y: -11.0 }));
    assert!(!ops.iter().any(|op| matches!(op, DrawOp::FillRect(bb, _) if bb.w == 6.0)));
}

#[test]
fn test_render_idempotent() {
    let annos = vec![make_test_anno(1, [20.0, 40.0, 40.0, 20.0], "cat")];
    let first = render_test_scene(&annos, Some(0), None, None);
    let second = render_test_scene(&annos, Some(0), None, None);
    assert_eq!(first, second);
}
