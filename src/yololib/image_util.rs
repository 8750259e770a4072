use crate::{cfg::EditorCfg, cfg::Rgba as RgbaArr, render::RenderSurface};
use ab_glyph::{FontArc, PxScale};
use easyyolo_domain::{to_yolo, yoloerr, BbF, PtF, ShapeI, YoloResult};
use image::{imageops, Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::{fmt::Debug, fs, path::Path};
use tracing::info;

fn to_01(x: u8) -> f32 {
    f32::from(x) / 255.0
}

/// Blends `color` over `pixel` according to the alpha channel of `color`.
pub fn apply_alpha(pixel: &Rgba<u8>, color: &RgbaArr) -> Rgba<u8> {
    let alpha_amount = to_01(color[3]);
    let apply_alpha_scalar = |x_color: u8, x_pixel: u8| {
        ((to_01(x_color) * alpha_amount + (1.0 - alpha_amount) * to_01(x_pixel)) * 255.0).round()
            as u8
    };
    let [r, g, b, a] = pixel.0;
    Rgba([
        apply_alpha_scalar(color[0], r),
        apply_alpha_scalar(color[1], g),
        apply_alpha_scalar(color[2], b),
        a.max(color[3]),
    ])
}

/// Pixel range `[start, end)` of `[x, x + len)` inside `[0, n)`.
fn clip_range(x: f64, len: f64, n: u32) -> Option<(u32, u32)> {
    let start = x.round().max(0.0);
    let end = (x + len).round().min(f64::from(n));
    if end <= start {
        None
    } else {
        Some((start as u32, end as u32))
    }
}

const MAX_STROKE_LINES: f64 = 64.0;

/// Average glyph advance relative to the font size, used when no font is loaded.
const ESTIMATED_ADVANCE: f64 = 0.6;

pub fn read_font(path: &Path) -> YoloResult<FontArc> {
    let bytes = fs::read(path).map_err(|e| yoloerr!("could not read font {:?}, {:?}", path, e))?;
    FontArc::try_from_vec(bytes).map_err(to_yolo)
}

/// Render surface in memory.
#[derive(Clone, Default)]
pub struct ImageSurface {
    im: RgbaImage,
    font: Option<FontArc>,
}
impl ImageSurface {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            im: RgbaImage::new(0, 0),
            font,
        }
    }
    pub fn from_cfg(cfg: &EditorCfg) -> YoloResult<Self> {
        let font = cfg.font_path.as_deref().map(read_font).transpose()?;
        Ok(Self::new(font))
    }
    pub fn image(&self) -> &RgbaImage {
        &self.im
    }
    pub fn save_png<P>(&self, path: P) -> YoloResult<()>
    where
        P: AsRef<Path> + Debug,
    {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(to_yolo)?;
            }
        }
        self.im
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| yoloerr!("could not save {:?}, {:?}", path, e))?;
        info!("saved rendering to {path:?}");
        Ok(())
    }
}

impl RenderSurface for ImageSurface {
    fn resize(&mut self, shape: ShapeI) {
        if ShapeI::from_im(&self.im) != shape {
            self.im = RgbaImage::new(shape.w, shape.h);
        }
    }
    fn clear(&mut self) {
        for p in self.im.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }
    fn draw_image(&mut self, im: &RgbaImage) {
        imageops::replace(&mut self.im, im, 0, 0);
    }
    fn stroke_rect(&mut self, bb: BbF, color: RgbaArr, thickness: f64) {
        if !bb.is_finite() {
            return;
        }
        let n_lines = thickness.round().max(1.0).min(MAX_STROKE_LINES) as i32;
        // edges far off the canvas are pulled in just enough to stay invisible
        let margin = f64::from(n_lines + 1);
        let (w_im, h_im) = self.im.dimensions();
        let edge = |v: f64, n: u32| v.round().clamp(-margin, f64::from(n) + margin) as i32;
        let (x0, x1) = (edge(bb.x, w_im), edge(bb.x_max(), w_im));
        let (y0, y1) = (edge(bb.y, h_im), edge(bb.y_max(), h_im));
        // centered on the edge as canvas strokes are
        let offset = n_lines / 2;
        for i in 0..n_lines {
            let d = i - offset;
            let (w_i, h_i) = (x1 - x0 - 2 * d, y1 - y0 - 2 * d);
            if w_i > 0 && h_i > 0 {
                let rect = Rect::at(x0 + d, y0 + d).of_size(w_i as u32, h_i as u32);
                draw_hollow_rect_mut(&mut self.im, rect, Rgba(color));
            }
        }
    }
    fn fill_rect(&mut self, bb: BbF, color: RgbaArr) {
        if !bb.is_finite() {
            return;
        }
        let (w_im, h_im) = self.im.dimensions();
        let (Some((x_start, x_end)), Some((y_start, y_end))) =
            (clip_range(bb.x, bb.w, w_im), clip_range(bb.y, bb.h, h_im))
        else {
            return;
        };
        for y in y_start..y_end {
            for x in x_start..x_end {
                let blended = apply_alpha(self.im.get_pixel(x, y), &color);
                self.im.put_pixel(x, y, blended);
            }
        }
    }
    fn fill_text(&mut self, text: &str, pos: PtF, color: RgbaArr, font_size: f64) {
        if let Some(font) = &self.font {
            let (w_im, h_im) = self.im.dimensions();
            let visible = pos.is_finite()
                && pos.x <= f64::from(w_im)
                && pos.y <= f64::from(h_im)
                && pos.x >= -self.text_width(text, font_size)
                && pos.y >= -2.0 * font_size;
            if !visible {
                return;
            }
            let (x, y) = pos.round_signed();
            draw_text_mut(
                &mut self.im,
                Rgba(color),
                x,
                y,
                PxScale::from(font_size as f32),
                font,
                text,
            );
        }
    }
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        match &self.font {
            Some(font) => f64::from(text_size(PxScale::from(font_size as f32), font, text).0),
            None => text.chars().count() as f64 * font_size * ESTIMATED_ADVANCE,
        }
    }
}

#[cfg(test)]
use crate::{defer_folder_removal, file_util::DEFAULT_TMPDIR};

#[test]
fn test_apply_alpha() {
    let px = Rgba([0, 0, 0, 255]);
    assert_eq!(apply_alpha(&px, &[255, 255, 255, 255]), Rgba([255, 255, 255, 255]));
    assert_eq!(apply_alpha(&px, &[255, 0, 0, 0]), px);
    let half = apply_alpha(&Rgba([100, 100, 100, 255]), &[200, 0, 100, 128]);
    assert_eq!(half.0[0], 150);
    assert_eq!(half.0[2], 100);
}

#[test]
fn test_surface_fill_and_stroke() {
    let mut surface = ImageSurface::new(None);
    surface.resize(ShapeI::new(20, 10));
    surface.clear();
    surface.fill_rect(BbF::from_arr(&[-5.0, 2.0, 10.0, 3.0]), [0, 0, 255, 255]);
    let im = surface.image();
    assert_eq!(im.get_pixel(0, 2), &Rgba([0, 0, 255, 255]));
    assert_eq!(im.get_pixel(4, 4), &Rgba([0, 0, 255, 255]));
    assert_eq!(im.get_pixel(5, 2), &Rgba([0, 0, 0, 0]));
    assert_eq!(im.get_pixel(0, 5), &Rgba([0, 0, 0, 0]));

    surface.clear();
    surface.stroke_rect(BbF::from_arr(&[5.0, 2.0, 10.0, 6.0]), [0, 255, 0, 255], 2.0);
    let im = surface.image();
    assert_eq!(im.get_pixel(5, 2), &Rgba([0, 255, 0, 255]));
    assert_eq!(im.get_pixel(4, 1), &Rgba([0, 255, 0, 255]));
    assert_eq!(im.get_pixel(10, 5), &Rgba([0, 0, 0, 0]));
    // nothing happens outside of the canvas
    surface.fill_rect(BbF::from_arr(&[50.0, 50.0, 10.0, 10.0]), [0, 0, 255, 255]);
    surface.stroke_rect(BbF::from_arr(&[-50.0, -50.0, 10.0, 10.0]), [0, 0, 255, 255], 2.0);
}

#[test]
fn test_stroke_huge_and_invalid_boxes() {
    let green = Rgba([0, 255, 0, 255]);
    let empty = Rgba([0, 0, 0, 0]);
    let mut surface = ImageSurface::new(None);
    surface.resize(ShapeI::new(10, 10));
    surface.clear();
    surface.stroke_rect(BbF::from_arr(&[0.0, 0.0, 3e9, 20.0]), [0, 255, 0, 255], 2.0);
    let im = surface.image();
    assert_eq!(im.get_pixel(0, 5), &green);
    assert_eq!(im.get_pixel(5, 0), &green);
    assert_eq!(im.get_pixel(5, 5), &empty);
    assert_eq!(im.get_pixel(9, 5), &empty);

    surface.clear();
    surface.stroke_rect(BbF::from_arr(&[-3e9, 2.0, 3e9 + 7.0, 4.0]), [0, 255, 0, 255], 3.0);
    let im = surface.image();
    assert_eq!(im.get_pixel(7, 4), &green);
    assert_eq!(im.get_pixel(0, 2), &green);
    assert_eq!(im.get_pixel(9, 4), &empty);
    assert_eq!(im.get_pixel(3, 8), &empty);

    surface.clear();
    surface.stroke_rect(BbF::from_arr(&[f64::NAN, 0.0, 5.0, 5.0]), [0, 255, 0, 255], 1.0);
    surface.fill_rect(BbF::from_arr(&[0.0, 0.0, f64::INFINITY, 5.0]), [0, 255, 0, 255]);
    assert!(surface.image().pixels().all(|p| p == &empty));
    surface.stroke_rect(BbF::from_arr(&[0.0, 0.0, 5.0, 5.0]), [0, 255, 0, 255], 1e12);
    assert_eq!(surface.image().get_pixel(2, 2), &green);
}

#[test]
fn test_surface_image_and_text() {
    let mut surface = ImageSurface::new(None);
    surface.resize(ShapeI::new(4, 4));
    let im = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
    surface.draw_image(&im);
    assert_eq!(surface.image(), &im);
    assert_eq!(surface.text_width("abcd", 10.0), 24.0);
    surface.fill_text("abcd", PtF { x: 0.0, y: 0.0 }, [255, 255, 255, 255], 10.0);
    assert_eq!(surface.image(), &im);
}

#[test]
fn test_save_png() {
    let folder = DEFAULT_TMPDIR.join("image_util_test_save_png");
    defer_folder_removal!(&folder);
    let mut surface = ImageSurface::new(None);
    surface.resize(ShapeI::new(3, 2));
    let path = folder.join("out.png");
    surface.save_png(&path).unwrap();
    let back = image::open(&path).unwrap();
    assert_eq!((back.width(), back.height()), (3, 2));
}
