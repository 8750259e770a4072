//! Collaborators for tests: a render surface that records what is painted, scripted label
//! answers, a synchronous image source and in-memory test images.
use crate::{
    cfg::{EditorCfg, Rgba},
    editor::{AnnotationEditor, LabelProvider},
    image_source::{decode, DecodeResult, DecodedImage, ImageDescriptor, ImageSource, LoadTicket},
    persistence::{KeyValueStore, MemoryStore},
    render::RenderSurface,
};
use easyyolo_domain::{yoloerr, BbF, PtF, ShapeI, YoloResult};
use image::RgbaImage;
use std::{collections::VecDeque, io::Cursor};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Resize(ShapeI),
    Clear,
    Image(u32, u32),
    StrokeRect(BbF, Rgba),
    FillRect(BbF, Rgba),
    Text(String, PtF),
}

/// Keeps the operations of the latest frame. Each frame starts with a resize.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
    pub n_frames: usize,
}
impl RecordingSurface {
    pub fn strokes(&self) -> Vec<(BbF, Rgba)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::StrokeRect(bb, color) => Some((*bb, *color)),
                _ => None,
            })
            .collect()
    }
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text(text, _) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
impl RenderSurface for RecordingSurface {
    fn resize(&mut self, shape: ShapeI) {
        self.ops.clear();
        self.n_frames += 1;
        self.ops.push(DrawOp::Resize(shape));
    }
    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }
    fn draw_image(&mut self, im: &RgbaImage) {
        self.ops.push(DrawOp::Image(im.width(), im.height()));
    }
    fn stroke_rect(&mut self, bb: BbF, color: Rgba, _thickness: f64) {
        self.ops.push(DrawOp::StrokeRect(bb, color));
    }
    fn fill_rect(&mut self, bb: BbF, color: Rgba) {
        self.ops.push(DrawOp::FillRect(bb, color));
    }
    fn fill_text(&mut self, text: &str, pos: PtF, _color: Rgba, _font_size: f64) {
        self.ops.push(DrawOp::Text(text.to_string(), pos));
    }
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * 0.6
    }
}

/// Answers label prompts from a queue, an empty queue cancels.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLabels {
    answers: VecDeque<Option<String>>,
    pub prompts: Vec<String>,
}
impl ScriptedLabels {
    pub fn new<'a>(answers: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            answers: answers
                .into_iter()
                .map(|a| a.map(str::to_string))
                .collect(),
            prompts: vec![],
        }
    }
}
impl LabelProvider for ScriptedLabels {
    fn prompt_label(&mut self, default_text: &str) -> Option<String> {
        self.prompts.push(default_text.to_string());
        self.answers.pop_front().flatten()
    }
}

/// Decodes right away when a load starts, results are handed out with the next poll.
#[derive(Default)]
pub struct ImmediateSource {
    finished: Vec<DecodeResult>,
    pub started: Vec<(LoadTicket, String)>,
}
impl ImageSource for ImmediateSource {
    fn start(&mut self, ticket: LoadTicket, descriptor: &ImageDescriptor) {
        self.started.push((ticket, descriptor.name.clone()));
        self.finished.push((ticket, decode(&descriptor.source)));
    }
    fn poll(&mut self) -> Vec<DecodeResult> {
        std::mem::take(&mut self.finished)
    }
}

/// Never finishes by itself, tests deliver results via `on_image_ready`.
#[derive(Default)]
pub struct ManualSource {
    pub started: Vec<(LoadTicket, String)>,
}
impl ImageSource for ManualSource {
    fn start(&mut self, ticket: LoadTicket, descriptor: &ImageDescriptor) {
        self.started.push((ticket, descriptor.name.clone()));
    }
    fn poll(&mut self) -> Vec<DecodeResult> {
        vec![]
    }
}

/// Store that has forgotten how to write.
#[derive(Default)]
pub struct FailingStore {
    pub n_attempts: usize,
}
impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> YoloResult<Option<String>> {
        Ok(None)
    }
    fn set(&mut self, key: &str, _value: &str) -> YoloResult<()> {
        self.n_attempts += 1;
        Err(yoloerr!("disk full, cannot write {key}"))
    }
}

pub fn test_image(w: u32, h: u32) -> DecodedImage {
    DecodedImage::new(RgbaImage::from_pixel(w, h, image::Rgba([90, 120, 150, 255])))
}

/// PNG encoded test image.
///
/// # Panics
/// If the image cannot be encoded.
pub fn test_descriptor(name: &str, w: u32, h: u32) -> ImageDescriptor {
    let mut bytes = Cursor::new(vec![]);
    test_image(w, h)
        .im
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encoding of test image failed");
    ImageDescriptor::from_bytes(name, bytes.into_inner())
}

pub type TestEditor<S = MemoryStore> = AnnotationEditor<S, ScriptedLabels, RecordingSurface>;

pub fn make_test_editor(labels: ScriptedLabels) -> TestEditor {
    AnnotationEditor::new(
        EditorCfg::default(),
        MemoryStore::new(),
        labels,
        RecordingSurface::default(),
    )
}

/// Loads an image of the given natural size and waits until it is shown.
///
/// # Panics
/// If the image does not become current.
pub fn load_test_image<S: KeyValueStore>(editor: &mut TestEditor<S>, name: &str, w: u32, h: u32) {
    let mut source = ImmediateSource::default();
    editor.load_image(&test_descriptor(name, w, h), 0, &mut source);
    assert!(editor.poll_images(&mut source), "{name} was not loaded");
}
