//! The annotation editor owns the annotations of all images, reacts to pointer and keyboard
//! input on the current image, persists every change and repaints its render surface.
mod on_events;
mod state;

pub use on_events::{handle_at, hit_test, resize_bb, to_image_space, Reaction};
pub use state::{EditorState, Handle, Interaction, Mode};

use crate::{
    annotations::{fresh_id, Annotation, AnnotationSet, Statistics},
    cfg::EditorCfg,
    events::{EditorInput, KeyCode, MouseInput, PointerEvent, TouchInput},
    image_source::{DecodedImage, ImageDescriptor, ImageSource, LoadTicket},
    persistence::{self, KeyValueStore},
    render::{render, RenderSurface, Scene},
    result::{trace_ok_err, trace_ok_warn, Notification},
    view::{scale_to_canvas, Viewport},
};
use easyyolo_domain::{yoloerr, BbF, PtF, YoloResult};
use image::RgbaImage;
use on_events::EventParams;
use std::{fmt::Debug, path::Path};
use tracing::{debug, error, info, warn};

/// Asks the user for the label of a freshly drawn box. `None` or an empty string cancels.
pub trait LabelProvider {
    fn prompt_label(&mut self, default_text: &str) -> Option<String>;
}
impl<F> LabelProvider for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn prompt_label(&mut self, default_text: &str) -> Option<String> {
        self(default_text)
    }
}

/// Machine suggested box in image space.
#[derive(Clone, Debug, PartialEq)]
pub struct Suggestion {
    pub bb: BbF,
    pub label: String,
    pub confidence: f64,
}

pub trait SuggestionProvider {
    fn suggest(&mut self, im: &DecodedImage) -> Vec<Suggestion>;
}
impl<F> SuggestionProvider for F
where
    F: FnMut(&DecodedImage) -> Vec<Suggestion>,
{
    fn suggest(&mut self, im: &DecodedImage) -> Vec<Suggestion> {
        self(im)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MousePhase {
    Down,
    Move,
    Up,
    Leave,
}

struct LoadedImage {
    key: String,
    index: usize,
    decoded: DecodedImage,
    im_view: RgbaImage,
    viewport: Viewport,
}

#[derive(Clone, Debug)]
struct PendingLoad {
    ticket: LoadTicket,
    index: usize,
    key: String,
}

pub struct AnnotationEditor<S, L, R>
where
    S: KeyValueStore,
    L: LabelProvider,
    R: RenderSurface,
{
    cfg: EditorCfg,
    store: S,
    labels: L,
    surface: R,
    annotations: AnnotationSet,
    state: EditorState,
    images: Vec<ImageDescriptor>,
    current: Option<LoadedImage>,
    pending: Option<PendingLoad>,
    latest_ticket: LoadTicket,
    last_id: Option<u64>,
    last_pointer: Option<PtF>,
    notifications: Vec<Notification>,
}

impl<S, L, R> AnnotationEditor<S, L, R>
where
    S: KeyValueStore,
    L: LabelProvider,
    R: RenderSurface,
{
    /// Reads previously persisted annotations from `store`.
    pub fn new(cfg: EditorCfg, store: S, labels: L, surface: R) -> Self {
        let annotations = persistence::load_annotations(&store, &cfg.storage_key);
        info!(
            "editor starts with {} annotations on {} images",
            annotations.total_annotations(),
            annotations.image_count()
        );
        let last_id = annotations.max_id();
        Self {
            cfg,
            store,
            labels,
            surface,
            annotations,
            state: EditorState::default(),
            images: vec![],
            current: None,
            pending: None,
            latest_ticket: LoadTicket::default(),
            last_id,
            last_pointer: None,
            notifications: vec![],
        }
    }

    pub fn cfg(&self) -> &EditorCfg {
        &self.cfg
    }
    pub fn state(&self) -> &EditorState {
        &self.state
    }
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }
    pub fn store(&self) -> &S {
        &self.store
    }
    pub fn surface(&self) -> &R {
        &self.surface
    }
    pub fn labels(&self) -> &L {
        &self.labels
    }
    pub fn images(&self) -> &[ImageDescriptor] {
        &self.images
    }
    pub fn current_key(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.key.as_str())
    }
    pub fn current_index(&self) -> Option<usize> {
        self.current.as_ref().map(|c| c.index)
    }
    pub fn viewport(&self) -> Option<&Viewport> {
        self.current.as_ref().map(|c| &c.viewport)
    }
    pub fn current_annotations(&self) -> &[Annotation] {
        match &self.current {
            Some(c) => self.annotations.get(&c.key),
            None => &[],
        }
    }
    /// An image is decoded and no other load is in flight.
    pub fn is_ready(&self) -> bool {
        self.current.is_some() && self.pending.is_none()
    }
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn set_images(&mut self, images: Vec<ImageDescriptor>) {
        info!("{} images to annotate", images.len());
        self.images = images;
    }

    /// Starts decoding. Interaction is paused until [`Self::on_image_ready`] receives the result
    /// of this very request, results of older requests are dropped.
    pub fn load_image(
        &mut self,
        descriptor: &ImageDescriptor,
        index: usize,
        source: &mut impl ImageSource,
    ) -> LoadTicket {
        self.latest_ticket = self.latest_ticket.next();
        let ticket = self.latest_ticket;
        if let Some(prev) = &self.pending {
            debug!("load of {} superseded by {}", prev.key, descriptor.name);
        }
        self.pending = Some(PendingLoad {
            ticket,
            index,
            key: descriptor.name.clone(),
        });
        self.state.interaction = Interaction::Idle;
        source.start(ticket, descriptor);
        ticket
    }

    pub fn navigate_to_image(
        &mut self,
        index: usize,
        source: &mut impl ImageSource,
    ) -> YoloResult<LoadTicket> {
        let descriptor = self.images.get(index).cloned().ok_or_else(|| {
            yoloerr!(
                "cannot navigate to image {}, only {} images",
                index,
                self.images.len()
            )
        })?;
        Ok(self.load_image(&descriptor, index, source))
    }

    /// Applies finished decodes, returns `true` if a new image became current.
    pub fn poll_images(&mut self, source: &mut impl ImageSource) -> bool {
        let mut applied = false;
        for (ticket, decoded) in source.poll() {
            applied |= self.on_image_ready(ticket, decoded);
        }
        applied
    }

    pub fn on_image_ready(&mut self, ticket: LoadTicket, decoded: YoloResult<DecodedImage>) -> bool {
        let pending = match &self.pending {
            Some(pending) if pending.ticket == ticket => pending.clone(),
            _ => {
                debug!("dropping stale decode result of ticket {}", ticket.0);
                return false;
            }
        };
        self.pending = None;
        let Some(decoded) = trace_ok_err(decoded) else {
            error!("could not load image {}, keeping the previous one", pending.key);
            return false;
        };
        let viewport = Viewport::new(decoded.shape(), self.cfg.max_display_size);
        let im_view = scale_to_canvas(&decoded.im, &viewport).unwrap_or_else(|| decoded.im.clone());
        info!(
            "showing {} with natural size {:?} at scale {}",
            pending.key, viewport.shape_orig, viewport.scale
        );
        self.current = Some(LoadedImage {
            key: pending.key,
            index: pending.index,
            decoded,
            im_view,
            viewport,
        });
        self.state.reset();
        self.redraw();
        true
    }

    pub fn handle_mouse(&mut self, phase: MousePhase, mouse: MouseInput, canvas_origin: PtF) {
        let pointer = mouse.to_pointer(canvas_origin);
        let input = match phase {
            MousePhase::Down => EditorInput::PointerDown(pointer),
            MousePhase::Move => EditorInput::PointerMove(pointer),
            MousePhase::Up => EditorInput::PointerUp(pointer),
            MousePhase::Leave => EditorInput::PointerLeave,
        };
        self.handle_input(input);
    }

    /// A touch that ends has no touch points left, it is released where the pointer was last.
    pub fn handle_touch(&mut self, phase: TouchPhase, touch: &TouchInput, canvas_origin: PtF) {
        if !self.cfg.enable_touch {
            return;
        }
        let pointer = touch.to_pointer(canvas_origin);
        let input = match (phase, pointer) {
            (TouchPhase::Start, Some(p)) => EditorInput::PointerDown(p),
            (TouchPhase::Move, Some(p)) => EditorInput::PointerMove(p),
            (TouchPhase::End, Some(p)) => EditorInput::PointerUp(p),
            (TouchPhase::End, None) => match self.last_pointer {
                Some(p) => EditorInput::PointerUp(PointerEvent::new(p.x, p.y)),
                None => return,
            },
            (_, None) => return,
        };
        self.handle_input(input);
    }

    pub fn handle_input(&mut self, input: EditorInput) {
        if !self.is_ready() {
            debug!("ignoring {input:?}, no image ready");
            return;
        }
        let Some(loaded) = &self.current else {
            return;
        };
        let params = EventParams {
            viewport: &loaded.viewport,
            cfg: &self.cfg,
        };
        let canvas = loaded.viewport.canvas();
        let pos = input.pointer().map(|p| p.pos().clamp_to(canvas));
        let state = self.state;
        let mut no_annos: Vec<Annotation> = vec![];
        let annos = match self.annotations.get_mut(&loaded.key) {
            Some(annos) => annos.as_mut_slice(),
            None => no_annos.as_mut_slice(),
        };
        let (state, reaction) = match (input, pos) {
            (EditorInput::PointerDown(_), Some(pos)) => {
                on_events::on_pointer_down(pos, &params, annos, state)
            }
            (EditorInput::PointerMove(_), Some(pos)) => {
                on_events::on_pointer_move(pos, &params, annos, state)
            }
            (EditorInput::PointerUp(_), Some(pos)) => on_events::on_pointer_up(pos, &params, state),
            (EditorInput::PointerLeave, _) => on_events::on_pointer_leave(state),
            (EditorInput::Key(key), _) => on_events::on_key(key, state),
            _ => (state, Reaction::default()),
        };
        if pos.is_some() {
            self.last_pointer = pos;
        }
        self.state = state;
        self.apply(reaction);
    }

    pub fn press_key(&mut self, key: KeyCode) {
        self.handle_input(EditorInput::Key(key));
    }

    fn apply(&mut self, reaction: Reaction) {
        if let Some(live) = reaction.finished_draw {
            self.finish_drawing(live);
        }
        if let Some(idx) = reaction.delete {
            self.delete_annotation(idx);
        } else if reaction.persist {
            self.persist();
        }
        if reaction.quick_save {
            self.persist();
            self.notifications
                .push(Notification::info("annotations saved"));
        }
        if reaction.redraw {
            self.redraw();
        }
    }

    fn finish_drawing(&mut self, live: BbF) {
        let label = self
            .labels
            .prompt_label(&self.cfg.default_label)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let (Some(label), Some(loaded)) = (label, &self.current) else {
            debug!("drawing cancelled");
            return;
        };
        let bb = to_image_space(&loaded.viewport, live);
        let key = loaded.key.clone();
        self.push_annotation(&key, bb, label, 1.0);
        self.persist();
    }

    fn next_id(&mut self) -> u64 {
        match fresh_id(self.last_id) {
            Some(id) => {
                self.last_id = Some(id);
                id
            }
            None => {
                let id = self.annotations.free_id();
                warn!("timestamp ids exhausted, falling back to unused id {id}");
                id
            }
        }
    }

    fn push_annotation(&mut self, key: &str, bb: BbF, label: String, confidence: f64) -> u64 {
        let id = self.next_id();
        info!("new annotation {id} '{label}' at {bb} on {key}");
        self.annotations
            .push(key, Annotation::new(id, bb, label, confidence));
        id
    }

    fn persist(&mut self) {
        trace_ok_err(persistence::save_annotations(
            &mut self.store,
            &self.cfg.storage_key,
            &self.annotations,
        ));
    }

    /// Paints the current image and its annotations, nothing happens before the first image is
    /// ready.
    pub fn redraw(&mut self) {
        if let Some(loaded) = &self.current {
            let scene = Scene {
                im_view: &loaded.im_view,
                viewport: &loaded.viewport,
                annotations: self.annotations.get(&loaded.key),
                selected: self.state.selected,
                hovered: self.state.hovered,
                live_rect: self.state.live_rect(),
            };
            render(&mut self.surface, &scene, &self.cfg);
        }
    }

    fn ready_key(&self, op: &str) -> Option<String> {
        if self.is_ready() {
            self.current.as_ref().map(|c| c.key.clone())
        } else {
            warn!("{op} ignored, no image ready");
            None
        }
    }

    /// Adds a box given in image space to the current image. The box is trimmed to the image.
    pub fn add_annotation(&mut self, bb: BbF, label: &str, confidence: f64) -> YoloResult<u64> {
        let key = self
            .ready_key("add annotation")
            .ok_or_else(|| yoloerr!("no image ready"))?;
        let shape = self.viewport().map(|vp| vp.image()).unwrap_or_default();
        let bb = bb.fit_to_image(shape);
        let candidate = Annotation::new(0, bb, label, confidence);
        candidate.validate()?;
        let id = self.push_annotation(&key, bb, label.to_string(), confidence);
        self.persist();
        self.redraw();
        Ok(id)
    }

    pub fn delete_annotation(&mut self, index: usize) -> Option<Annotation> {
        let key = self.ready_key("delete")?;
        let removed = self.annotations.remove(&key, index);
        if let Some(removed) = &removed {
            info!("deleted annotation {} from {key}", removed.id);
            self.state.selected = None;
            self.state.hovered = None;
            self.persist();
            self.redraw();
        }
        removed
    }

    pub fn batch_delete(&mut self, indices: &[usize]) -> usize {
        let Some(key) = self.ready_key("batch delete") else {
            return 0;
        };
        let n_removed = self.annotations.remove_multiple(&key, indices);
        if n_removed > 0 {
            info!("deleted {n_removed} annotations from {key}");
            self.state.selected = None;
            self.state.hovered = None;
            self.persist();
            self.redraw();
        }
        n_removed
    }

    /// Removes all annotations of all images. Asking for confirmation is up to the host.
    pub fn clear_all(&mut self) {
        info!(
            "clearing {} annotations",
            self.annotations.total_annotations()
        );
        self.annotations.clear();
        self.state.selected = None;
        self.state.hovered = None;
        self.persist();
        self.redraw();
    }

    /// Rewrites the rectangle of an annotation of the current image in image coordinates.
    pub fn set_annotation_rect(&mut self, index: usize, bb: BbF) -> YoloResult<()> {
        let key = self
            .ready_key("set rect")
            .ok_or_else(|| yoloerr!("no image ready"))?;
        if !bb.is_finite() || !bb.has_positive_extent() {
            return Err(yoloerr!("invalid rectangle {bb:?}"));
        }
        let shape = self.viewport().map(|vp| vp.image()).unwrap_or_default();
        let fitted = bb.fit_to_image(shape);
        if !fitted.has_positive_extent() {
            return Err(yoloerr!("rectangle {bb:?} is outside of the image"));
        }
        let anno = self
            .annotations
            .get_mut(&key)
            .and_then(|annos| annos.get_mut(index))
            .ok_or_else(|| yoloerr!("no annotation {index} on {key}"))?;
        anno.set_bb(fitted);
        self.persist();
        self.redraw();
        Ok(())
    }

    pub fn relabel(&mut self, index: usize, label: &str) -> YoloResult<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(yoloerr!("labels cannot be empty"));
        }
        let key = self
            .ready_key("relabel")
            .ok_or_else(|| yoloerr!("no image ready"))?;
        let anno = self
            .annotations
            .get_mut(&key)
            .and_then(|annos| annos.get_mut(index))
            .ok_or_else(|| yoloerr!("no annotation {index} on {key}"))?;
        anno.label = label.to_string();
        self.persist();
        self.redraw();
        Ok(())
    }

    pub fn export_annotations(&self) -> YoloResult<String> {
        persistence::export_to_string(&self.annotations)
    }

    pub fn export_to_path<P>(&self, path: P) -> YoloResult<()>
    where
        P: AsRef<Path> + Debug,
    {
        persistence::export_to_path(&self.annotations, path)
    }

    /// Replaces all annotations by the ones of the export document. On failure nothing changes
    /// and the user is notified.
    pub fn import_annotations(&mut self, json_str: &str) -> bool {
        self.apply_import(persistence::import_from_str(json_str))
    }

    pub fn import_from_path<P>(&mut self, path: P) -> bool
    where
        P: AsRef<Path> + Debug,
    {
        self.apply_import(persistence::import_from_path(path))
    }

    fn apply_import(&mut self, imported: YoloResult<AnnotationSet>) -> bool {
        match imported {
            Ok(set) => {
                let n = set.total_annotations();
                self.last_id = self.last_id.max(set.max_id());
                self.annotations = set;
                self.state.selected = None;
                self.state.hovered = None;
                self.persist();
                self.redraw();
                info!("imported {n} annotations");
                self.notifications
                    .push(Notification::info(format!("imported {n} annotations")));
                true
            }
            Err(e) => {
                error!("import failed, {e}");
                self.notifications
                    .push(Notification::error(format!("import failed: {e}")));
                false
            }
        }
    }

    pub fn get_statistics(&self) -> Statistics {
        self.annotations.statistics()
    }

    /// Adds suggestions above the configured confidence threshold to the current image.
    pub fn auto_annotate(&mut self, provider: &mut impl SuggestionProvider) -> usize {
        if !self.cfg.enable_auto_label {
            self.notifications
                .push(Notification::info("auto labelling is disabled"));
            return 0;
        }
        let Some(key) = self.ready_key("auto annotate") else {
            return 0;
        };
        let Some(loaded) = &self.current else {
            return 0;
        };
        let shape = loaded.viewport.image();
        let suggestions = provider.suggest(&loaded.decoded);
        let threshold = self.cfg.auto_label_threshold;
        let accepted = suggestions
            .into_iter()
            .filter(|s| s.confidence >= threshold)
            .map(|s| Suggestion {
                bb: s.bb.fit_to_image(shape),
                ..s
            })
            .filter(|s| {
                let candidate = Annotation::new(0, s.bb, &s.label, s.confidence);
                trace_ok_warn(candidate.validate()).is_some()
            })
            .collect::<Vec<_>>();
        let n_accepted = accepted.len();
        for s in accepted {
            self.push_annotation(&key, s.bb, s.label, s.confidence);
        }
        if n_accepted > 0 {
            self.persist();
            self.redraw();
        }
        self.notifications.push(Notification::info(format!(
            "auto labelling added {n_accepted} boxes"
        )));
        n_accepted
    }
}
