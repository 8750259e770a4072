use super::state::{EditorState, Handle, Interaction, Mode};
use crate::{annotations::Annotation, cfg::EditorCfg, events::KeyCode, view::Viewport};
use easyyolo_domain::{BbF, PtF, ShapeF};

/// What the editor has to do after the state machine reacted to an input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reaction {
    pub redraw: bool,
    pub persist: bool,
    /// display space box that passed the size check and waits for a label
    pub finished_draw: Option<BbF>,
    pub delete: Option<usize>,
    pub quick_save: bool,
}
impl Reaction {
    fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }
    fn persist() -> Self {
        Self {
            redraw: true,
            persist: true,
            ..Self::default()
        }
    }
}

pub(super) struct EventParams<'a> {
    pub viewport: &'a Viewport,
    pub cfg: &'a EditorCfg,
}

/// Index of the topmost box containing `pos`, later boxes are on top.
pub fn hit_test(annos: &[Annotation], viewport: &Viewport, pos: PtF) -> Option<usize> {
    annos
        .iter()
        .enumerate()
        .rev()
        .find(|(_, anno)| viewport.to_display_space(anno.bb()).contains(pos))
        .map(|(idx, _)| idx)
}

/// Handle whose square of side `hit_px` centered on the corner contains `pos`.
pub fn handle_at(bb: BbF, pos: PtF, hit_px: f64) -> Option<Handle> {
    let half = hit_px * 0.5;
    Handle::ALL.into_iter().find(|h| {
        let c = h.corner(bb);
        (pos.x - c.x).abs() <= half && (pos.y - c.y).abs() <= half
    })
}

/// Moves the corner `handle` of `bb_at_start` to `pos` while the opposite corner stays. The
/// result never gets smaller than `min_px` in either direction and never flips.
pub fn resize_bb(bb_at_start: BbF, handle: Handle, pos: PtF, min_px: f64, canvas: ShapeF) -> BbF {
    let fixed = handle.opposite().corner(bb_at_start);
    let min_px = min_px.max(f64::EPSILON);
    let (x_min, x_max) = match handle {
        Handle::Nw | Handle::Sw => ((pos.x.min(fixed.x - min_px)).max(0.0), fixed.x),
        Handle::Ne | Handle::Se => (fixed.x, (pos.x.max(fixed.x + min_px)).min(canvas.w)),
    };
    let (y_min, y_max) = match handle {
        Handle::Nw | Handle::Ne => ((pos.y.min(fixed.y - min_px)).max(0.0), fixed.y),
        Handle::Sw | Handle::Se => (fixed.y, (pos.y.max(fixed.y + min_px)).min(canvas.h)),
    };
    let resized = BbF::from_arr(&[x_min, y_min, x_max - x_min, y_max - y_min]);
    if resized.has_positive_extent() && resized.is_finite() {
        resized
    } else {
        bb_at_start
    }
}

/// Display space to image space, trimmed to the image for boxes that touch the canvas border.
pub fn to_image_space(viewport: &Viewport, bb_view: BbF) -> BbF {
    let bb = viewport.to_image_space(bb_view);
    let fitted = bb.fit_to_image(viewport.image());
    if fitted.has_positive_extent() {
        fitted
    } else {
        bb
    }
}

pub(super) fn on_pointer_down(
    pos: PtF,
    params: &EventParams,
    annos: &[Annotation],
    mut state: EditorState,
) -> (EditorState, Reaction) {
    if !state.is_idle() {
        return (state, Reaction::default());
    }
    match state.mode {
        Mode::Draw => {
            state.interaction = Interaction::Drawing {
                anchor: pos,
                live: BbF::from_points(pos, pos),
            };
        }
        Mode::Select => match hit_test(annos, params.viewport, pos) {
            Some(idx) => {
                state.selected = Some(idx);
                let bb = params.viewport.to_display_space(annos[idx].bb());
                state.interaction = match handle_at(bb, pos, params.cfg.handle_hit_px) {
                    Some(handle) => Interaction::Resizing {
                        idx,
                        handle,
                        bb_at_start: bb,
                    },
                    None => Interaction::Dragging {
                        idx,
                        grab: pos,
                        bb_at_start: bb,
                        moved: false,
                    },
                };
            }
            None => {
                state.selected = None;
            }
        },
    }
    (state, Reaction::redraw())
}

pub(super) fn on_pointer_move(
    pos: PtF,
    params: &EventParams,
    annos: &mut [Annotation],
    mut state: EditorState,
) -> (EditorState, Reaction) {
    let canvas = params.viewport.canvas();
    match state.interaction {
        Interaction::Drawing { anchor, .. } => {
            state.interaction = Interaction::Drawing {
                anchor,
                live: BbF::from_points(anchor, pos),
            };
            (state, Reaction::redraw())
        }
        Interaction::Resizing {
            idx,
            handle,
            bb_at_start,
        } => match annos.get_mut(idx) {
            Some(anno) => {
                let resized =
                    resize_bb(bb_at_start, handle, pos, params.cfg.min_resize_px, canvas);
                anno.set_bb(to_image_space(params.viewport, resized));
                (state, Reaction::persist())
            }
            None => {
                state.interaction = Interaction::Idle;
                (state, Reaction::redraw())
            }
        },
        Interaction::Dragging {
            idx,
            grab,
            bb_at_start,
            moved,
        } => {
            let moved = moved || !pos.is_close_to(grab);
            match annos.get_mut(idx) {
                Some(anno) if moved => {
                    let shifted = bb_at_start.follow_movement(grab, pos, canvas);
                    anno.set_bb(to_image_space(params.viewport, shifted));
                    state.interaction = Interaction::Dragging {
                        idx,
                        grab,
                        bb_at_start,
                        moved,
                    };
                    (state, Reaction::persist())
                }
                Some(_) => (state, Reaction::default()),
                None => {
                    state.interaction = Interaction::Idle;
                    (state, Reaction::redraw())
                }
            }
        }
        Interaction::Idle => {
            let hovered = hit_test(annos, params.viewport, pos);
            let changed = hovered != state.hovered;
            state.hovered = hovered;
            let reaction = if changed {
                Reaction::redraw()
            } else {
                Reaction::default()
            };
            (state, reaction)
        }
    }
}

pub(super) fn on_pointer_up(
    pos: PtF,
    params: &EventParams,
    mut state: EditorState,
) -> (EditorState, Reaction) {
    let interaction = state.interaction;
    state.interaction = Interaction::Idle;
    match interaction {
        Interaction::Drawing { anchor, .. } => {
            let live = BbF::from_points(anchor, pos);
            let min = params.cfg.min_box_px;
            let finished_draw = if live.w < min || live.h < min {
                None
            } else {
                Some(live)
            };
            let reaction = Reaction {
                redraw: true,
                finished_draw,
                ..Reaction::default()
            };
            (state, reaction)
        }
        Interaction::Resizing { .. } | Interaction::Dragging { .. } => (state, Reaction::redraw()),
        Interaction::Idle => (state, Reaction::default()),
    }
}

pub(super) fn on_pointer_leave(mut state: EditorState) -> (EditorState, Reaction) {
    state.hovered = None;
    (state, Reaction::redraw())
}

pub(super) fn on_key(key: KeyCode, mut state: EditorState) -> (EditorState, Reaction) {
    match key {
        KeyCode::D => {
            state.mode = Mode::Draw;
            (state, Reaction::default())
        }
        KeyCode::S => {
            state.mode = Mode::Select;
            (state, Reaction::default())
        }
        KeyCode::Delete | KeyCode::Back => {
            let reaction = match (state.is_idle(), state.selected) {
                (true, Some(idx)) => Reaction {
                    delete: Some(idx),
                    ..Reaction::persist()
                },
                _ => Reaction::default(),
            };
            (state, reaction)
        }
        KeyCode::Escape => {
            if state.is_drawing() {
                state.interaction = Interaction::Idle;
                (state, Reaction::redraw())
            } else {
                (state, Reaction::default())
            }
        }
        KeyCode::Enter => (
            state,
            Reaction {
                quick_save: true,
                ..Reaction::default()
            },
        ),
        KeyCode::Other => (state, Reaction::default()),
    }
}

#[cfg(test)]
use crate::annotations::make_test_anno;
#[cfg(test)]
use easyyolo_domain::ShapeI;

#[cfg(test)]
fn pt(x: f64, y: f64) -> PtF {
    PtF { x, y }
}

#[test]
fn test_hit_test_topmost() {
    let vp = Viewport::new(ShapeI::new(1600, 1200), 800);
    let annos = vec![
        make_test_anno(1, [0.0, 0.0, 200.0, 200.0], "a"),
        make_test_anno(2, [100.0, 100.0, 200.0, 200.0], "b"),
    ];
    // display space boxes are [0, 0, 100, 100] and [50, 50, 100, 100]
    assert_eq!(hit_test(&annos, &vp, pt(75.0, 75.0)), Some(1));
    assert_eq!(hit_test(&annos, &vp, pt(25.0, 25.0)), Some(0));
    assert_eq!(hit_test(&annos, &vp, pt(100.0, 100.0)), Some(1));
    assert_eq!(hit_test(&annos, &vp, pt(160.0, 20.0)), None);
    assert_eq!(hit_test(&[], &vp, pt(1.0, 1.0)), None);
}

#[test]
fn test_handle_at() {
    let bb = BbF::from_arr(&[10.0, 10.0, 100.0, 50.0]);
    assert_eq!(handle_at(bb, pt(10.0, 10.0), 8.0), Some(Handle::Nw));
    assert_eq!(handle_at(bb, pt(113.0, 8.0), 8.0), Some(Handle::Ne));
    assert_eq!(handle_at(bb, pt(12.0, 63.0), 8.0), Some(Handle::Sw));
    assert_eq!(handle_at(bb, pt(106.0, 56.0), 8.0), Some(Handle::Se));
    assert_eq!(handle_at(bb, pt(105.0, 55.0), 8.0), None);
    assert_eq!(handle_at(bb, pt(50.0, 30.0), 8.0), None);
}

#[test]
fn test_resize_handles() {
    let canvas = ShapeF::new(200.0, 200.0);
    let bb = BbF::from_arr(&[50.0, 50.0, 100.0, 100.0]);
    assert_eq!(
        resize_bb(bb, Handle::Nw, pt(40.0, 30.0), 1.0, canvas),
        BbF::from_arr(&[40.0, 30.0, 110.0, 120.0])
    );
    assert_eq!(
        resize_bb(bb, Handle::Ne, pt(160.0, 60.0), 1.0, canvas),
        BbF::from_arr(&[50.0, 60.0, 110.0, 90.0])
    );
    assert_eq!(
        resize_bb(bb, Handle::Sw, pt(70.0, 170.0), 1.0, canvas),
        BbF::from_arr(&[70.0, 50.0, 80.0, 120.0])
    );
    assert_eq!(
        resize_bb(bb, Handle::Se, pt(120.0, 130.0), 1.0, canvas),
        BbF::from_arr(&[50.0, 50.0, 70.0, 80.0])
    );
    // dragging across the opposite corner clamps instead of flipping
    assert_eq!(
        resize_bb(bb, Handle::Se, pt(0.0, 0.0), 1.0, canvas),
        BbF::from_arr(&[50.0, 50.0, 1.0, 1.0])
    );
    assert_eq!(
        resize_bb(bb, Handle::Nw, pt(199.0, 199.0), 1.0, canvas),
        BbF::from_arr(&[149.0, 149.0, 1.0, 1.0])
    );
    // the canvas is a hard border
    assert_eq!(
        resize_bb(bb, Handle::Se, pt(500.0, 500.0), 1.0, canvas),
        BbF::from_arr(&[50.0, 50.0, 150.0, 150.0])
    );
}

#[test]
fn test_resize_sequences_stay_positive() {
    let canvas = ShapeF::new(300.0, 200.0);
    let mut bb = BbF::from_arr(&[100.0, 80.0, 40.0, 30.0]);
    let positions = [
        pt(-20.0, 500.0),
        pt(100.0, 80.0),
        pt(140.0, 110.0),
        pt(0.0, 0.0),
        pt(300.0, 200.0),
        pt(150.5, 99.25),
        pt(f64::MAX, -f64::MAX),
    ];
    for (i, p) in positions.iter().cycle().take(60).enumerate() {
        let handle = Handle::ALL[i % 4];
        bb = resize_bb(bb, handle, *p, 1.0, canvas);
        assert!(bb.w > 0.0 && bb.h > 0.0, "{bb:?} after {handle:?} to {p:?}");
        assert!(bb.x >= 0.0 && bb.y >= 0.0);
    }
}

#[test]
fn test_draw_transitions() {
    let cfg = EditorCfg::default();
    let vp = Viewport::new(ShapeI::new(400, 400), 800);
    let params = EventParams {
        viewport: &vp,
        cfg: &cfg,
    };
    let mut annos: Vec<Annotation> = vec![];
    // all four directions from the anchor end up with the same normalized box
    for end in [pt(150.0, 140.0), pt(50.0, 60.0), pt(150.0, 60.0), pt(50.0, 140.0)] {
        let (state, _) = on_pointer_down(pt(100.0, 100.0), &params, &annos, EditorState::default());
        assert!(state.is_drawing());
        let (state, r) = on_pointer_move(end, &params, &mut annos, state);
        assert!(r.redraw);
        let live = state.live_rect().unwrap();
        assert_eq!((live.w, live.h), (50.0, 40.0));
        assert_eq!(live.x, end.x.min(100.0));
        let (state, r) = on_pointer_up(end, &params, state);
        assert!(state.is_idle());
        assert_eq!(r.finished_draw, Some(live));
    }
    // too small
    for end in [pt(109.0, 150.0), pt(150.0, 91.0), pt(100.0, 100.0)] {
        let (state, _) = on_pointer_down(pt(100.0, 100.0), &params, &annos, EditorState::default());
        let (state, _) = on_pointer_move(end, &params, &mut annos, state);
        let (state, r) = on_pointer_up(end, &params, state);
        assert!(state.is_idle());
        assert_eq!(r.finished_draw, None);
    }
}

#[test]
fn test_escape_cancels_drawing() {
    let cfg = EditorCfg::default();
    let vp = Viewport::new(ShapeI::new(400, 400), 800);
    let params = EventParams {
        viewport: &vp,
        cfg: &cfg,
    };
    let (state, _) = on_pointer_down(pt(10.0, 10.0), &params, &[], EditorState::default());
    let (state, _) = on_pointer_move(pt(200.0, 200.0), &params, &mut [], state);
    let (state, r) = on_key(KeyCode::Escape, state);
    assert!(state.is_idle());
    assert!(r.redraw && !r.persist);
    let (state, r) = on_pointer_up(pt(200.0, 200.0), &params, state);
    assert!(state.is_idle());
    assert_eq!(r.finished_draw, None);
}

#[test]
fn test_select_resize_drag() {
    let cfg = EditorCfg::default();
    let vp = Viewport::new(ShapeI::new(800, 800), 400);
    let params = EventParams {
        viewport: &vp,
        cfg: &cfg,
    };
    let mut annos = vec![make_test_anno(1, [100.0, 100.0, 200.0, 100.0], "a")];
    let state = EditorState {
        mode: Mode::Select,
        ..Default::default()
    };
    // display box is [50, 50, 100, 50], grab the se corner
    let (state, _) = on_pointer_down(pt(149.0, 99.0), &params, &annos, state);
    assert_eq!(state.selected, Some(0));
    assert!(matches!(
        state.interaction,
        Interaction::Resizing {
            handle: Handle::Se,
            ..
        }
    ));
    let (state, r) = on_pointer_move(pt(200.0, 120.0), &params, &mut annos, state);
    assert!(r.persist);
    assert_eq!(annos[0].bb(), BbF::from_arr(&[100.0, 100.0, 300.0, 140.0]));
    assert_eq!(annos[0].id, 1);
    assert_eq!(annos[0].label, "a");
    let (state, _) = on_pointer_up(pt(200.0, 120.0), &params, state);
    assert!(state.is_idle());

    // drag from the middle
    let (state, r) = on_pointer_down(pt(100.0, 70.0), &params, &annos, state);
    assert!(matches!(state.interaction, Interaction::Dragging { .. }));
    assert!(!r.persist);
    let (state, r) = on_pointer_move(pt(100.0, 70.0), &params, &mut annos, state);
    assert!(!r.persist);
    let (state, r) = on_pointer_move(pt(110.0, 60.0), &params, &mut annos, state);
    assert!(r.persist);
    assert_eq!(annos[0].bb(), BbF::from_arr(&[120.0, 80.0, 300.0, 140.0]));
    // clamped at the canvas border
    let (state, _) = on_pointer_move(pt(-500.0, 60.0), &params, &mut annos, state);
    assert_eq!(annos[0].x, 0.0);
    let (state, _) = on_pointer_up(pt(-500.0, 60.0), &params, state);
    assert!(state.is_idle());

    // click into nothing deselects
    let (state, _) = on_pointer_down(pt(390.0, 390.0), &params, &annos, state);
    assert_eq!(state.selected, None);
    assert!(state.is_idle());
}

#[test]
fn test_hover_delete_keys() {
    let cfg = EditorCfg::default();
    let vp = Viewport::new(ShapeI::new(400, 400), 800);
    let params = EventParams {
        viewport: &vp,
        cfg: &cfg,
    };
    let mut annos = vec![make_test_anno(1, [10.0, 10.0, 50.0, 50.0], "a")];
    let (state, r) = on_pointer_move(pt(20.0, 20.0), &params, &mut annos, EditorState::default());
    assert_eq!(state.hovered, Some(0));
    assert!(r.redraw);
    let (state, r) = on_pointer_move(pt(21.0, 20.0), &params, &mut annos, state);
    assert!(!r.redraw);
    let (state, _) = on_pointer_leave(state);
    assert_eq!(state.hovered, None);

    let (state, r) = on_key(KeyCode::Delete, state);
    assert_eq!(r.delete, None);
    let (state, _) = on_key(KeyCode::S, state);
    assert_eq!(state.mode, Mode::Select);
    let (state, _) = on_pointer_down(pt(20.0, 20.0), &params, &annos, state);
    let (state, _) = on_pointer_up(pt(20.0, 20.0), &params, state);
    let (state, r) = on_key(KeyCode::Back, state);
    assert_eq!(r.delete, Some(0));
    assert!(r.persist);
    let (state, r) = on_key(KeyCode::Enter, state);
    assert!(r.quick_save);
    let (state, _) = on_key(KeyCode::D, state);
    assert_eq!(state.mode, Mode::Draw);
}
