use easyyolo_domain::{BbF, PtF};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Draw,
    Select,
}

/// Corner of a box that is dragged while resizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    Nw,
    Ne,
    Sw,
    Se,
}
impl Handle {
    pub const ALL: [Handle; 4] = [Handle::Nw, Handle::Ne, Handle::Sw, Handle::Se];

    pub fn corner(self, bb: BbF) -> PtF {
        match self {
            Handle::Nw => PtF { x: bb.x, y: bb.y },
            Handle::Ne => PtF {
                x: bb.x + bb.w,
                y: bb.y,
            },
            Handle::Sw => PtF {
                x: bb.x,
                y: bb.y + bb.h,
            },
            Handle::Se => PtF {
                x: bb.x + bb.w,
                y: bb.y + bb.h,
            },
        }
    }
    pub fn opposite(self) -> Self {
        match self {
            Handle::Nw => Handle::Se,
            Handle::Ne => Handle::Sw,
            Handle::Sw => Handle::Ne,
            Handle::Se => Handle::Nw,
        }
    }
}

/// What the pointer is currently doing. All boxes are in display space.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Drawing {
        anchor: PtF,
        live: BbF,
    },
    Resizing {
        idx: usize,
        handle: Handle,
        bb_at_start: BbF,
    },
    Dragging {
        idx: usize,
        grab: PtF,
        bb_at_start: BbF,
        moved: bool,
    },
}

/// Transient editor state, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct EditorState {
    pub mode: Mode,
    pub interaction: Interaction,
    pub selected: Option<usize>,
    pub hovered: Option<usize>,
}
impl EditorState {
    pub fn is_idle(&self) -> bool {
        self.interaction == Interaction::Idle
    }
    pub fn is_drawing(&self) -> bool {
        matches!(self.interaction, Interaction::Drawing { .. })
    }
    pub fn live_rect(&self) -> Option<BbF> {
        match self.interaction {
            Interaction::Drawing { live, .. } => Some(live),
            _ => None,
        }
    }
    /// Back to idle without selection or hover, the mode is kept.
    pub fn reset(&mut self) {
        *self = Self {
            mode: self.mode,
            ..Self::default()
        };
    }
}

#[test]
fn test_handles() {
    let bb = BbF::from_arr(&[1.0, 2.0, 10.0, 20.0]);
    assert_eq!(Handle::Nw.corner(bb), PtF { x: 1.0, y: 2.0 });
    assert_eq!(Handle::Se.corner(bb), PtF { x: 11.0, y: 22.0 });
    for h in Handle::ALL {
        assert_eq!(h.opposite().opposite(), h);
        assert_ne!(h.opposite(), h);
    }
    let mut state = EditorState {
        mode: Mode::Select,
        selected: Some(1),
        ..Default::default()
    };
    state.reset();
    assert_eq!(state.mode, Mode::Select);
    assert_eq!(state.selected, None);
    assert!(state.is_idle());
}
