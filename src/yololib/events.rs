use easyyolo_domain::PtF;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum KeyCode {
    D,
    S,
    Delete,
    Back,
    Escape,
    Enter,
    Other,
}
impl KeyCode {
    /// Maps key names as reported by keyboard events, e.g., `"Backspace"` or `"d"`.
    pub fn from_key_name(name: &str) -> Self {
        match name {
            "d" | "D" => KeyCode::D,
            "s" | "S" => KeyCode::S,
            "Delete" => KeyCode::Delete,
            "Backspace" => KeyCode::Back,
            "Escape" | "Esc" => KeyCode::Escape,
            "Enter" => KeyCode::Enter,
            _ => KeyCode::Other,
        }
    }
}

/// Pointer position in display space, i.e., relative to the canvas origin.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct PointerEvent {
    pub x: f64,
    pub y: f64,
}
impl PointerEvent {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
    pub fn pos(&self) -> PtF {
        PtF {
            x: self.x,
            y: self.y,
        }
    }
}
impl From<(f64, f64)> for PointerEvent {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Mouse coordinates in client/window space.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct MouseInput {
    pub client_x: f64,
    pub client_y: f64,
}
impl MouseInput {
    pub fn to_pointer(&self, canvas_origin: PtF) -> PointerEvent {
        PointerEvent::new(self.client_x - canvas_origin.x, self.client_y - canvas_origin.y)
    }
}

/// Active touch points in client/window space. Only the first one drives the pointer.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct TouchInput {
    pub touches: Vec<(f64, f64)>,
}
impl TouchInput {
    pub fn to_pointer(&self, canvas_origin: PtF) -> Option<PointerEvent> {
        self.touches
            .first()
            .map(|(x, y)| PointerEvent::new(x - canvas_origin.x, y - canvas_origin.y))
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum EditorInput {
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    PointerLeave,
    Key(KeyCode),
}
impl EditorInput {
    pub fn pointer(&self) -> Option<PointerEvent> {
        match self {
            EditorInput::PointerDown(p) | EditorInput::PointerMove(p) | EditorInput::PointerUp(p) => {
                Some(*p)
            }
            _ => None,
        }
    }
}

#[test]
fn test_key_names() {
    assert_eq!(KeyCode::from_key_name("d"), KeyCode::D);
    assert_eq!(KeyCode::from_key_name("S"), KeyCode::S);
    assert_eq!(KeyCode::from_key_name("Backspace"), KeyCode::Back);
    assert_eq!(KeyCode::from_key_name("Delete"), KeyCode::Delete);
    assert_eq!(KeyCode::from_key_name("Escape"), KeyCode::Escape);
    assert_eq!(KeyCode::from_key_name("Enter"), KeyCode::Enter);
    assert_eq!(KeyCode::from_key_name("x"), KeyCode::Other);
}

#[test]
fn test_adapters() {
    let origin = PtF { x: 10.0, y: 20.0 };
    let mouse = MouseInput {
        client_x: 110.0,
        client_y: 70.0,
    };
    assert_eq!(mouse.to_pointer(origin), PointerEvent::new(100.0, 50.0));
    let touch = TouchInput {
        touches: vec![(15.0, 25.0), (500.0, 500.0)],
    };
    assert_eq!(touch.to_pointer(origin), Some(PointerEvent::new(5.0, 5.0)));
    assert_eq!(TouchInput::default().to_pointer(origin), None);
    assert_eq!(
        EditorInput::PointerUp(PointerEvent::new(1.0, 2.0)).pointer(),
        Some(PointerEvent::new(1.0, 2.0))
    );
    assert_eq!(EditorInput::Key(KeyCode::D).pointer(), None);
}
