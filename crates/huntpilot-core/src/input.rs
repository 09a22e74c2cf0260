//! Synthetic input event construction.
//!
//! Events delivered to the game client must carry the complete attribute set
//! the client reads for that kind; a missing field silently degrades into
//! ignored input. The per-kind field sets are:
//!
//! | Kind | Fields |
//! |------|--------|
//! | pointer move/down/up/click/context | clientX/Y, button, buttons, movementX/Y, modifiers |
//! | pointer over/out/enter/leave | the above plus relatedTarget, screenX/Y, pageX/Y, layerX/Y |
//! | wheel | clientX/Y, deltaX/Y/Z, deltaMode, modifiers |
//! | key down/up | key, code, keyCode, which, modifiers, repeat, location |
//!
//! Builders in this module always populate every field for the kind being
//! built, so translation is total rather than copying whatever happened to be
//! set on a triggering event.

use serde::{Deserialize, Serialize};

/// A coordinate in host viewport space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Modifier key state carried by every event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer event kinds.
///
/// The hover-class kinds (`Over`, `Out`, `Enter`, `Leave`) carry the extended
/// field set in [`HoverExtras`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Move,
    Down,
    Up,
    Click,
    Context,
    Over,
    Out,
    Enter,
    Leave,
}

impl PointerKind {
    /// Whether this kind carries the hover-class extended fields.
    pub fn is_hover(self) -> bool {
        matches!(
            self,
            PointerKind::Over | PointerKind::Out | PointerKind::Enter | PointerKind::Leave
        )
    }
}

/// Extra fields required only by hover-class pointer events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverExtras {
    /// Identifier of the element the pointer came from / moved to, if any.
    pub related_target: Option<String>,
    pub screen_x: i32,
    pub screen_y: i32,
    pub page_x: i32,
    pub page_y: i32,
    pub layer_x: i32,
    pub layer_y: i32,
}

/// A reconstructed pointer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub client_x: i32,
    pub client_y: i32,
    pub button: i16,
    pub buttons: u16,
    pub movement_x: i32,
    pub movement_y: i32,
    pub modifiers: Modifiers,
    /// Present exactly when `kind.is_hover()`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover: Option<HoverExtras>,
}

/// A reconstructed wheel event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub client_x: i32,
    pub client_y: i32,
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_z: f64,
    pub delta_mode: u8,
    pub modifiers: Modifiers,
}

/// Keyboard event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Down,
    Up,
}

/// A reconstructed keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub kind: KeyKind,
    pub key: String,
    pub code: String,
    pub key_code: u16,
    pub which: u16,
    pub modifiers: Modifiers,
    pub repeat: bool,
    pub location: u8,
}

/// A synthetic input event ready for dispatch to the host surface.
///
/// Also the bridge wire format: events are serialized as JSON lines tagged
/// with `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyntheticEvent {
    Pointer(PointerEvent),
    Wheel(WheelEvent),
    Key(KeyEvent),
}

/// Build a pointer event of the given kind at a point.
///
/// Defaults: left button, `buttons` pressed-state derived from the kind, zero
/// movement deltas, no modifiers. Hover-class kinds get [`HoverExtras`]
/// derived from the point (viewport-at-origin assumption, matching a
/// fullscreen client canvas).
pub fn pointer(kind: PointerKind, point: ScreenPoint) -> SyntheticEvent {
    let hover = kind.is_hover().then(|| HoverExtras {
        related_target: None,
        screen_x: point.x,
        screen_y: point.y,
        page_x: point.x,
        page_y: point.y,
        layer_x: point.x,
        layer_y: point.y,
    });

    SyntheticEvent::Pointer(PointerEvent {
        kind,
        client_x: point.x,
        client_y: point.y,
        button: 0,
        // Only while the primary button is held is the buttons bitmask set.
        buttons: if kind == PointerKind::Down { 1 } else { 0 },
        movement_x: 0,
        movement_y: 0,
        modifiers: Modifiers::default(),
        hover,
    })
}

/// Build a `move` pointer event.
pub fn move_to(point: ScreenPoint) -> SyntheticEvent {
    pointer(PointerKind::Move, point)
}

/// Build a `down` pointer event.
pub fn press(point: ScreenPoint) -> SyntheticEvent {
    pointer(PointerKind::Down, point)
}

/// Build an `up` pointer event.
pub fn release(point: ScreenPoint) -> SyntheticEvent {
    pointer(PointerKind::Up, point)
}

/// Build the press+release pair that constitutes a click at a point.
pub fn click_pair(point: ScreenPoint) -> [SyntheticEvent; 2] {
    [press(point), release(point)]
}

/// Build a wheel event at a point.
pub fn wheel(point: ScreenPoint, delta_x: f64, delta_y: f64) -> SyntheticEvent {
    SyntheticEvent::Wheel(WheelEvent {
        client_x: point.x,
        client_y: point.y,
        delta_x,
        delta_y,
        delta_z: 0.0,
        delta_mode: 0,
        modifiers: Modifiers::default(),
    })
}

/// Build a keyboard event for a named key.
///
/// `code`, `keyCode`, `which` and `location` are filled from the key table so
/// clients reading legacy fields behave identically to genuine input.
pub fn key(kind: KeyKind, name: &str) -> SyntheticEvent {
    let (code, key_code, location) = key_metadata(name);
    SyntheticEvent::Key(KeyEvent {
        kind,
        key: name.to_string(),
        code,
        key_code,
        which: key_code,
        modifiers: Modifiers::default(),
        repeat: false,
        location,
    })
}

/// Build the keydown+keyup pair for a named key.
pub fn key_press(name: &str) -> [SyntheticEvent; 2] {
    [key(KeyKind::Down, name), key(KeyKind::Up, name)]
}

/// The key name selecting a slot bar (bars 1-9 map to F1-F9).
pub fn bar_key(bar: u8) -> Option<String> {
    (1..=9).contains(&bar).then(|| format!("F{}", bar))
}

/// The digit key name for a slot index (0-9 map to the keys 1-9 then 0).
pub fn slot_digit(index: usize) -> Option<&'static str> {
    const DIGITS: [&str; 10] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"];
    DIGITS.get(index).copied()
}

/// Legacy key metadata: (code, keyCode, location) for a key name.
///
/// Unknown keys fall back to the name itself with keyCode 0, which is what a
/// genuine event for an unmapped key exposes.
fn key_metadata(name: &str) -> (String, u16, u8) {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_digit() {
            return (format!("Digit{}", c), 48 + (c as u16 - '0' as u16), 0);
        }
        if c.is_ascii_alphabetic() {
            let upper = c.to_ascii_uppercase();
            return (format!("Key{}", upper), upper as u16, 0);
        }
        if c == ' ' {
            return ("Space".to_string(), 32, 0);
        }
    }

    // F1-F12
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u16>().ok()) {
        if (1..=12).contains(&n) {
            return (name.to_string(), 111 + n, 0);
        }
    }

    let key_code = match name {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "Shift" => 16,
        "Control" => 17,
        "Alt" => 18,
        "Escape" => 27,
        "Space" => 32,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        "Delete" => 46,
        _ => 0,
    };
    (name.to_string(), key_code, 0)
}

/// Rebuild an event field-by-field.
///
/// This is the translation step of the overlay forwarding path: a genuine
/// event observed on the overlay surface is reconstructed in full before
/// being re-emitted on the host, so the copy is total per the kind's field
/// table rather than dependent on which fields the source happened to carry.
pub fn rebuild(source: &SyntheticEvent) -> SyntheticEvent {
    match source {
        SyntheticEvent::Pointer(e) => SyntheticEvent::Pointer(PointerEvent {
            kind: e.kind,
            client_x: e.client_x,
            client_y: e.client_y,
            button: e.button,
            buttons: e.buttons,
            movement_x: e.movement_x,
            movement_y: e.movement_y,
            modifiers: e.modifiers,
            hover: e.hover.as_ref().map(|h| HoverExtras {
                related_target: h.related_target.clone(),
                screen_x: h.screen_x,
                screen_y: h.screen_y,
                page_x: h.page_x,
                page_y: h.page_y,
                layer_x: h.layer_x,
                layer_y: h.layer_y,
            }),
        }),
        SyntheticEvent::Wheel(e) => SyntheticEvent::Wheel(WheelEvent {
            client_x: e.client_x,
            client_y: e.client_y,
            delta_x: e.delta_x,
            delta_y: e.delta_y,
            delta_z: e.delta_z,
            delta_mode: e.delta_mode,
            modifiers: e.modifiers,
        }),
        SyntheticEvent::Key(e) => SyntheticEvent::Key(KeyEvent {
            kind: e.kind,
            key: e.key.clone(),
            code: e.code.clone(),
            key_code: e.key_code,
            which: e.which,
            modifiers: e.modifiers,
            repeat: e.repeat,
            location: e.location,
        }),
    }
}
