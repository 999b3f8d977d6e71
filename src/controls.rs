//! User facing controls around the canvas.
//!
//! On the web these are the page's `#yPosInput` field and `#resetButton`;
//! natively the arrow keys nudge the model and `R` resets the camera. Both
//! turn input into [`ControlEvent`]s the viewer drains once per frame.

use winit::event::WindowEvent;

use crate::config::ViewerConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlEvent {
    /// Absolute vertical position of the model.
    VerticalOffset(f32),
    ResetCamera,
}

pub trait ControlPanel {
    /// Shows `value` as the current offset without emitting an event.
    fn set_offset_value(&mut self, value: f32);

    fn drain_events(&mut self) -> Vec<ControlEvent>;

    /// Tells the user a model could not be shown.
    fn notify_failure(&mut self, message: &str);

    fn on_window_event(&mut self, _event: &WindowEvent) {}

    fn configure(&mut self, _config: &ViewerConfig) {}
}

/// The lookup key in a URL query string.
///
/// Drops one leading `?` and everything from the first `&`. No percent
/// decoding happens, keys are matched as written.
pub fn query_key(search: &str) -> Option<String> {
    let search = search.strip_prefix('?').unwrap_or(search);
    let key = search.split('&').next().unwrap_or_default();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Value of the offset field: empty counts as `0`, anything that is not a
/// finite number is rejected.
pub fn parse_offset(text: &str) -> Option<f32> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0.0);
    }
    text.parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Arrow keys and `R` on a native window.
#[derive(Debug)]
pub struct KeyboardControls {
    offset: f32,
    step: f32,
    events: Vec<ControlEvent>,
}

impl KeyboardControls {
    pub fn new(step: f32) -> Self {
        Self {
            offset: 0.0,
            step,
            events: Vec::new(),
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    fn nudge(&mut self, direction: f32) {
        self.offset += direction * self.step;
        self.events.push(ControlEvent::VerticalOffset(self.offset));
    }
}

impl ControlPanel for KeyboardControls {
    fn set_offset_value(&mut self, value: f32) {
        self.offset = value;
    }

    fn drain_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }

    fn notify_failure(&mut self, message: &str) {
        log::error!("{}", message);
    }

    fn configure(&mut self, config: &ViewerConfig) {
        self.step = config.offset_step;
    }

    fn on_window_event(&mut self, event: &WindowEvent) {
        use winit::{
            event::{ElementState, KeyEvent},
            keyboard::{KeyCode, PhysicalKey},
        };

        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } = event
        else {
            return;
        };
        match code {
            KeyCode::ArrowUp => self.nudge(1.0),
            KeyCode::ArrowDown => self.nudge(-1.0),
            KeyCode::KeyR => self.events.push(ControlEvent::ResetCamera),
            _ => {}
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::DomControls;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::{cell::RefCell, rc::Rc};

    use wasm_bindgen::{JsCast, prelude::Closure};
    use web_sys::{Event, HtmlElement, HtmlInputElement};

    use super::{ControlEvent, ControlPanel, parse_offset};

    pub const OFFSET_INPUT_ID: &str = "yPosInput";
    pub const RESET_BUTTON_ID: &str = "resetButton";

    /// The page's offset field and reset button.
    ///
    /// Either element may be missing; the matching control is then inert.
    pub struct DomControls {
        input: Option<HtmlInputElement>,
        events: Rc<RefCell<Vec<ControlEvent>>>,
        // Listeners stay registered as long as their closures live
        _listeners: Vec<Closure<dyn FnMut(Event)>>,
    }

    impl DomControls {
        pub fn new() -> anyhow::Result<Self> {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| anyhow::anyhow!("no document"))?;
            let events = Rc::new(RefCell::new(Vec::new()));
            let mut listeners = Vec::new();

            let input = document
                .get_element_by_id(OFFSET_INPUT_ID)
                .and_then(|e| e.dyn_into::<HtmlInputElement>().ok());
            match &input {
                Some(input) => {
                    let queue = events.clone();
                    let field = input.clone();
                    let on_input = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                        match parse_offset(&field.value()) {
                            Some(v) => queue.borrow_mut().push(ControlEvent::VerticalOffset(v)),
                            None => log::warn!("ignoring offset {:?}", field.value()),
                        }
                    });
                    input
                        .add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
                        .map_err(|_| anyhow::anyhow!("cannot listen to #{}", OFFSET_INPUT_ID))?;
                    listeners.push(on_input);
                }
                None => log::warn!("#{} not found, offset control disabled", OFFSET_INPUT_ID),
            }

            let button = document
                .get_element_by_id(RESET_BUTTON_ID)
                .and_then(|e| e.dyn_into::<HtmlElement>().ok());
            match &button {
                Some(button) => {
                    let queue = events.clone();
                    let on_click = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                        queue.borrow_mut().push(ControlEvent::ResetCamera);
                    });
                    button
                        .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
                        .map_err(|_| anyhow::anyhow!("cannot listen to #{}", RESET_BUTTON_ID))?;
                    listeners.push(on_click);
                }
                None => log::warn!("#{} not found, reset control disabled", RESET_BUTTON_ID),
            }

            Ok(Self {
                input,
                events,
                _listeners: listeners,
            })
        }
    }

    impl ControlPanel for DomControls {
        fn set_offset_value(&mut self, value: f32) {
            if let Some(input) = &self.input {
                input.set_value(&value.to_string());
            }
        }

        fn drain_events(&mut self) -> Vec<ControlEvent> {
            std::mem::take(&mut *self.events.borrow_mut())
        }

        fn notify_failure(&mut self, message: &str) {
            log::error!("{}", message);
            if let Some(window) = web_sys::window() {
                let _ = window.alert_with_message(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_key_is_the_first_segment() {
        assert_eq!(query_key("?alicia").as_deref(), Some("alicia"));
        assert_eq!(query_key("alicia").as_deref(), Some("alicia"));
        assert_eq!(query_key("?alicia&debug=1").as_deref(), Some("alicia"));
        assert_eq!(query_key("?a%20b").as_deref(), Some("a%20b"));
        assert_eq!(query_key(""), None);
        assert_eq!(query_key("?"), None);
        assert_eq!(query_key("?&x"), None);
    }

    #[test]
    fn offset_text() {
        assert_eq!(parse_offset(""), Some(0.0));
        assert_eq!(parse_offset(" 12.5 "), Some(12.5));
        assert_eq!(parse_offset("-3"), Some(-3.0));
        assert_eq!(parse_offset("abc"), None);
        assert_eq!(parse_offset("inf"), None);
        assert_eq!(parse_offset("NaN"), None);
    }

    #[test]
    fn keyboard_nudges_from_the_displayed_value() {
        let mut controls = KeyboardControls::new(2.0);
        controls.nudge(1.0);
        controls.nudge(1.0);
        controls.set_offset_value(0.0);
        controls.nudge(-1.0);
        assert_eq!(
            controls.drain_events(),
            [
                ControlEvent::VerticalOffset(2.0),
                ControlEvent::VerticalOffset(4.0),
                ControlEvent::VerticalOffset(-2.0)
            ]
        );
        assert!(controls.drain_events().is_empty());
        assert_eq!(controls.offset(), -2.0);
    }
}
