//! `requestAnimationFrame` / `setTimeout` scheduling
//!
//! Frames are one-shot: each request registers a closure that frees itself
//! after it runs. Timeouts keep their closure here so a cleared timer can be
//! dropped; fired ones are swept on the next scheduler call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scrollscene_host::{FrameCallback, FrameScheduler, TimerId};
use slotmap::SlotMap;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Performance, Window};

use crate::dom::WebDom;
use crate::error::{describe, Result, WebError};

struct WebTimer {
    handle: i32,
    fired: Rc<Cell<bool>>,
    _closure: Closure<dyn FnMut()>,
}

/// Browser [`FrameScheduler`]
pub struct WebScheduler {
    window: Window,
    performance: Option<Performance>,
    timers: RefCell<SlotMap<TimerId, WebTimer>>,
}

impl WebScheduler {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        Ok(Self::with_window(window))
    }

    /// Share the window already held by a [`WebDom`]
    pub fn for_dom(dom: &WebDom) -> Self {
        Self::with_window(dom.window().clone())
    }

    fn with_window(window: Window) -> Self {
        let performance = window.performance();
        Self {
            window,
            performance,
            timers: RefCell::new(SlotMap::with_key()),
        }
    }

    fn sweep(&self) {
        self.timers.borrow_mut().retain(|_, timer| !timer.fired.get());
    }
}

impl FrameScheduler for WebScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        let closure = Closure::once_into_js(move |_timestamp: f64| callback());
        if let Err(err) = self.window.request_animation_frame(closure.unchecked_ref()) {
            tracing::warn!("requestAnimationFrame failed: {}", describe(&err));
        }
    }

    fn set_timeout(&self, delay_ms: u32, callback: FrameCallback) -> TimerId {
        self.sweep();
        let fired = Rc::new(Cell::new(false));
        let mut callback = Some(callback);
        let closure = Closure::wrap(Box::new({
            let fired = fired.clone();
            move || {
                fired.set(true);
                if let Some(callback) = callback.take() {
                    callback();
                }
            }
        }) as Box<dyn FnMut()>);

        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(closure.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => self.timers.borrow_mut().insert(WebTimer {
                handle,
                fired,
                _closure: closure,
            }),
            Err(err) => {
                tracing::warn!("setTimeout failed: {}", describe(&err));
                TimerId::default()
            }
        }
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(timer) = self.timers.borrow_mut().remove(id) {
            if !timer.fired.get() {
                self.window.clear_timeout_with_handle(timer.handle);
            }
        }
        self.sweep();
    }

    fn now_ms(&self) -> f64 {
        self.performance.as_ref().map_or(0.0, Performance::now)
    }
}
