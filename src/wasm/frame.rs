//! Owned handles for `requestAnimationFrame`, `setTimeout` and DOM event
//! listeners. Dropping a handle cancels whatever it scheduled.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::warn;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Event, EventTarget};

use crate::error::Result;
use crate::wasm::env;

struct FrameInner {
    handle: Cell<Option<i32>>,
    // Holds the animation-frame closure so it can reschedule itself.
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl FrameInner {
    fn schedule(&self) {
        if self.handle.get().is_some() {
            return;
        }
        let callback = self.callback.borrow();
        let Some(callback) = callback.as_ref() else {
            return;
        };
        match env::window().and_then(|w| {
            w.request_animation_frame(callback.as_ref().unchecked_ref())
                .map_err(Into::into)
        }) {
            Ok(handle) => self.handle.set(Some(handle)),
            Err(err) => warn!("requestAnimationFrame failed: {err}"),
        }
    }

    fn cancel(&self) {
        if let Some(handle) = self.handle.take() {
            if let Some(window) = web_sys::window() {
                let _ = window.cancel_animation_frame(handle);
            }
        }
    }
}

/// A render loop driven by `requestAnimationFrame`.
///
/// The tick receives the frame timestamp and returns whether another frame
/// should be requested. At most one frame is pending at any time.
pub struct FrameLoop {
    inner: Rc<FrameInner>,
}

impl FrameLoop {
    pub fn new(mut tick: impl FnMut(f64) -> bool + 'static) -> Self {
        let inner = Rc::new(FrameInner {
            handle: Cell::new(None),
            callback: RefCell::new(None),
        });
        let weak: Weak<FrameInner> = Rc::downgrade(&inner);
        *inner.callback.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.handle.set(None);
            if tick(now) {
                inner.schedule();
            }
        }) as Box<dyn FnMut(f64)>));
        Self { inner }
    }

    /// Requests a frame unless one is already pending.
    pub fn start(&self) {
        self.inner.schedule();
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.inner.cancel();
    }
}

/// A pending `setTimeout`, cleared on drop.
pub struct Timeout {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Timeout {
    pub fn new(delay_ms: f64, callback: impl FnMut() + 'static) -> Result<Self> {
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
        let handle = env::window()?.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            delay_ms.max(0.0).ceil() as i32,
        )?;
        Ok(Self {
            handle,
            _callback: callback,
        })
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(self.handle);
        }
    }
}

/// An event listener that is removed again on drop.
pub struct DomListener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl DomListener {
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<Self> {
        let callback = Closure::wrap(Box::new(callback) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for DomListener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}
