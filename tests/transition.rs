#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use js_sys::Promise;
use portfolio_fx::choreographer::{TransitionPhase, TransitionRequest};
use portfolio_fx::config::{FxConfig, TransitionConfig};
use portfolio_fx::context_tracker::ContextTracker;
use portfolio_fx::morph::Rect;
use portfolio_fx::wasm::director::TransitionDirector;
use portfolio_fx::wasm::media_element::load_image;
use portfolio_fx::wasm::perlin_overlay::{PerlinOptions, PerlinOverlay};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement};

wasm_bindgen_test_configure!(run_in_browser);

const CLEAR_PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
const RED_PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

fn mounted_canvas(width_px: u32, height_px: u32) -> HtmlCanvasElement {
    let canvas: HtmlCanvasElement = document().create_element("canvas").unwrap().dyn_into().unwrap();
    canvas
        .set_attribute("style", &format!("width:{width_px}px;height:{height_px}px;display:block"))
        .unwrap();
    document().body().unwrap().append_child(&canvas).unwrap();
    canvas
}

fn mounted_element(tag: &str) -> HtmlElement {
    let element: HtmlElement = document().create_element(tag).unwrap().dyn_into().unwrap();
    document().body().unwrap().append_child(&element).unwrap();
    element
}

async fn sleep(ms: i32) {
    let promise = Promise::new(&mut |resolve, _| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

async fn wait_until(mut done: impl FnMut() -> bool, timeout_ms: f64) -> bool {
    let started = js_sys::Date::now();
    while !done() {
        if js_sys::Date::now() - started > timeout_ms {
            return false;
        }
        sleep(16).await;
    }
    true
}

async fn loaded(url: &str) -> HtmlImageElement {
    let image = load_image(url).unwrap();
    assert!(wait_until(|| image.complete() && image.natural_width() > 0, 2000.0).await);
    image
}

fn options(progress: Option<f64>, duration_ms: f64) -> PerlinOptions {
    PerlinOptions {
        progress,
        duration_ms,
        ..PerlinOptions::from_config(&TransitionConfig::default())
    }
}

fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let count = Rc::new(Cell::new(0));
    let bump = {
        let count = Rc::clone(&count);
        move || count.set(count.get() + 1)
    };
    (count, bump)
}

#[wasm_bindgen_test]
async fn noise_overlay_waits_for_both_images() {
    let tracker = ContextTracker::new(16);
    let from = loaded(CLEAR_PIXEL).await;
    let to = load_image(RED_PIXEL).unwrap();

    let overlay = PerlinOverlay::new(
        mounted_canvas(64, 64),
        tracker.clone(),
        Some(1.0),
        from,
        to,
        options(Some(0.0), 1000.0),
    );
    assert!(!overlay.is_initialized());
    assert_eq!(tracker.live(), 0);

    assert!(wait_until(|| overlay.is_initialized(), 2000.0).await);
    assert_eq!(tracker.live(), 1);
    assert!(!overlay.has_completed());
}

#[wasm_bindgen_test]
async fn external_progress_completes_once_until_rewound() {
    let tracker = ContextTracker::new(16);
    let mut overlay = PerlinOverlay::new(
        mounted_canvas(64, 64),
        tracker.clone(),
        Some(1.0),
        loaded(CLEAR_PIXEL).await,
        loaded(RED_PIXEL).await,
        options(Some(0.0), 1000.0),
    );
    let (count, bump) = counter();
    overlay.on_complete(bump);
    assert!(wait_until(|| overlay.is_initialized(), 2000.0).await);

    overlay.set_progress(1.0);
    assert!(wait_until(|| count.get() == 1, 2000.0).await);
    overlay.set_progress(1.0);
    sleep(100).await;
    assert_eq!(count.get(), 1);

    overlay.set_progress(0.0);
    overlay.set_progress(1.0);
    assert!(wait_until(|| count.get() == 2, 2000.0).await);

    overlay.dispose();
    assert_eq!(tracker.live(), 0);
}

#[wasm_bindgen_test]
async fn internal_timeline_completes_through_its_own_loop() {
    let tracker = ContextTracker::new(16);
    let mut overlay = PerlinOverlay::new(
        mounted_canvas(64, 64),
        tracker.clone(),
        Some(1.0),
        loaded(CLEAR_PIXEL).await,
        loaded(RED_PIXEL).await,
        options(None, 60.0),
    );
    let (count, bump) = counter();
    overlay.on_complete(bump);

    assert!(wait_until(|| overlay.has_completed(), 2000.0).await);
    sleep(100).await;
    assert_eq!(count.get(), 1);
    assert_eq!(overlay.progress(), 1.0);

    drop(overlay);
    assert_eq!(tracker.live(), 0);
}

#[wasm_bindgen_test]
async fn new_image_pair_rebuilds_on_a_fresh_canvas() {
    let tracker = ContextTracker::new(16);
    let canvas = mounted_canvas(64, 64);
    let mut overlay = PerlinOverlay::new(
        canvas.clone(),
        tracker.clone(),
        Some(1.0),
        loaded(CLEAR_PIXEL).await,
        loaded(RED_PIXEL).await,
        options(Some(0.5), 1000.0),
    );
    assert!(wait_until(|| overlay.is_initialized(), 2000.0).await);

    overlay.set_images(loaded(RED_PIXEL).await, loaded(CLEAR_PIXEL).await);
    assert!(!overlay.is_initialized());
    assert_eq!(tracker.live(), 0);

    assert!(wait_until(|| overlay.is_initialized(), 2000.0).await);
    assert_eq!(tracker.live(), 1);
    // the first context was lost on teardown, so the canvas was swapped
    let current = overlay.canvas();
    assert!(current != canvas);
    assert!(current.is_connected());
    assert!(!canvas.is_connected());

    overlay.dispose();
    assert_eq!(tracker.live(), 0);
}

#[wasm_bindgen_test]
async fn second_overlay_on_a_released_canvas_still_draws() {
    let tracker = ContextTracker::new(16);
    let canvas = mounted_canvas(64, 64);
    let mut first = PerlinOverlay::new(
        canvas.clone(),
        tracker.clone(),
        Some(1.0),
        loaded(CLEAR_PIXEL).await,
        loaded(RED_PIXEL).await,
        options(Some(0.0), 1000.0),
    );
    assert!(wait_until(|| first.is_initialized(), 2000.0).await);
    first.dispose();
    assert_eq!(tracker.live(), 0);

    let second = PerlinOverlay::new(
        first.canvas(),
        tracker.clone(),
        Some(1.0),
        loaded(CLEAR_PIXEL).await,
        loaded(RED_PIXEL).await,
        options(Some(0.0), 1000.0),
    );
    assert!(wait_until(|| second.is_initialized(), 2000.0).await);
    assert_eq!(tracker.live(), 1);
    assert!(second.canvas() != canvas);
}

fn mounted_director(tracker: &Rc<ContextTracker>) -> (TransitionDirector, HtmlElement, HtmlCanvasElement) {
    let mut config = FxConfig::default();
    config.transition.morph_ms = 40.0;
    config.transition.pause_ms = 20.0;
    config.transition.noise_ms = 200.0;

    let content = mounted_element("p");
    let noise = mounted_canvas(64, 64);
    let director = TransitionDirector::with_reduced_motion(
        mounted_element("img"),
        noise.clone(),
        Rc::clone(tracker),
        config,
        false,
    );
    director.set_content(vec![content.clone()]);
    (director, content, noise)
}

fn display(element: &HtmlElement) -> String {
    element.style().get_property_value("display").unwrap()
}

#[wasm_bindgen_test]
async fn unmeasured_empty_source_still_reveals_content() {
    let tracker = ContextTracker::new(16);
    let (director, content, _) = mounted_director(&tracker);
    let (count, bump) = counter();

    director.begin(
        TransitionRequest {
            source_rect: Rect::default(),
            source_image: CLEAR_PIXEL.into(),
            media: vec![CLEAR_PIXEL.into()],
        },
        None,
        Some(Box::new(bump)),
    );
    assert_eq!(content.style().get_property_value("opacity").unwrap(), "0");

    assert!(wait_until(|| count.get() == 1, 2000.0).await);
    assert_eq!(director.phase(), TransitionPhase::Complete);
    assert_eq!(content.style().get_property_value("opacity").unwrap(), "1");
}

#[wasm_bindgen_test]
async fn back_to_back_noise_transitions_complete_and_release_contexts() {
    let tracker = ContextTracker::new(16);
    let (director, content, noise) = mounted_director(&tracker);
    let request = TransitionRequest {
        source_rect: Rect::new(10.0, 10.0, 40.0, 30.0),
        source_image: CLEAR_PIXEL.into(),
        media: vec![CLEAR_PIXEL.into(), RED_PIXEL.into()],
    };

    for round in 1..=2 {
        let (count, bump) = counter();
        director.begin(request.clone(), None, Some(Box::new(bump)));
        assert!(
            wait_until(|| director.phase() == TransitionPhase::NoiseTransition, 2000.0).await,
            "round {round} never reached the noise phase"
        );
        assert!(wait_until(|| count.get() == 1, 2000.0).await);

        assert_eq!(director.phase(), TransitionPhase::Complete);
        assert_eq!(director.progress(), 1.0);
        assert_eq!(tracker.live(), 0);
        assert_eq!(content.style().get_property_value("opacity").unwrap(), "1");
    }
    // the noise canvas of the first round lost its context and was replaced
    let current = director.noise_canvas();
    assert!(current != noise);
    assert!(current.is_connected());
    assert!(!noise.is_connected());
    assert_eq!(display(current.as_ref()), "none");
}
