//! DOMとオーバーレイの接続
//!
//! イベントリスナー・ResizeObserver・requestAnimationFrame をオーバーレイに結び付ける。
//! 選択変更の通知はオーバーレイの借用を解放してから行う（通知先から再入できるように）。

use crate::container;
use crate::logging;
use crate::surface::{js_error, WebCanvasSurface, WebImage};
use futures::future::LocalBoxFuture;
use gloo::events::EventListener;
use gloo::render::{request_animation_frame, AnimationFrame};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tryon_overlay_common::{
    ClientRect, DetectionResult, Error, FrameRequester, ImageId, NaturalImage, OverlayConfig, PersonBox,
    PersonOverlay, PointerSample, Result,
};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement, PointerEvent, ResizeObserver, VisibilityState};

pub type WebOverlay = PersonOverlay<WebCanvasSurface, WebFrameRequester>;

/// 選択変更の通知先
pub type SelectionSink = Box<dyn FnMut(Option<PersonBox>)>;

/// `requestAnimationFrame` でフレームを要求する
pub struct WebFrameRequester {
    target: Rc<RefCell<Weak<Shared>>>,
    // Dropで要求が取り消される
    _frame: Option<AnimationFrame>,
}

impl FrameRequester for WebFrameRequester {
    fn request_frame(&mut self) {
        let target = self.target.borrow().clone();
        self._frame = Some(request_animation_frame(move |_| {
            if let Some(shared) = target.upgrade() {
                shared.run_frame();
            }
        }));
    }
}

struct Shared {
    overlay: RefCell<WebOverlay>,
    container: HtmlElement,
    sink: RefCell<Option<SelectionSink>>,
}

impl Shared {
    fn run_frame(&self) {
        let result = {
            let mut overlay = self.overlay.borrow_mut();
            let viewport = container::measure(&self.container, overlay.config());
            overlay.on_frame(viewport)
        };
        match result {
            Some(Err(e)) if e.is_precondition() => tracing::debug!(error = %e, "描画を見送り"),
            Some(Err(e)) => tracing::warn!(error = %e, "描画に失敗"),
            _ => {}
        }
        self.flush_selection();
    }

    fn with_overlay<R>(&self, f: impl FnOnce(&mut WebOverlay) -> R) -> R {
        let result = f(&mut self.overlay.borrow_mut());
        self.flush_selection();
        result
    }

    fn flush_selection(&self) {
        if self.sink.borrow().is_none() {
            return;
        }
        let Some(change) = self.overlay.borrow_mut().take_selection_change() else {
            return;
        };
        let sink = self.sink.borrow_mut().take();
        if let Some(mut sink) = sink {
            sink(change);
            let mut slot = self.sink.borrow_mut();
            if slot.is_none() {
                *slot = Some(sink);
            }
        }
    }
}

/// DOM要素に接続されたオーバーレイ。Dropで全リスナーを解除する
pub struct OverlayBinding {
    shared: Rc<Shared>,
    _listeners: Vec<EventListener>,
    resize: Option<(ResizeObserver, Closure<dyn FnMut(js_sys::Array)>)>,
}

impl OverlayBinding {
    pub fn attach(
        container: HtmlElement,
        canvas: HtmlCanvasElement,
        image: HtmlImageElement,
        config: OverlayConfig,
    ) -> Result<Self> {
        logging::init(config.debug);

        let surface = WebCanvasSurface::new(canvas.clone())?;
        let target = Rc::new(RefCell::new(Weak::new()));
        let requester = WebFrameRequester {
            target: Rc::clone(&target),
            _frame: None,
        };
        let overlay = PersonOverlay::new(surface, requester, config)?;
        let shared = Rc::new(Shared {
            overlay: RefCell::new(overlay),
            container: container.clone(),
            sink: RefCell::new(None),
        });
        *target.borrow_mut() = Rc::downgrade(&shared);

        let mut listeners = Vec::new();

        let weak = Rc::downgrade(&shared);
        let rect_source = canvas.clone();
        listeners.push(EventListener::new(&canvas, "pointerdown", move |event| {
            let (Some(shared), Some(event)) = (weak.upgrade(), event.dyn_ref::<PointerEvent>()) else {
                return;
            };
            let rect = rect_source.get_bounding_client_rect();
            let pointer = PointerSample {
                client_x: event.client_x() as f64,
                client_y: event.client_y() as f64,
            };
            let rect = ClientRect {
                left: rect.left(),
                top: rect.top(),
                width: rect.width(),
                height: rect.height(),
            };
            shared.with_overlay(|o| o.pointer_down(pointer, rect));
        }));

        let weak = Rc::downgrade(&shared);
        listeners.push(EventListener::new(&image, "load", move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.with_overlay(|o| o.image_loaded());
            }
        }));

        if let Some(window) = web_sys::window() {
            let weak = Rc::downgrade(&shared);
            listeners.push(EventListener::new(&window, "resize", move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.with_overlay(|o| o.resized());
                }
            }));

            if let Some(document) = window.document() {
                let visible = document.visibility_state() == VisibilityState::Visible;
                shared.with_overlay(|o| o.set_visible(visible));

                let weak = Rc::downgrade(&shared);
                let doc = document.clone();
                listeners.push(EventListener::new(&document, "visibilitychange", move |_| {
                    if let Some(shared) = weak.upgrade() {
                        let visible = doc.visibility_state() == VisibilityState::Visible;
                        shared.with_overlay(|o| o.set_visible(visible));
                    }
                }));
            }
        }

        let resize = match observe_resize(&container, Rc::downgrade(&shared)) {
            Ok(resize) => Some(resize),
            Err(e) => {
                tracing::warn!(error = %e, "ResizeObserverを使えません。windowのresizeのみで追従");
                None
            }
        };

        shared.with_overlay(|o| o.set_image(Some(WebImage(image))));

        Ok(Self {
            shared,
            _listeners: listeners,
            resize,
        })
    }

    /// `<img>` の src が変わった
    pub fn source_changed(&self) {
        self.shared.with_overlay(|o| {
            let image = o.image().cloned();
            o.set_image(image);
        });
    }

    /// 検出器の結果を渡す。`Err` は失敗メッセージ（写真だけを表示する）
    ///
    /// 採用されなかった（古いID・サイズ不一致）場合は false。
    pub fn apply_detection(&self, detection: std::result::Result<DetectionResult, String>) -> bool {
        let detection = detection.map_err(Error::Detector);
        self.shared.with_overlay(|o| o.set_detection(detection))
    }

    /// 通知先を登録。未配信の変更があればすぐに渡す
    pub fn set_selection_sink(&self, sink: SelectionSink) {
        *self.shared.sink.borrow_mut() = Some(sink);
        self.shared.flush_selection();
    }

    /// 表示中の画像ID。検出結果の `imageId` にはこの値を使う
    pub fn image_id(&self) -> Option<ImageId> {
        self.shared.overlay.borrow().image_id().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.overlay.borrow().is_ready()
    }

    pub fn force_redraw(&self) {
        self.shared.with_overlay(|o| o.force_redraw());
    }

    pub fn selected_box(&self) -> Option<PersonBox> {
        self.shared.overlay.borrow().selected_box()
    }

    pub fn wait_ready(&self) -> LocalBoxFuture<'static, Result<NaturalImage>> {
        self.shared.overlay.borrow_mut().wait_ready()
    }
}

impl Drop for OverlayBinding {
    fn drop(&mut self) {
        if let Some((observer, _)) = &self.resize {
            observer.disconnect();
        }
        self.shared.sink.borrow_mut().take();
    }
}

fn observe_resize(
    container: &HtmlElement,
    weak: Weak<Shared>,
) -> Result<(ResizeObserver, Closure<dyn FnMut(js_sys::Array)>)> {
    let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |_entries: js_sys::Array| {
        if let Some(shared) = weak.upgrade() {
            shared.with_overlay(|o| o.resized());
        }
    });
    let observer = ResizeObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
    observer.observe(container);
    Ok((observer, callback))
}
