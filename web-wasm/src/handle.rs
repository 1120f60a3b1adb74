//! JavaScript から使うハンドル
//!
//! エラーは `code` プロパティ付きの JS `Error` で返す。

use crate::binding::OverlayBinding;
use serde::Serialize;
use tryon_overlay_common::{DetectionResult, Error, OverlayConfig};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement};

/// `code` プロパティ付きの JS `Error`
fn make_error(code: &str, message: &str) -> JsValue {
    let err = js_sys::Error::new(message);
    let _ = js_sys::Reflect::set(&err, &"code".into(), &JsValue::from_str(code));
    JsValue::from(err)
}

fn to_js_error(e: Error) -> JsValue {
    let code = match &e {
        Error::ImageNotReady { .. } => "IMAGE_NOT_READY",
        Error::IdentityMismatch { .. } => "IDENTITY_MISMATCH",
        Error::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
        Error::IdentityDimensionConflict { .. } => "IDENTITY_CONFLICT",
        Error::InvalidGeometry { .. } | Error::EmptyContainer { .. } | Error::InvalidDpr(_) => {
            "INVALID_GEOMETRY"
        }
        Error::Surface(_) => "SURFACE_ERROR",
        Error::Detector(_) => "DETECTOR_ERROR",
        Error::ReadyCancelled { .. } => "READY_CANCELLED",
        Error::Config(_) => "INVALID_CONFIG",
        Error::Json(_) => "INVALID_JSON",
    };
    make_error(code, &e.to_string())
}

/// `null` を `undefined` ではなく `null` として渡す
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| make_error("SERIALIZE_ERROR", &e.to_string()))
}

fn parse_config(config: JsValue) -> Result<OverlayConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        Ok(OverlayConfig::default())
    } else {
        serde_wasm_bindgen::from_value(config)
            .map_err(|e| make_error("INVALID_CONFIG", &format!("invalid config: {e}")))
    }
}

fn disposed() -> JsValue {
    make_error("DISPOSED", "overlay has been disposed")
}

/// ソース文字列から画像IDを計算する（`img.src` と同じ絶対URLを渡すこと）
#[wasm_bindgen(js_name = identityOf)]
pub fn identity_of(src: &str) -> String {
    tryon_overlay_common::identity_of(src).as_str().to_string()
}

#[wasm_bindgen]
pub struct PersonOverlayHandle {
    binding: Option<OverlayBinding>,
}

impl PersonOverlayHandle {
    fn binding(&self) -> Result<&OverlayBinding, JsValue> {
        self.binding.as_ref().ok_or_else(disposed)
    }
}

#[wasm_bindgen]
impl PersonOverlayHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: HtmlElement,
        canvas: HtmlCanvasElement,
        image: HtmlImageElement,
        config: JsValue,
    ) -> Result<PersonOverlayHandle, JsValue> {
        let config = parse_config(config)?;
        let binding = OverlayBinding::attach(container, canvas, image, config).map_err(to_js_error)?;
        Ok(Self { binding: Some(binding) })
    }

    /// 表示中の画像ID（未設定ならnull）
    #[wasm_bindgen(js_name = imageId)]
    pub fn image_id(&self) -> Option<String> {
        self.binding.as_ref()?.image_id().map(|id| id.as_str().to_string())
    }

    /// 検出結果 `{ imageId, imageWidth, imageHeight, people: [{ bbox, score }] }`
    ///
    /// 現在の画像と異なるIDの結果は破棄して false を返す。
    #[wasm_bindgen(js_name = setDetection)]
    pub fn set_detection(&self, detection: JsValue) -> Result<bool, JsValue> {
        let detection: DetectionResult = serde_wasm_bindgen::from_value(detection)
            .map_err(|e| make_error("INVALID_DETECTION", &format!("invalid detection: {e}")))?;
        Ok(self.binding()?.apply_detection(Ok(detection)))
    }

    /// 検出に失敗した（写真だけを表示する）
    #[wasm_bindgen(js_name = setDetectionFailed)]
    pub fn set_detection_failed(&self, message: String) -> Result<bool, JsValue> {
        Ok(self.binding()?.apply_detection(Err(message)))
    }

    /// `src` を書き換えた直後に呼ぶ
    #[wasm_bindgen(js_name = sourceChanged)]
    pub fn source_changed(&self) -> Result<(), JsValue> {
        self.binding()?.source_changed();
        Ok(())
    }

    /// 選択変更のコールバック。引数は `{ x, y, width, height, score }` または null
    #[wasm_bindgen(js_name = onSelectionChange)]
    pub fn on_selection_change(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.binding()?.set_selection_sink(Box::new(move |change| {
            let result = to_js(&change).and_then(|value| callback.call1(&JsValue::NULL, &value));
            if let Err(e) = result {
                tracing::warn!(error = ?e, "選択変更コールバックが失敗");
            }
        }));
        Ok(())
    }

    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.binding.as_ref().is_some_and(|b| b.is_ready())
    }

    #[wasm_bindgen(js_name = forceRedraw)]
    pub fn force_redraw(&self) -> Result<(), JsValue> {
        self.binding()?.force_redraw();
        Ok(())
    }

    #[wasm_bindgen(js_name = selectedBox)]
    pub fn selected_box(&self) -> Result<JsValue, JsValue> {
        to_js(&self.binding()?.selected_box())
    }

    /// 画像のデコード完了で解決する Promise（`{ identity, width, height }`）
    #[wasm_bindgen(js_name = whenReady)]
    pub fn when_ready(&self) -> Result<js_sys::Promise, JsValue> {
        let wait = self.binding()?.wait_ready();
        Ok(future_to_promise(async move {
            let natural = wait.await.map_err(to_js_error)?;
            to_js(&natural)
        }))
    }

    /// リスナーを解除する。以後の呼び出しは DISPOSED エラー
    pub fn dispose(&mut self) {
        self.binding = None;
    }
}
