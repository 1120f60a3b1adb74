//! Try-on Overlay Web (Leptos + WASM)
//!
//! ブラウザの `<canvas>` に人物矩形を重ねて、クリックで人物を選ぶ。
//! JS からは `PersonOverlayHandle`、Leptos からは `PersonSelector` を使う。

mod binding;
mod component;
mod container;
mod handle;
mod logging;
mod surface;

pub use binding::{OverlayBinding, SelectionSink, WebFrameRequester, WebOverlay};
pub use component::{DetectionSignal, PersonSelector};
pub use container::measure;
pub use handle::{identity_of, PersonOverlayHandle};
pub use surface::{WebCanvasSurface, WebImage};

use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
}
