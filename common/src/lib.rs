//! Try-on Overlay Common Library
//!
//! 複数人が写った写真で人物を選ぶためのバウンディングボックス・オーバーレイ。
//! ネイティブ（ラスタ）とWeb(WASM)で共有される型とロジック

pub mod types;
pub mod error;
pub mod config;
pub mod identity;
pub mod ready;
pub mod geometry;
pub mod surface;
pub mod renderer;
pub mod selection;
pub mod scheduler;
pub mod overlay;

pub use types::{DetectionResult, ImageId, NaturalImage, PersonBox, Rect, Selection};
pub use error::{Error, Result};
pub use config::{BoxStyle, Breakpoint, Color, OverlayConfig};
pub use identity::{identity_of, IdentityCache, ImageSource, ReadinessValidator, ReadyCheck};
pub use ready::ReadySignal;
pub use geometry::{fit, CanvasBackingStore, ContainerBox, DisplayGeometry, Viewport};
pub use surface::CanvasSurface;
pub use renderer::{CanvasRenderer, DrawRequest, FrameGeometry, RenderState};
pub use hit_test::{ClientRect, PointerSample};
pub use selection::{SelectionController, SelectionListener};
pub use scheduler::{FrameRequester, ManualFrames, RedrawScheduler, RedrawTrigger};
pub use overlay::{DetectionState, PersonOverlay};
