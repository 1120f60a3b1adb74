use anyhow::{Context, Result};
use std::path::Path;
use tryon_overlay_common::OverlayConfig;

/// JSONファイルから設定を読み込む。ファイルがなければデフォルト
pub fn load_from_path(path: &Path) -> Result<OverlayConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "設定ファイルがないためデフォルト設定を使用");
        return Ok(OverlayConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めません: {}", path.display()))?;
    let config = OverlayConfig::from_json_str(&content)
        .with_context(|| format!("設定ファイルが不正です: {}", path.display()))?;
    tracing::debug!(path = %path.display(), debug = config.debug, "設定ファイルを読み込みました");
    Ok(config)
}
