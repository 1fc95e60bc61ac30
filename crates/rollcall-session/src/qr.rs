//! QR rendering of session payloads.

use qrcode::{render::svg, EcLevel, QrCode};

use crate::{Error, Result};

/// Pixels per QR module.
pub const DEFAULT_MODULE_PX: u32 = 8;

/// Render `payload` as a standalone SVG document.
pub fn render_svg(payload: &str, module_px: u32) -> Result<String> {
  let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
    .map_err(|e| Error::Qr(e.to_string()))?;

  let px = module_px.max(1);
  Ok(
    code
      .render::<svg::Color<'_>>()
      .module_dimensions(px, px)
      .quiet_zone(true)
      .build(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_an_svg_document() {
    let svg = render_svg(r#"{"subjectId":"S_id","sessionDate":"03/03/2025"}"#, DEFAULT_MODULE_PX)
      .unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));
  }

  #[test]
  fn module_size_scales_the_image() {
    let small = render_svg("payload", 2).unwrap();
    let large = render_svg("payload", 16).unwrap();
    assert!(small.contains("width=\""));
    assert_ne!(small, large);
  }

  #[test]
  fn oversized_payload_is_an_error() {
    let huge = "x".repeat(8_000);
    assert!(matches!(render_svg(&huge, 4), Err(Error::Qr(_))));
  }
}
