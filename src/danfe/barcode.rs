// ── Access Key Barcode ─────────────────────────────────────────
use barcoders::sym::code128::Code128;

use super::canvas::Canvas;
use crate::error::RenderError;
use crate::nfe::AccessKey;

/// Code 128 modules for the key, using character set C (digit pairs).
pub fn access_key_modules(key: &AccessKey) -> Result<Vec<u8>, RenderError> {
    // Ć selects set C in barcoders
    let data = format!("\u{0106}{}", key.as_str());
    let barcode =
        Code128::new(&data).map_err(|e| RenderError::Barcode(format!("Code128: {}", e)))?;
    Ok(barcode.encode())
}

/// Collapses runs of dark modules into (start, length) pairs.
fn bar_runs(modules: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &m) in modules.iter().enumerate() {
        match (m == 1, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i - s));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, modules.len() - s));
    }
    runs
}

/// Paints the barcode centred inside the given box.
pub fn draw_access_key(
    canvas: &mut Canvas,
    key: &AccessKey,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> Result<(), RenderError> {
    let modules = access_key_modules(key)?;
    if modules.is_empty() {
        return Err(RenderError::Barcode("código de barras vazio".into()));
    }
    let module = width / modules.len() as f32;
    for (start, len) in bar_runs(&modules) {
        canvas.fill_rect(x + start as f32 * module, y, len as f32 * module, height);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_encodes_as_set_c() {
        let key = AccessKey::parse("42250485179240000239550020004175331780623268").unwrap();
        let modules = access_key_modules(&key).unwrap();
        // 22 digit pairs are far narrower than 44 set-B characters
        assert!(modules.len() < 11 * 44);
        assert!(modules.len() > 11 * 22);
        assert_eq!(modules[0], 1);
    }

    #[test]
    fn runs_group_consecutive_bars() {
        assert_eq!(bar_runs(&[1, 1, 0, 1, 0, 0, 1]), vec![(0, 2), (3, 1), (6, 1)]);
        assert!(bar_runs(&[0, 0]).is_empty());
    }
}
