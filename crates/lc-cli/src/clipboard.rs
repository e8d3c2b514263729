use lc_core::Error;

/// Put text on the system clipboard.
pub fn copy_text(text: &str) -> Result<(), Error> {
    let mut clipboard = arboard::Clipboard::new().map_err(|e| Error::clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| Error::clipboard(e.to_string()))
}
