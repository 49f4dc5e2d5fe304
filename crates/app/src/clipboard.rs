//! Clipboard helper for sharing invite codes

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{AppError, AppResult};

/// Copy text to the clipboard, falling back to wl-copy on Wayland
pub fn copy_to_clipboard(text: &str) -> AppResult<()> {
    if let Ok(mut clipboard) = arboard::Clipboard::new() {
        if clipboard.set_text(text).is_ok() {
            tracing::debug!("Copied to clipboard via arboard");
            return Ok(());
        }
    }

    if try_wl_copy(text) {
        tracing::debug!("Copied to clipboard via wl-copy");
        return Ok(());
    }

    tracing::warn!("All clipboard methods failed");
    Err(AppError::Clipboard)
}

fn try_wl_copy(text: &str) -> bool {
    let Ok(mut child) = Command::new("wl-copy")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    else {
        return false;
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(text.as_bytes()).is_err() {
            return false;
        }
    }

    matches!(child.wait(), Ok(status) if status.success())
}
