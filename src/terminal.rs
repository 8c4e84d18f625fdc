use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{self, Clear, ClearType},
};

pub const FALLBACK_WIDTH: u16 = 80;

/// Current terminal width in columns, if it can be queried.
pub fn width() -> Option<u16> {
    match terminal::size() {
        Ok((cols, _)) if cols > 0 => Some(cols),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(%e, "terminal size unavailable");
            None
        }
    }
}

/// Wipes the screen and homes the cursor.
pub fn clear_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))
}
