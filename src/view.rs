use std::io::{self, Write};

use crossterm::{
    queue,
    style::{self as cstyle, Attribute, Print, ResetColor, SetAttribute, SetForegroundColor, Stylize},
};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, BorderType, Borders, Padding, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::connection::Connection;

pub const PROJECT_URL: &str = "https://github.com/thxrhmn/hmpssh";

const BANNER: &str = r" _   _                           _
| | | |_ __ ___  _ __  ___ ___| |__
| |_| | '_ ` _ \| '_ \/ __/ __| '_ \
|  _  | | | | | | |_) \__ \__ \ | | |
|_| |_|_| |_| |_| .__/|___/___/_| |_|
                |_|";

pub const HELP: [&str; 8] = [
    "1. Add Connection",
    "2. Connect to Server",
    "3. Delete Connection",
    "4. View List",
    "5. Setup SSH Key",
    "6. Backup Config",
    "7. Restore Config",
    "8. Exit",
];

/// Card width without borders.
pub const CARD_WIDTH: u16 = 30;
/// Border columns around a card.
pub const CARD_BORDER: u16 = 2;
pub const COLUMN_WIDTH: u16 = CARD_WIDTH + CARD_BORDER;
const CARD_HEIGHT: u16 = 5;
const CARD_PADDING: u16 = 1;

const NAME_COLOR: Color = Color::White;
const DETAIL_COLOR: Color = Color::DarkGray;

/// How many cards fit side by side.
pub fn columns_for(width: u16) -> u16 {
    match width {
        w if w >= COLUMN_WIDTH * 3 => 3,
        w if w >= COLUMN_WIDTH * 2 => 2,
        _ => 1,
    }
}

/// Writes the connections as bordered cards, `cols` per row. Each row is
/// rendered on its own so the off-screen buffer stays one card high.
pub fn write_grid<W: Write>(out: &mut W, conns: &[Connection], cols: u16) -> io::Result<()> {
    for row in conns.chunks(usize::from(cols.max(1))) {
        write_buffer(out, &render_row(row))?;
    }
    Ok(())
}

/// Renders one row of cards, left to right.
pub fn render_row(row: &[Connection]) -> Buffer {
    let areas: Vec<Rect> = row
        .iter()
        .scan(0u16, |x, _| {
            let area = Rect::new(*x, 0, COLUMN_WIDTH, CARD_HEIGHT);
            *x = x.saturating_add(COLUMN_WIDTH);
            Some(area)
        })
        .collect();
    let width = areas.last().map_or(0, |area| area.right());

    let mut buf = Buffer::empty(Rect::new(0, 0, width, CARD_HEIGHT));
    for (conn, area) in row.iter().zip(areas) {
        card(conn).render(area, &mut buf);
    }
    buf
}

fn card(conn: &Connection) -> Paragraph<'static> {
    let inner = (CARD_WIDTH - CARD_PADDING * 2) as usize;
    let lines = vec![
        Line::styled(
            fit(&format!("Name: {}", conn.name), inner),
            Style::default().fg(NAME_COLOR),
        ),
        Line::styled(
            fit(&format!("User: {}", conn.user), inner),
            Style::default().fg(DETAIL_COLOR),
        ),
        Line::styled(
            fit(&format!("Host: {}:{}", conn.host, conn.port), inner),
            Style::default().fg(DETAIL_COLOR),
        ),
    ];

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .padding(Padding::horizontal(CARD_PADDING)),
    )
}

/// Cuts `text` to `width` display columns, ending in an ellipsis when cut.
pub fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Writes a rendered buffer with its foreground colours.
fn write_buffer<W: Write>(out: &mut W, buf: &Buffer) -> io::Result<()> {
    let area = buf.area();
    for y in area.top()..area.bottom() {
        let mut fg = Color::Reset;
        let mut skip = 0;
        for x in area.left()..area.right() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let cell = buf.get(x, y);
            if cell.fg != fg {
                fg = cell.fg;
                queue!(out, SetForegroundColor(term_color(fg)))?;
            }
            let symbol = cell.symbol();
            skip = symbol.width().saturating_sub(1);
            queue!(out, Print(symbol))?;
        }
        queue!(out, ResetColor, Print("\n"))?;
    }
    out.flush()
}

fn term_color(color: Color) -> cstyle::Color {
    match color {
        Color::Reset => cstyle::Color::Reset,
        Color::White => cstyle::Color::White,
        Color::Gray => cstyle::Color::Grey,
        Color::DarkGray => cstyle::Color::DarkGrey,
        Color::Black => cstyle::Color::Black,
        Color::Rgb(r, g, b) => cstyle::Color::Rgb { r, g, b },
        Color::Indexed(i) => cstyle::Color::AnsiValue(i),
        _ => cstyle::Color::Reset,
    }
}

pub fn banner<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{BANNER}")?;
    writeln!(out, "{PROJECT_URL}")?;
    writeln!(out)
}

pub fn help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", HELP.join("\n"))
}

/// `[i] name (user@host)` lines used when picking a connection.
pub fn selection_list<W: Write>(out: &mut W, conns: &[Connection]) -> io::Result<()> {
    for (i, conn) in conns.iter().enumerate() {
        writeln!(
            out,
            "[{i}] {} ({}@{})",
            conn.name.as_str().white(),
            conn.user.as_str().dark_grey(),
            conn.host.as_str().dark_grey()
        )?;
    }
    Ok(())
}

pub fn header<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Bold))?;
    writeln!(out, "{}", msg.white())?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(())
}

pub fn info<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{}", msg.dark_grey())
}

pub fn success<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{}", format!("✓ {msg}").white())
}

pub fn error<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{}", format!("✗ {msg}").dark_grey())
}

pub fn warning<W: Write>(out: &mut W, msg: &str) -> io::Result<()> {
    writeln!(out, "{}", format!("⚠ {msg}").dark_grey())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain text of each buffer row, trailing blanks removed.
    fn buffer_lines(buf: &Buffer) -> Vec<String> {
        let area = buf.area();
        (area.top()..area.bottom())
            .map(|y| {
                let mut line = String::new();
                let mut skip = 0;
                for x in area.left()..area.right() {
                    if skip > 0 {
                        skip -= 1;
                        continue;
                    }
                    let symbol = buf.get(x, y).symbol();
                    skip = symbol.width().saturating_sub(1);
                    line.push_str(symbol);
                }
                line.trim_end().to_string()
            })
            .collect()
    }

    fn conns(n: usize) -> Vec<Connection> {
        (0..n)
            .map(|i| Connection::new(&format!("srv{i}"), "root", "10.0.0.1", "").unwrap())
            .collect()
    }

    #[test]
    fn column_thresholds() {
        assert_eq!(columns_for(120), 3);
        assert_eq!(columns_for(96), 3);
        assert_eq!(columns_for(95), 2);
        assert_eq!(columns_for(70), 2);
        assert_eq!(columns_for(64), 2);
        assert_eq!(columns_for(63), 1);
        assert_eq!(columns_for(50), 1);
        assert_eq!(columns_for(0), 1);
    }

    fn grid_text(conns: &[Connection], cols: u16) -> Vec<String> {
        let mut out = Vec::new();
        write_grid(&mut out, conns, cols).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn row_buffer_is_one_card_high() {
        let buf = render_row(&conns(2));
        assert_eq!(buf.area().width, 64);
        assert_eq!(buf.area().height, CARD_HEIGHT);

        let lines = buffer_lines(&buf);
        assert!(lines[0].starts_with('╭'));
        assert!(lines[1].contains("Name: srv0"));
        assert!(lines[1].contains("Name: srv1"));
        assert!(lines[3].contains("Host: 10.0.0.1:22"));
    }

    #[test]
    fn grid_has_one_card_row_per_group() {
        let lines = grid_text(&conns(5), 2);
        assert_eq!(lines.len(), 15);
        assert!(lines[1].contains("Name: srv0"));
        assert!(lines[1].contains("Name: srv1"));
        assert!(lines[6].contains("Name: srv2"));
        assert!(lines[11].contains("Name: srv4"));
        assert!(!lines[11].contains("srv5"));
    }

    #[test]
    fn single_column_stacks_cards() {
        let lines = grid_text(&conns(2), columns_for(50));
        assert_eq!(lines.len(), 10);
        assert!(lines[2].contains("User: root"));
        assert!(lines[6].contains("Name: srv1"));
    }

    #[test]
    fn large_stores_render_every_card() {
        let lines = grid_text(&conns(1000), 3);
        // 334 rows, the last holding a single card
        assert_eq!(lines.len(), 334 * 5);
        let last_name = &lines[333 * 5 + 1];
        assert!(last_name.contains("Name: srv999"));
        assert!(!last_name.contains("srv998"));
    }

    #[test]
    fn empty_list_renders_nothing() {
        assert!(grid_text(&[], 3).is_empty());
    }

    #[test]
    fn card_text_gets_ellipsis() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("abcdefghijkl", 5), "abcd…");
        assert_eq!(fit("日本語テキスト", 7), "日本語…");

        let conn =
            Connection::new("a-really-long-connection-name", "root", "h", "").unwrap();
        let lines = buffer_lines(&render_row(&[conn]));
        assert!(lines[1].contains('…'));
        assert_eq!(lines[1].chars().last(), Some('│'));
    }

    #[test]
    fn colours_follow_roles() {
        let buf = render_row(&conns(1));
        // first content cell inside border and padding
        assert_eq!(buf.get(2, 1).fg, NAME_COLOR);
        assert_eq!(buf.get(2, 2).fg, DETAIL_COLOR);

        let mut out = Vec::new();
        write_buffer(&mut out, &buf).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Name: srv0"));
        assert_eq!(text.matches('\n').count(), 5);
    }

    #[test]
    fn selection_list_is_numbered() {
        let mut out = Vec::new();
        selection_list(&mut out, &conns(2)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[0] "));
        assert!(text.contains("[1] "));
        assert!(text.contains("srv1"));
    }
}
