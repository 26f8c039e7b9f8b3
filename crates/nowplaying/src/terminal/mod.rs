//! Terminal stand-in for the panel hardware.
//!
//! The 480×480 panel is stretched over the whole terminal: the presenter
//! draws with ratatui and mouse clicks become touches at the matching panel
//! coordinates. Everything above the [`crate::presenter::DisplayPresenter`]
//! and [`crate::touch::TouchPanel`] seams runs unchanged.

mod panel;
mod presenter;

pub use panel::TerminalTouchPanel;
pub use presenter::TerminalPresenter;

use std::io::{self, Stdout};
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::buttons::{Rect, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::touch::TouchPoint;

const INPUT_POLL: Duration = Duration::from_millis(100);

// ── Terminal setup ────────────────────────────────────────────────────────────

/// Raw mode, alternate screen and mouse capture for as long as it lives.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn enter() -> anyhow::Result<(Self, Terminal<CrosstermBackend<Stdout>>)> {
        enable_raw_mode()?;
        // From here on, an early return restores the terminal through Drop.
        let guard = Self { _private: () };
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!("terminal: entered, size={:?}", terminal.size());
        Ok((guard, terminal))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        debug!("terminal: restored");
    }
}

// ── Input ─────────────────────────────────────────────────────────────────────

/// Left-button state in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { column: u16, row: u16 },
    Up,
}

/// Read terminal events on a blocking thread. Mouse events are forwarded;
/// `q`, `Esc` or Ctrl-C cancel `cancel`. The thread exits shortly after
/// cancellation.
pub fn spawn_input_reader(cancel: CancellationToken) -> mpsc::UnboundedReceiver<PointerEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !cancel.is_cancelled() {
            match event::poll(INPUT_POLL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("terminal: event poll failed: {}", e);
                    break;
                }
            }
            let pointer = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                        info!("terminal: quit requested");
                        cancel.cancel();
                    }
                    None
                }
                Ok(Event::Mouse(mouse)) => match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left)
                    | MouseEventKind::Drag(MouseButton::Left) => Some(PointerEvent::Down {
                        column: mouse.column,
                        row: mouse.row,
                    }),
                    MouseEventKind::Up(MouseButton::Left) => Some(PointerEvent::Up),
                    _ => None,
                },
                Ok(_) => None,
                Err(e) => {
                    warn!("terminal: event read failed: {}", e);
                    break;
                }
            };
            if let Some(pointer) = pointer {
                if tx.send(pointer).is_err() {
                    break;
                }
            }
        }
        debug!("terminal: input reader stopped");
    });
    rx
}

// ── Geometry ──────────────────────────────────────────────────────────────────

fn scale(value: u16, from: u16, to: u16) -> u16 {
    (u32::from(value) * u32::from(to) / u32::from(from.max(1))) as u16
}

/// Cells covering a panel rectangle when the panel fills `area`.
pub fn panel_to_cells(rect: Rect, area: layout::Rect) -> layout::Rect {
    if area.width == 0 || area.height == 0 {
        return layout::Rect::default();
    }
    let left = scale(rect.x, SCREEN_WIDTH, area.width).min(area.width - 1);
    let top = scale(rect.y, SCREEN_HEIGHT, area.height).min(area.height - 1);
    let right = scale(rect.x.saturating_add(rect.w), SCREEN_WIDTH, area.width).min(area.width);
    let bottom = scale(rect.y.saturating_add(rect.h), SCREEN_HEIGHT, area.height).min(area.height);
    layout::Rect::new(
        area.x + left,
        area.y + top,
        right.saturating_sub(left).max(1),
        bottom.saturating_sub(top).max(1),
    )
}

/// Panel coordinates of the centre of a terminal cell.
pub fn cell_to_panel(column: u16, row: u16, columns: u16, rows: u16) -> TouchPoint {
    let axis = |cell: u16, cells: u16, pixels: u16| -> u16 {
        let cells = u32::from(cells.max(1));
        let centre = (2 * u32::from(cell) + 1) * u32::from(pixels) / (2 * cells);
        centre.min(u32::from(pixels) - 1) as u16
    };
    TouchPoint::new(
        axis(column, columns, SCREEN_WIDTH),
        axis(row, rows, SCREEN_HEIGHT),
    )
}

/// Cut `text` to `width` columns, ending with `…` when shortened.
pub fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}
