use tokio::sync::mpsc;

use super::{cell_to_panel, PointerEvent};
use crate::touch::{TouchPanel, TouchPoint};

/// Touch panel backed by terminal mouse events.
pub struct TerminalTouchPanel {
    events: mpsc::UnboundedReceiver<PointerEvent>,
    contact: Option<TouchPoint>,
    /// Fixed terminal size; queried live when `None`.
    size: Option<(u16, u16)>,
}

impl TerminalTouchPanel {
    pub fn new(events: mpsc::UnboundedReceiver<PointerEvent>) -> Self {
        Self {
            events,
            contact: None,
            size: None,
        }
    }

    pub fn with_size(events: mpsc::UnboundedReceiver<PointerEvent>, columns: u16, rows: u16) -> Self {
        Self {
            events,
            contact: None,
            size: Some((columns, rows)),
        }
    }

    fn terminal_size(&self) -> (u16, u16) {
        self.size
            .or_else(|| ratatui::crossterm::terminal::size().ok())
            .unwrap_or((80, 24))
    }
}

impl TouchPanel for TerminalTouchPanel {
    /// A click that starts and ends between two samples still reports the
    /// contact once, like a real panel latching a short tap.
    fn sample(&mut self) -> Option<TouchPoint> {
        let mut pressed = None;
        while let Ok(event) = self.events.try_recv() {
            match event {
                PointerEvent::Down { column, row } => {
                    let (columns, rows) = self.terminal_size();
                    let point = cell_to_panel(column, row, columns, rows);
                    if self.contact.is_none() && pressed.is_none() {
                        pressed = Some(point);
                    }
                    self.contact = Some(point);
                }
                PointerEvent::Up => self.contact = None,
            }
        }
        pressed.or(self.contact)
    }
}
