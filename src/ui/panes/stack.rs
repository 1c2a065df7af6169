//! Registers and evaluation stack pane

use crate::snapshot::Snapshot;
use crate::ui::panes::block::{clamp_scroll, pane_block};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{List, ListItem, Padding, Paragraph},
    Frame,
};

fn register_line(pairs: &[(&'static str, String)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (name, value) in pairs {
        spans.push(Span::styled(
            format!("{:>4} ", name),
            Style::default().fg(DEFAULT_THEME.register),
        ));
        spans.push(Span::styled(
            format!("{:<6}", value),
            Style::default().fg(DEFAULT_THEME.number),
        ));
    }
    Line::from(spans)
}

/// Lines shown above the stack words
pub(crate) fn register_lines(snapshot: &Snapshot) -> Vec<Line<'static>> {
    let r = &snapshot.registers;
    vec![
        register_line(&[
            ("sp", format!("{:04x}", r.sp)),
            ("mp", format!("{:04x}", r.mp)),
            ("base", format!("{:04x}", r.base)),
        ]),
        register_line(&[
            ("psp", format!("{:04x}", r.psp)),
            ("np", format!("{:04x}", r.np)),
            ("jtab", format!("{:04x}", r.jtab)),
        ]),
        register_line(&[
            ("seg", r.seg.to_string()),
            ("ipc", format!("{:04x}", r.ipc)),
            ("dep", snapshot.depth.to_string()),
        ]),
    ]
}

fn word_line(index: usize, word: u16) -> Line<'static> {
    let printable = match word as u8 {
        b @ 0x20..=0x7E if word < 0x100 => format!("'{}'", b as char),
        _ => String::new(),
    };
    Line::from(vec![
        Span::styled(
            format!("{:>3}  ", index),
            Style::default().fg(DEFAULT_THEME.comment),
        ),
        Span::styled(
            format!("{:04x}", word),
            Style::default().fg(DEFAULT_THEME.secondary),
        ),
        Span::styled(
            format!("  {:>6}", word as i16),
            Style::default().fg(DEFAULT_THEME.number),
        ),
        Span::styled(
            format!("  {}", printable),
            Style::default().fg(DEFAULT_THEME.success),
        ),
    ])
}

/// Render the registers and evaluation stack
pub fn render_stack_pane(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&Snapshot>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Registers & Stack ", is_focused);

    let Some(snapshot) = snapshot else {
        let paragraph = Paragraph::new("(not started)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    };

    let mut lines = register_lines(snapshot);
    lines.push(Line::from(""));
    if snapshot.stack.is_empty() {
        lines.push(Line::styled(
            "(stack empty)",
            Style::default().fg(DEFAULT_THEME.comment),
        ));
    }
    lines.extend(
        snapshot
            .stack
            .iter()
            .enumerate()
            .map(|(i, &word)| word_line(i, word)),
    );

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, lines.len(), visible_height);

    let items: Vec<ListItem> = lines
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(ListItem::new)
        .collect();

    let list = List::new(items).block(block.padding(Padding::new(1, 0, 0, 0)));
    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::engine::Registers;

    #[test]
    fn test_register_lines_show_hex() {
        let snapshot = Snapshot {
            instruction: 0,
            registers: Registers {
                sp: 0xFFEE,
                mp: 0xEFF0,
                ..Registers::default()
            },
            depth: 2,
            stack: vec![0x41],
            frames: Vec::new(),
            code: Vec::new(),
            console_len: 0,
            halted: false,
        };
        let first: String = register_lines(&snapshot)[0]
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(first.contains("ffee"));
        assert!(first.contains("eff0"));

        let word: String = word_line(0, 0x41).spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(word.contains("'A'"));
    }
}
