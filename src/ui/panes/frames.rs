//! Call chain pane

use crate::snapshot::{FrameSummary, Snapshot};
use crate::ui::panes::block::{clamp_scroll, pane_block};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Padding, Paragraph},
    Frame,
};

fn frame_line(frame: &FrameSummary, is_active: bool) -> Line<'static> {
    let name_style = if is_active {
        Style::default()
            .fg(DEFAULT_THEME.procedure)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.muted_procedure)
    };
    let label = Style::default().fg(DEFAULT_THEME.comment);
    let number = Style::default().fg(DEFAULT_THEME.number);

    Line::from(vec![
        Span::styled(format!("{}.{:<3}", frame.segment, frame.procedure), name_style),
        Span::styled(" lex ", label),
        Span::styled(format!("{:<3}", frame.lex_level), number),
        Span::styled(" mp ", label),
        Span::styled(format!("{:04x}", frame.mp), number),
        Span::styled(" ipc ", label),
        Span::styled(format!("{:04x}", frame.ipc), number),
    ])
}

/// Render the frames pane
pub fn render_frames_pane(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&Snapshot>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Frames ", is_focused);
    let frames = snapshot.map_or(&[][..], |s| s.frames.as_slice());

    if frames.is_empty() {
        let paragraph = Paragraph::new("(no active procedures)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, frames.len(), visible_height);

    let items: Vec<ListItem> = frames
        .iter()
        .enumerate()
        .skip(*scroll_offset)
        .take(visible_height)
        .map(|(i, f)| ListItem::new(frame_line(f, i == 0)))
        .collect();

    let list = List::new(items).block(block.padding(Padding::new(1, 0, 0, 0)));
    frame.render_widget(list, area);
}
