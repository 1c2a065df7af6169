//! Disassembly pane with the next instruction highlighted

use crate::interpreter::disasm::Instruction;
use crate::snapshot::Snapshot;
use crate::ui::panes::block::pane_block;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

fn instruction_line(line: &Instruction, is_current: bool) -> Line<'static> {
    let (mnemonic, operands) = match line.text.split_once(' ') {
        Some((mnemonic, operands)) => (mnemonic.to_string(), operands.to_string()),
        None => (line.text.clone(), String::new()),
    };

    let marker = if is_current { "▶ " } else { "  " };
    let mut spans = vec![
        Span::styled(marker, Style::default().fg(DEFAULT_THEME.secondary)),
        Span::styled(
            format!("{:04x}  ", line.address),
            Style::default().fg(DEFAULT_THEME.comment),
        ),
        Span::styled(
            format!("{:<5}", mnemonic),
            Style::default()
                .fg(DEFAULT_THEME.mnemonic)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if !operands.is_empty() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(operands, Style::default().fg(DEFAULT_THEME.number)));
    }

    let mut line = Line::from(spans);
    if is_current {
        line = line.style(Style::default().bg(DEFAULT_THEME.current_line_bg));
    }
    line
}

/// Render the disassembly pane
pub fn render_code_pane(
    frame: &mut Frame,
    area: Rect,
    snapshot: Option<&Snapshot>,
    is_focused: bool,
) {
    let title = match snapshot {
        Some(s) => format!(" Code · segment {} ", s.registers.seg),
        None => " Code ".to_string(),
    };
    let block = pane_block(&title, is_focused);

    let Some(snapshot) = snapshot.filter(|s| !s.code.is_empty()) else {
        let paragraph = Paragraph::new("(no code)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    };

    let current = snapshot
        .registers
        .ipc_base
        .wrapping_add(snapshot.registers.ipc);
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    let current_index = snapshot
        .code
        .iter()
        .position(|line| line.address == current)
        .unwrap_or(0);
    // Keep the current instruction near the middle
    let start = current_index
        .saturating_sub(visible_height / 2)
        .min(snapshot.code.len().saturating_sub(visible_height));

    let items: Vec<ListItem> = snapshot
        .code
        .iter()
        .skip(start)
        .take(visible_height)
        .map(|line| ListItem::new(instruction_line(line, line.address == current)))
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_line_splits_operands() {
        let line = Instruction {
            address: 0x1000,
            opcode: 0,
            mnemonic: "LOD",
            text: "LOD 2, 256".to_string(),
            length: 4,
        };
        let rendered = instruction_line(&line, true);
        let text: String = rendered.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "▶ 1000  LOD   2, 256");
    }
}
