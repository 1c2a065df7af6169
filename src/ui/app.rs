//! Main TUI application state and logic
//!
//! The machine runs to completion before the viewer opens; the viewer then
//! walks the recorded snapshots in either direction.

use crate::interpreter::engine::Interpreter;
use crate::snapshot::Snapshot;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const PLAY_INTERVAL: Duration = Duration::from_millis(250);

/// Which pane is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPane {
    Code,
    Console,
    Stack,
    Frames,
}

impl FocusedPane {
    /// Move focus to the next pane (clockwise: code -> console -> stack -> frames)
    pub fn next(self) -> Self {
        match self {
            FocusedPane::Code => FocusedPane::Console,
            FocusedPane::Console => FocusedPane::Stack,
            FocusedPane::Stack => FocusedPane::Frames,
            FocusedPane::Frames => FocusedPane::Code,
        }
    }

    /// Move focus to the previous pane (counter-clockwise)
    pub fn prev(self) -> Self {
        match self {
            FocusedPane::Code => FocusedPane::Frames,
            FocusedPane::Console => FocusedPane::Code,
            FocusedPane::Stack => FocusedPane::Console,
            FocusedPane::Frames => FocusedPane::Stack,
        }
    }
}

/// The main application state
pub struct App {
    /// The machine, after its run
    pub interpreter: Interpreter,

    /// How the run ended, if not by halting
    pub outcome: Option<String>,

    /// Index of the displayed snapshot
    pub position: usize,

    /// Currently focused pane
    pub focused_pane: FocusedPane,

    /// Per-pane scroll offsets
    pub stack_scroll: usize,
    pub frames_scroll: usize,
    pub console_scroll: usize,

    /// Whether the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: String,

    /// Whether auto-play mode is active
    pub is_playing: bool,

    /// Last time a step was taken in play mode
    pub last_play_time: Instant,

    /// Last time space was pressed (for debouncing)
    pub last_space_press: Instant,
}

impl App {
    /// Create a viewer over a finished run
    pub fn new(interpreter: Interpreter, outcome: Option<String>) -> Self {
        let status_message = match (&outcome, interpreter.snapshots()) {
            (Some(message), _) => message.clone(),
            (None, Some(history)) if history.is_full() => {
                "Ready! (history truncated at the snapshot limit)".to_string()
            }
            _ => String::from("Ready!"),
        };
        App {
            interpreter,
            outcome,
            position: 0,
            focused_pane: FocusedPane::Code,
            stack_scroll: 0,
            frames_scroll: 0,
            console_scroll: usize::MAX,
            should_quit: false,
            status_message,
            is_playing: false,
            last_play_time: Instant::now(),
            last_space_press: Instant::now()
                .checked_sub(Duration::from_secs(1))
                .unwrap_or(Instant::now()),
        }
    }

    /// Number of recorded snapshots
    pub fn total_snapshots(&self) -> usize {
        self.interpreter.snapshots().map_or(0, |h| h.len())
    }

    /// The snapshot being displayed
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.interpreter
            .snapshots()
            .and_then(|h| h.get(self.position))
    }

    /// Console bytes written up to the displayed snapshot
    pub fn console_transcript(&self) -> &[u8] {
        let transcript = self.interpreter.console().transcript().unwrap_or(&[]);
        let length = self
            .current_snapshot()
            .map_or(transcript.len(), |s| s.console_len.min(transcript.len()));
        &transcript[..length]
    }

    /// Run the TUI application
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.should_quit {
                break;
            }

            // Handle auto-play mode
            if self.is_playing && self.last_play_time.elapsed() >= PLAY_INTERVAL {
                if self.step_forward() {
                    self.status_message = "Playing...".to_string();
                } else {
                    self.is_playing = false;
                    self.status_message = "Playback complete".to_string();
                }
                self.last_play_time = Instant::now();
            }

            // Use poll with timeout to allow auto-play to work
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key);
                    }
                }
            }
        }

        Ok(())
    }

    /// Render the UI
    fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Create layout: 4 panes in 2 columns, plus status bar at bottom
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(size);

        let pane_area = main_chunks[0];
        let status_area = main_chunks[1];

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(pane_area);

        // Left column: Code (top) | Console (bottom)
        let left_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(columns[0]);

        // Right column: Stack (top) | Frames (bottom)
        let right_rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(columns[1]);

        let snapshot = self.current_snapshot().cloned();
        let transcript = self.console_transcript().to_vec();

        super::panes::render_code_pane(
            frame,
            left_rows[0],
            snapshot.as_ref(),
            self.focused_pane == FocusedPane::Code,
        );

        super::panes::render_console_pane(
            frame,
            left_rows[1],
            &transcript,
            self.focused_pane == FocusedPane::Console,
            &mut self.console_scroll,
        );

        super::panes::render_stack_pane(
            frame,
            right_rows[0],
            snapshot.as_ref(),
            self.focused_pane == FocusedPane::Stack,
            &mut self.stack_scroll,
        );

        super::panes::render_frames_pane(
            frame,
            right_rows[1],
            snapshot.as_ref(),
            self.focused_pane == FocusedPane::Frames,
            &mut self.frames_scroll,
        );

        super::panes::render_status_bar(
            frame,
            status_area,
            &self.status_message,
            self.position,
            self.total_snapshots(),
            self.outcome.is_some(),
            self.is_playing,
        );
    }

    /// Handle keyboard events
    pub fn handle_key_event(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            // Number keys step forward N times directly
            KeyCode::Char(c @ '1'..='9') => {
                self.is_playing = false;
                let n = c.to_digit(10).unwrap_or(1) as usize;
                let stepped = (0..n).take_while(|_| self.step_forward()).count();
                self.status_message = format!("Stepped forward {} step(s)", stepped);
            }
            KeyCode::Tab => {
                self.focused_pane = self.focused_pane.next();
            }
            KeyCode::BackTab => {
                self.focused_pane = self.focused_pane.prev();
            }
            KeyCode::Left => {
                self.is_playing = false;
                self.status_message = if self.step_backward() {
                    "Stepped backward".to_string()
                } else {
                    "Cannot step backward: at the first instruction".to_string()
                };
            }
            KeyCode::Right => {
                self.is_playing = false;
                self.status_message = if self.step_forward() {
                    "Stepped forward".to_string()
                } else {
                    self.end_message()
                };
            }
            KeyCode::Up => match self.focused_pane {
                FocusedPane::Code => {}
                FocusedPane::Stack => self.stack_scroll = self.stack_scroll.saturating_sub(1),
                FocusedPane::Frames => self.frames_scroll = self.frames_scroll.saturating_sub(1),
                FocusedPane::Console => {
                    self.console_scroll = self.console_scroll.saturating_sub(1)
                }
            },
            KeyCode::Down => match self.focused_pane {
                FocusedPane::Code => {}
                FocusedPane::Stack => self.stack_scroll = self.stack_scroll.saturating_add(1),
                FocusedPane::Frames => self.frames_scroll = self.frames_scroll.saturating_add(1),
                FocusedPane::Console => {
                    self.console_scroll = self.console_scroll.saturating_add(1)
                }
            },
            KeyCode::Char(' ') => {
                // Toggle auto-play mode (with 200ms debounce to prevent key repeat spam)
                if self.last_space_press.elapsed() >= Duration::from_millis(200) {
                    self.last_space_press = Instant::now();
                    self.is_playing = !self.is_playing;
                    if self.is_playing {
                        self.last_play_time = Instant::now()
                            .checked_sub(PLAY_INTERVAL)
                            .unwrap_or(Instant::now());
                        self.status_message = "Playing...".to_string();
                    } else {
                        self.status_message = "Paused".to_string();
                    }
                }
            }
            KeyCode::Enter => {
                // Jump to end of execution
                self.is_playing = false;
                self.position = self.total_snapshots().saturating_sub(1);
                self.console_scroll = usize::MAX;
                self.status_message = self.end_message();
            }
            KeyCode::Backspace => {
                // Jump to start of execution
                self.is_playing = false;
                self.position = 0;
                self.console_scroll = usize::MAX;
                self.status_message = "Jumped to start".to_string();
            }
            _ => {}
        }
    }

    fn end_message(&self) -> String {
        match &self.outcome {
            Some(message) => message.clone(),
            None => "Jumped to end".to_string(),
        }
    }

    /// Move to the next snapshot; false at the end of history
    fn step_forward(&mut self) -> bool {
        if self.position + 1 >= self.total_snapshots() {
            return false;
        }
        self.position += 1;
        // Auto-scroll console to bottom
        self.console_scroll = usize::MAX;
        true
    }

    /// Move to the previous snapshot; false at the start
    fn step_backward(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        self.console_scroll = usize::MAX;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::engine::MachineConfig;
    use crate::interpreter::opcodes::op;
    use crate::segments::builder::{
        volume_image, Assembler, CodeFileBuilder, ProcedureSpec, SegmentBuilder,
    };
    use crate::snapshot::MockTerminal;
    use crate::storage::{DiskUnit, StorageManager};
    use crossterm::event::KeyModifiers;

    fn finished_run() -> App {
        let mut asm = Assembler::new();
        asm.constant(1).constant(2).op(op::ADI).op(op::XIT);
        let file = CodeFileBuilder::new()
            .segment(
                SegmentBuilder::new(0, "PASCALSY")
                    .procedure(ProcedureSpec::new(1, 0, 0, asm.finish().unwrap())),
            )
            .build();
        let mut storage = StorageManager::new();
        storage
            .attach(
                4,
                DiskUnit::from_bytes(volume_image("BOOT", &[("SYSTEM.PASCAL", &file)]), false),
            )
            .unwrap();
        let config = MachineConfig {
            snapshot_limit: Some(1 << 20),
            ..MachineConfig::default()
        };
        let mut interp = Interpreter::new(storage, Box::new(MockTerminal::new()), config);
        interp.boot(4, "SYSTEM.PASCAL").unwrap();
        interp.run().unwrap();
        App::new(interp, None)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key_event(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn test_navigation_through_history() {
        let mut app = finished_run();
        // boot plus four instructions
        assert_eq!(app.total_snapshots(), 5);
        assert_eq!(app.position, 0);

        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.current_snapshot().unwrap().stack[0], 3);

        press(&mut app, KeyCode::Left);
        assert_eq!(app.position, 2);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.position, 4);
        assert!(app.current_snapshot().unwrap().halted);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.position, 4);

        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.position, 0);
        press(&mut app, KeyCode::Char('9'));
        assert_eq!(app.position, 4);
        assert_eq!(app.status_message, "Stepped forward 4 step(s)");
    }

    #[test]
    fn test_focus_cycles_and_quit() {
        let mut app = finished_run();
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focused_pane, FocusedPane::Console);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focused_pane, FocusedPane::Code);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
