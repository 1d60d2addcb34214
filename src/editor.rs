use std::io::{self, BufRead, Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    terminal::{self, ClearType},
    tty::IsTty,
};

use crate::history::History;

/// Leaves raw mode when dropped, including on early return or panic.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum KeyAction {
    Continue,
    Redraw,
    Submit(String),
    Cancel,
    Eof,
}

/// Prompt reader. On a terminal it offers cursor movement and Up/Down
/// recall from the shell history; otherwise it reads plain lines.
#[derive(Default)]
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    /// Position in the history while browsing with Up/Down.
    recall: Option<usize>,
    /// What was typed before the first Up, restored past the newest entry.
    draft: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one line. `Ok(None)` means end of input.
    pub fn read_line(&mut self, prompt: &str, history: &History) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return read_plain_line(prompt);
        }

        self.clear();
        let _raw = RawModeGuard::enter()?;
        let mut out = io::stdout();
        write!(out, "{prompt}")?;
        out.flush()?;

        loop {
            let key = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => key,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            match self.handle_key(key, history) {
                KeyAction::Continue => {}
                KeyAction::Redraw => self.redraw(&mut out, prompt)?,
                KeyAction::Submit(line) => {
                    write!(out, "\r\n")?;
                    out.flush()?;
                    return Ok(Some(line));
                }
                KeyAction::Cancel => {
                    write!(out, "^C\r\n{prompt}")?;
                    out.flush()?;
                    self.clear();
                }
                KeyAction::Eof => {
                    write!(out, "\r\n")?;
                    out.flush()?;
                    return Ok(None);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.recall = None;
        self.draft.clear();
    }

    fn line(&self) -> String {
        self.buffer.iter().collect()
    }

    fn handle_key(&mut self, key: KeyEvent, history: &History) -> KeyAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Enter => return KeyAction::Submit(self.line()),
            KeyCode::Char('d') if ctrl => {
                if self.buffer.is_empty() {
                    return KeyAction::Eof;
                }
                self.delete_at_cursor();
            }
            // Raw mode turns off ISIG, so Ctrl-C arrives here as a key.
            KeyCode::Char('c') if ctrl => return KeyAction::Cancel,
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Home => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.buffer.len(),
            KeyCode::End => self.cursor = self.buffer.len(),
            KeyCode::Char('u') if ctrl => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
            }
            KeyCode::Char('k') if ctrl => self.buffer.truncate(self.cursor),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            KeyCode::Up => self.recall_older(history),
            KeyCode::Down => self.recall_newer(history),
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                }
            }
            KeyCode::Delete => self.delete_at_cursor(),
            KeyCode::Char(c) if !ctrl => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            _ => return KeyAction::Continue,
        }

        KeyAction::Redraw
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn recall_older(&mut self, history: &History) {
        let index = match self.recall {
            None if history.is_empty() => return,
            None => {
                self.draft = self.line();
                history.len() - 1
            }
            Some(0) => return,
            Some(i) => i - 1,
        };
        self.show_entry(history.get(index).unwrap_or_default());
        self.recall = Some(index);
    }

    fn recall_newer(&mut self, history: &History) {
        let Some(current) = self.recall else {
            return;
        };
        if current + 1 < history.len() {
            self.recall = Some(current + 1);
            self.show_entry(history.get(current + 1).unwrap_or_default());
        } else {
            self.recall = None;
            let draft = std::mem::take(&mut self.draft);
            self.show_entry(&draft);
        }
    }

    fn show_entry(&mut self, entry: &str) {
        self.buffer = entry.chars().collect();
        self.cursor = self.buffer.len();
    }

    fn redraw(&self, out: &mut impl Write, prompt: &str) -> io::Result<()> {
        // crossterm sends the column one-based, so u16::MAX itself overflows.
        let column = u16::try_from(prompt.chars().count() + self.cursor)
            .map_or(u16::MAX - 1, |c| c.min(u16::MAX - 1));
        queue!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine)
        )?;
        write!(out, "{prompt}{}", self.line())?;
        queue!(out, cursor::MoveToColumn(column))?;
        out.flush()
    }
}

/// Non-terminal input: print the prompt and read up to the next newline.
fn read_plain_line(prompt: &str) -> io::Result<Option<String>> {
    let mut out = io::stdout();
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}
