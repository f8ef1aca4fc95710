use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use log::warn;

use crate::geometry::ScreenPoint;
use crate::overlay::{AnnotationId, PointerScope};

/// Input understood by an editing session
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Click on empty canvas, places a new annotation
    Click(ScreenPoint),
    PointerDown {
        point: ScreenPoint,
        scope: PointerScope,
    },
    PointerMove(ScreenPoint),
    PointerUp,
    EditText {
        id: AnnotationId,
        text: String,
    },
    /// The canvas moved on screen
    CanvasOffset(ScreenPoint),
    NextPage,
    PreviousPage,
    Commit,
    Download(Option<PathBuf>),
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: `{line}`")]
pub struct ParseEventError {
    pub line: String,
    pub reason: &'static str,
}

impl EditorEvent {
    /// Parse one script line.
    ///
    /// Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseEventError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let err = |reason| ParseEventError {
            line: line.to_string(),
            reason,
        };
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));
        let mut args = rest.split_whitespace();

        let event = match command.to_ascii_lowercase().as_str() {
            "click" => Self::Click(parse_point(&mut args).ok_or_else(|| err("expected X Y"))?),
            "down" => {
                let point = parse_point(&mut args).ok_or_else(|| err("expected X Y"))?;
                let scope = match args.next() {
                    None => PointerScope::Canvas,
                    Some("text") => PointerScope::TextEditing,
                    Some(_) => return Err(err("scope must be `text` or omitted")),
                };
                Self::PointerDown { point, scope }
            }
            "move" => Self::PointerMove(parse_point(&mut args).ok_or_else(|| err("expected X Y"))?),
            "up" => Self::PointerUp,
            "text" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .map_or((rest, ""), |(id, text)| (id, text.trim_start()));
                let id = id
                    .parse::<u64>()
                    .map_err(|_| err("expected annotation id"))?;
                Self::EditText {
                    id: AnnotationId::new(id),
                    text: text.to_string(),
                }
            }
            "offset" => Self::CanvasOffset(parse_point(&mut args).ok_or_else(|| err("expected X Y"))?),
            "next" => Self::NextPage,
            "prev" => Self::PreviousPage,
            "commit" => Self::Commit,
            "download" => Self::Download((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "quit" | "exit" => Self::Quit,
            _ => return Err(err("unknown command")),
        };
        Ok(Some(event))
    }
}

fn parse_point<'a>(args: &mut impl Iterator<Item = &'a str>) -> Option<ScreenPoint> {
    let x = args.next()?.parse::<f32>().ok()?;
    let y = args.next()?.parse::<f32>().ok()?;
    (x.is_finite() && y.is_finite()).then(|| ScreenPoint::new(x, y))
}

/// Trait for abstracting event sources to enable testing
pub trait EventSource {
    /// Poll for events with a timeout
    fn poll(&mut self, timeout: Duration) -> Result<bool>;

    /// Read the next event
    fn read(&mut self) -> Result<EditorEvent>;
}

/// Reads one command per line from a script file or stdin.
///
/// Malformed lines are logged and skipped.
pub struct ScriptEventSource<R> {
    reader: R,
    pending: VecDeque<EditorEvent>,
    line_number: usize,
    exhausted: bool,
}

impl<R: BufRead> ScriptEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            line_number: 0,
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let mut line = String::new();
        while self.pending.is_empty() && !self.exhausted {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.exhausted = true;
                break;
            }
            self.line_number += 1;
            match EditorEvent::parse(&line) {
                Ok(Some(event)) => self.pending.push_back(event),
                Ok(None) => {}
                Err(e) => warn!("Skipping script line {}: {e}", self.line_number),
            }
        }
        Ok(())
    }
}

impl<R: BufRead> EventSource for ScriptEventSource<R> {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        self.fill()?;
        Ok(!self.pending.is_empty())
    }

    fn read(&mut self) -> Result<EditorEvent> {
        self.fill()?;
        // End of input behaves like an explicit quit
        Ok(self.pending.pop_front().unwrap_or(EditorEvent::Quit))
    }
}

/// Simulated event source for testing
pub struct SimulatedEventSource {
    pub(crate) events: Vec<EditorEvent>,
    current_index: usize,
}

impl SimulatedEventSource {
    pub fn new(events: Vec<EditorEvent>) -> Self {
        Self {
            events,
            current_index: 0,
        }
    }
}

impl EventSource for SimulatedEventSource {
    fn poll(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.current_index < self.events.len())
    }

    fn read(&mut self) -> Result<EditorEvent> {
        let event = self
            .events
            .get(self.current_index)
            .cloned()
            .unwrap_or(EditorEvent::Quit);
        self.current_index += 1;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_commands() {
        assert_eq!(
            EditorEvent::parse("click 100 200").unwrap(),
            Some(EditorEvent::Click(ScreenPoint::new(100.0, 200.0)))
        );
        assert_eq!(
            EditorEvent::parse("down 5 6 text").unwrap(),
            Some(EditorEvent::PointerDown {
                point: ScreenPoint::new(5.0, 6.0),
                scope: PointerScope::TextEditing,
            })
        );
        assert_eq!(
            EditorEvent::parse("text 3 Hello,   world").unwrap(),
            Some(EditorEvent::EditText {
                id: AnnotationId::new(3),
                text: "Hello,   world".to_string(),
            })
        );
        assert_eq!(
            EditorEvent::parse("download").unwrap(),
            Some(EditorEvent::Download(None))
        );
        assert_eq!(
            EditorEvent::parse("download out/signed.pdf").unwrap(),
            Some(EditorEvent::Download(Some(PathBuf::from("out/signed.pdf"))))
        );
        assert_eq!(EditorEvent::parse("  # note").unwrap(), None);
        assert_eq!(EditorEvent::parse("").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(EditorEvent::parse("click 1").is_err());
        assert!(EditorEvent::parse("click a b").is_err());
        assert!(EditorEvent::parse("down 1 2 sideways").is_err());
        assert!(EditorEvent::parse("text x hi").is_err());
        assert!(EditorEvent::parse("zoom 2").is_err());
    }

    #[test]
    fn script_source_skips_bad_lines_and_ends_with_quit() {
        let script = "offset 10 10\nbogus\n\nclick 1 2\n";
        let mut source = ScriptEventSource::new(script.as_bytes());

        assert!(source.poll(Duration::ZERO).unwrap());
        assert_eq!(
            source.read().unwrap(),
            EditorEvent::CanvasOffset(ScreenPoint::new(10.0, 10.0))
        );
        assert_eq!(
            source.read().unwrap(),
            EditorEvent::Click(ScreenPoint::new(1.0, 2.0))
        );
        assert!(!source.poll(Duration::ZERO).unwrap());
        assert_eq!(source.read().unwrap(), EditorEvent::Quit);
    }

    #[test]
    fn simulated_source_replays_events() {
        let mut source = SimulatedEventSource::new(vec![EditorEvent::NextPage, EditorEvent::Commit]);

        assert!(source.poll(Duration::from_millis(0)).unwrap());
        assert_eq!(source.read().unwrap(), EditorEvent::NextPage);
        assert_eq!(source.read().unwrap(), EditorEvent::Commit);
        assert!(!source.poll(Duration::from_millis(0)).unwrap());
        assert_eq!(source.read().unwrap(), EditorEvent::Quit);
    }
}
