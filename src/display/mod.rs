//! Display sinks for decoded measurements

use std::io::{self, Write};

use crate::protocol::Measurement;

/// Receives every successfully decoded measurement
pub trait DisplaySink: Send {
    fn render(&mut self, measurement: &Measurement);
}

/// Format the two display lines for a measurement
pub fn format_lines(measurement: &Measurement) -> [String; 2] {
    [
        format!("Temperature: {:.2} C", measurement.temperature_celsius()),
        format!("Humidity : {:.2} %", measurement.humidity_percent()),
    ]
}

/// Writes the two display lines to a terminal-like writer
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for ConsoleDisplay<W> {
    fn render(&mut self, measurement: &Measurement) {
        let [line1, line2] = format_lines(measurement);
        if let Err(e) = writeln!(self.out, "{}\n{}", line1, line2).and_then(|_| self.out.flush()) {
            tracing::warn!("Display write failed: {}", e);
        }
    }
}

/// Keeps every rendered measurement in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub rendered: Vec<Measurement>,
}

#[cfg(test)]
impl DisplaySink for RecordingDisplay {
    fn render(&mut self, measurement: &Measurement) {
        self.rendered.push(*measurement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lines() {
        let lines = format_lines(&Measurement::new(2345, 6012));
        assert_eq!(lines[0], "Temperature: 23.45 C");
        assert_eq!(lines[1], "Humidity : 60.12 %");
    }

    #[test]
    fn test_console_display_writes_both_lines() {
        let mut display = ConsoleDisplay::new(Vec::new());
        display.render(&Measurement::new(-150, 0));
        let written = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(written, "Temperature: -1.50 C\nHumidity : 0.00 %\n");
    }
}
