use crate::traversal::criteria::TraceRow;
use csv::Writer;
use serde::Serialize;
use std::fs;
use std::io;

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    hop: u32,
    vessel: &'a str,
    container: &'a str,
    position: &'a str,
    event: &'a str,
    event_type: &'a str,
    samples_json: String,
}

/// Writes traversal traces as CSV, one row per visited node.
pub struct TraversalLogger {
    writer: Writer<fs::File>,
}

impl TraversalLogger {
    pub fn new(path: &str) -> Result<Self, io::Error> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log_trace(&mut self, rows: &[TraceRow]) -> Result<(), anyhow::Error> {
        for row in rows {
            let entry = LogEntry {
                hop: row.hop,
                vessel: row.vessel.as_deref().unwrap_or(""),
                container: row.container.as_deref().unwrap_or(""),
                position: row.position.as_deref().unwrap_or(""),
                event: row.event.as_deref().unwrap_or(""),
                event_type: row.event_type.as_deref().unwrap_or(""),
                samples_json: serde_json::to_string(&row.samples)?,
            };
            self.writer.serialize(entry)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
