//! Listing writers for the two tables.
//!
//! This module renders messages and location buckets as TXT, CSV or JSON to
//! any writer: stdout for the CLI listings, or a file when an output path is
//! given.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::Writer;

use crate::error::Result;
use crate::models::{LocationReportBucket, Message, OutputFormat};
use crate::schema::{locations, messages};

/// Write location buckets to `writer` in the given format.
///
/// TXT format: `date, location, report_count` one bucket per line.
pub fn write_buckets<W: Write>(buckets: &[LocationReportBucket], format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Txt => {
            let mut writer = BufWriter::new(writer);
            for bucket in buckets {
                writeln!(writer, "{}, {}, {}", bucket.date, bucket.location, bucket.report_count)?;
            }
            writer.flush()?;
        }
        OutputFormat::Csv => {
            let mut writer = Writer::from_writer(writer);
            writer.write_record(locations::HEADER)?;
            for bucket in buckets {
                writer.write_record([
                    bucket.location.as_str(),
                    bucket.date.as_str(),
                    bucket.report_count.to_string().as_str(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let json_buckets: Vec<serde_json::Value> = buckets
                .iter()
                .map(|b| {
                    serde_json::json!({
                        "location": b.location,
                        "date": b.date,
                        "report_count": b.report_count,
                    })
                })
                .collect();
            serde_json::to_writer_pretty(writer, &json_buckets)?;
        }
    }
    Ok(())
}

/// Write messages to `writer` in the given format.
///
/// TXT format: `author, timestamp, [label @ location] text` with a blank
/// line between messages.
pub fn write_messages<W: Write>(items: &[Message], format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Txt => {
            let mut writer = BufWriter::new(writer);
            for message in items {
                let label = match message.classification.label() {
                    "" => "unclassified",
                    label => label,
                };
                if message.location().is_empty() {
                    writeln!(writer, "{}, {}, [{}] {}", message.author_id, message.posted_at, label, message.text)?;
                } else {
                    writeln!(
                        writer,
                        "{}, {}, [{} @ {}] {}",
                        message.author_id,
                        message.posted_at,
                        label,
                        message.location(),
                        message.text
                    )?;
                }
                writeln!(writer)?; // Add blank line between messages
            }
            writer.flush()?;
        }
        OutputFormat::Csv => {
            let mut writer = Writer::from_writer(writer);
            writer.write_record(messages::HEADER)?;
            for message in items {
                writer.write_record([
                    message.author_id.as_str(),
                    message.text.as_str(),
                    message.posted_at.as_str(),
                    message.classification.label(),
                    message.location(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let json_messages: Vec<serde_json::Value> = items
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "user": m.author_id,
                        "message": m.text,
                        "date": m.posted_at,
                        "classification": m.classification.label(),
                        "location": m.location(),
                    })
                })
                .collect();
            serde_json::to_writer_pretty(writer, &json_messages)?;
        }
    }
    Ok(())
}

/// Create `file_path` (and its parent directory) for a listing.
pub fn create_output_file(file_path: &Path) -> Result<File> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    Ok(File::create(file_path)?)
}
