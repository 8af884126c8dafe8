use crate::{
    fakejobs::{JobBoard, JobPosting},
    CrawlerError, Extracted,
};
use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Title and application link, tab separated
    #[default]
    Text,
    /// One JSON object per posting
    Json,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    page_url: &'a str,
    #[serde(flatten)]
    posting: &'a JobPosting,
}

pub fn write_board<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    extracted: &Extracted<JobBoard>,
) -> Result<(), CrawlerError> {
    match format {
        OutputFormat::Text => write!(writer, "{}", extracted.document)?,
        OutputFormat::Json => {
            for posting in &extracted.document.postings {
                let row = JsonRow {
                    page_url: &extracted.url,
                    posting,
                };
                serde_json::to_writer(&mut *writer, &row)?;
                writeln!(writer)?;
            }
        }
    }
    Ok(())
}

/// Writes boards as they arrive until every sender is gone. Returns the
/// number of postings written.
pub async fn print_results<W: Write>(
    mut rx: mpsc::Receiver<Extracted<JobBoard>>,
    format: OutputFormat,
    mut writer: W,
) -> Result<u64, CrawlerError> {
    let mut written = 0;
    while let Some(extracted) = rx.recv().await {
        write_board(&mut writer, format, &extracted)?;
        writer.flush()?;
        written += extracted.document.postings.len() as u64;
    }
    Ok(written)
}
