use clap::Parser;
use fake_jobs_crawler::fakejobs::JobData;
use std::path::PathBuf;

/// Remove queued urls that a previous crawl already visited.
#[derive(Debug, Parser)]
struct Args {
    /// SQLite file written by `fake-jobs-crawler --db`
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let p = JobData::new(&args.db).await?;
    let pruned = p.prune_queued().await?;
    println!("Deleted {} queued urls", pruned);
    Ok(())
}
