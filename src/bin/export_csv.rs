use clap::Parser;
use commentsift::{export, logging};
use std::{path::PathBuf, process};

/// Dump the `posts` table of a SQLite database to CSV.
#[derive(Debug, Parser)]
#[command(name = "export_csv", version)]
struct Args {
    /// SQLite database holding the posts table
    #[arg(long)]
    db: PathBuf,

    /// CSV file to write
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    logging::init();
    let args = Args::parse();

    match export::export_posts(&args.db, &args.out) {
        Ok(n) => println!("Exported {} rows to {}", n, args.out.display()),
        Err(e) => {
            eprintln!("Export failed: {:#}", e);
            process::exit(1);
        }
    }
}
