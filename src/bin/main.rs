use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bgpview::consumers::archiver::ArchiveSink;
use bgpview::io::file::read_views_from_path;
use bgpview::models::{AsPathStore, PeerStore};

/// bgpview is a simple cli tool to inspect and re-archive view-exchange snapshot files.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a one-line summary per view found in a snapshot file.
    Dump {
        /// File path to a view snapshot file, local or remote, gz-compressed or not.
        #[clap(name = "FILE")]
        file_path: PathBuf,
    },
    /// Read views from a snapshot file and re-write them through a rotating archive sink.
    Archive {
        /// File path to a view snapshot file to read views from.
        #[clap(name = "FILE")]
        file_path: PathBuf,

        /// Output file name pattern; `%s` expands to the view's unix timestamp and any
        /// other `%` token is resolved with the view's time via strftime-style formatting.
        #[clap(short, long)]
        pattern: String,

        /// Rotation interval in seconds; 0 disables rotation.
        #[clap(short, long, default_value_t = 0)]
        rotate_interval: u32,

        /// Align rotation boundaries to multiples of rotate-interval.
        #[clap(long)]
        rotate_align: bool,

        /// Path to write the name of the most recently completed file to.
        #[clap(long)]
        latest: Option<String>,
    },
}

fn main() {
    env_logger::init();

    let opts = Opts::parse();

    let result = match opts.command {
        Command::Dump { file_path } => dump(&file_path),
        Command::Archive {
            file_path,
            pattern,
            rotate_interval,
            rotate_align,
            latest,
        } => archive(&file_path, &pattern, rotate_interval, rotate_align, latest),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn dump(file_path: &PathBuf) -> Result<(), bgpview::CoreError> {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let views = read_views_from_path(file_path.to_str().unwrap(), &mut peers, &mut paths)?;
    for view in &views {
        println!(
            "time={} peers={} prefixes={}",
            view.time(),
            view.peer_count(),
            view.pfx_count()
        );
    }
    Ok(())
}

fn archive(
    file_path: &PathBuf,
    pattern: &str,
    rotate_interval: u32,
    rotate_align: bool,
    latest: Option<String>,
) -> Result<(), bgpview::CoreError> {
    let mut peers = PeerStore::new();
    let mut paths = AsPathStore::new();
    let views = read_views_from_path(file_path.to_str().unwrap(), &mut peers, &mut paths)?;

    let mut sink = ArchiveSink::new(pattern, rotate_interval, rotate_align, latest);
    for view in &views {
        sink.write(view, &peers, &paths)?;
    }
    sink.close()
}
