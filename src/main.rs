use anyhow::Result;
use clap::builder::TypedValueParser;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::io::{self, Write};
use std::path::PathBuf;

use umi_dedup::config::{Config, DEFAULT_UNIQUE_UMIS_PATH};
use umi_dedup::dedup::{dedup_file, DedupOptions, MalformedPolicy};
use umi_dedup::io::is_broken_pipe;
use umi_dedup::stats::RunStatistics;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Remove PCR duplicates from a coordinate-sorted SAM file using read-name UMIs"
)]
struct Args {
    /// Coordinate-sorted SAM input (`.gz` accepted, `-` for stdin)
    #[arg(short, long)]
    file: PathBuf,

    /// File listing the valid UMIs, one per line
    #[arg(short, long)]
    umi: PathBuf,

    /// Deduplicated SAM output (`.gz` compresses, `-` for stdout)
    #[arg(short, long)]
    out: PathBuf,

    /// Number of trailing read-name characters holding the UMI
    #[arg(short = 'l', long, default_value_t = umi_dedup::DEFAULT_UMI_LENGTH,
          value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    umi_length: usize,

    /// Where to write every distinct UMI seen in the input
    #[arg(long, default_value = DEFAULT_UNIQUE_UMIS_PATH)]
    unique_umis: PathBuf,

    /// Skip unparseable data lines instead of aborting
    #[arg(long, default_value_t = false)]
    skip_malformed: bool,

    /// Do not verify that the input is coordinate-sorted
    #[arg(long, default_value_t = false)]
    no_sort_check: bool,

    /// Show a progress spinner
    #[arg(long, default_value_t = false)]
    progress: bool,

    /// Verbose logging
    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    fn into_config(self) -> Config {
        Config {
            input: self.file,
            umi_list: self.umi,
            output: self.out,
            unique_umis: self.unique_umis,
            options: DedupOptions {
                umi_length: self.umi_length,
                malformed: if self.skip_malformed {
                    MalformedPolicy::Skip
                } else {
                    MalformedPolicy::Abort
                },
                check_sort_order: !self.no_sort_check,
            },
            progress: self.progress,
        }
    }
}

fn report(stats: &RunStatistics, to_stderr: bool) -> io::Result<()> {
    if to_stderr {
        stats.write_summary(io::stderr().lock())
    } else {
        let mut out = io::stdout().lock();
        stats.write_summary(&mut out)?;
        out.flush()
    }
}

fn run(config: Config) -> Result<()> {
    config.validate()?;
    info!(
        "Deduplicating {} with UMIs from {} into {}",
        config.input.display(),
        config.umi_list.display(),
        config.output.display()
    );
    debug!("{:?}", config.options);

    let stats = dedup_file(&config)?;
    report(&stats, config.writes_to_stdout())?;
    Ok(())
}

/// CLI entry point: parse args, set up logging, run the filter and print the
/// run summary.
fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level())).init();

    match run(args.into_config()) {
        Err(e) if is_broken_pipe(&e) => {
            debug!("Output closed early: {e:#}");
            Ok(())
        }
        other => other,
    }
}
