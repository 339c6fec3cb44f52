use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::io::{BufRead, Write};
use std::mem;
use std::time::Instant;

use crate::cigar::five_prime_position;
use crate::config::Config;
use crate::errors::DedupError;
use crate::io::{create_output, open_input};
use crate::record::parse_record;
use crate::sort_check::SortOrderGuard;
use crate::stats::RunStatistics;
use crate::tracker::{Decision, DuplicateTracker};
use crate::umi::UmiAllowList;
use crate::DEFAULT_UMI_LENGTH;

/// Leading byte of SAM header lines.
pub const HEADER_MARKER: u8 = b'@';

/// Lines between progress updates.
const PROGRESS_INTERVAL: u64 = 10_000;

/// What to do with a data line that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Stop the run with `MalformedRecord`.
    #[default]
    Abort,
    /// Drop the line, log a warning and count it.
    Skip,
}

/// Behaviour switches for a [`Deduplicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOptions {
    pub umi_length: usize,
    pub malformed: MalformedPolicy,
    pub check_sort_order: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            umi_length: DEFAULT_UMI_LENGTH,
            malformed: MalformedPolicy::Abort,
            check_sort_order: true,
        }
    }
}

/// Position of the orchestrator in the input.
///
/// There is no terminal variant: end of input is [`Deduplicator::finish`],
/// which consumes the deduplicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// No data line seen yet.
    Idle,
    /// Inside the block of records for `chrom`, having written `emitted` of them.
    InChromosome { chrom: String, emitted: u64 },
}

/// Single-pass PCR duplicate filter over SAM text lines.
///
/// Feed every input line to [`Deduplicator::process_line`] in order, then call
/// [`Deduplicator::finish`] to close the last chromosome block and collect the
/// run statistics. `finish` consumes the deduplicator, so no line can be
/// processed after the end of input.
pub struct Deduplicator<'a> {
    allow_list: &'a UmiAllowList,
    options: DedupOptions,
    state: State,
    tracker: DuplicateTracker,
    sort_guard: Option<SortOrderGuard>,
    stats: RunStatistics,
    line_number: u64,
}

impl<'a> Deduplicator<'a> {
    pub fn new(allow_list: &'a UmiAllowList, options: DedupOptions) -> Self {
        Self {
            allow_list,
            options,
            state: State::Idle,
            tracker: DuplicateTracker::new(),
            sort_guard: options.check_sort_order.then(SortOrderGuard::new),
            stats: RunStatistics::default(),
            line_number: 0,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Handle one input line, including its line terminator. Headers and kept
    /// records are written to `out` byte for byte; only data lines have to be
    /// valid UTF-8.
    pub fn process_line<W: Write>(&mut self, line: &[u8], out: &mut W) -> crate::errors::Result<()> {
        self.line_number += 1;

        if line.first() == Some(&HEADER_MARKER) {
            out.write_all(line)?;
            self.stats.header_lines += 1;
            return Ok(());
        }

        let text = match std::str::from_utf8(line) {
            Ok(text) => text,
            Err(e) => {
                return self.on_malformed(DedupError::malformed(format!("line is not valid UTF-8 ({e})")))
            }
        };
        let rec = match parse_record(text, self.options.umi_length) {
            Ok(rec) => rec,
            Err(e) => return self.on_malformed(e),
        };
        let allowed = self.allow_list.contains(rec.umi);

        // The 5' position is computed before any state changes so that a
        // skipped line leaves the chromosome scope untouched.
        let five_prime = if allowed {
            match five_prime_position(rec.position, rec.cigar, rec.reverse) {
                Ok(pos) => Some(pos),
                Err(e) => return self.on_malformed(e),
            }
        } else {
            None
        };

        if let Some(guard) = self.sort_guard.as_mut() {
            guard
                .check(rec.chrom, rec.position)
                .map_err(|e| e.at_line(self.line_number))?;
        }

        self.enter_chromosome(rec.chrom);
        self.stats.observe_umi(rec.umi);

        let Some(five_prime) = five_prime else {
            debug!("UMI not found: {} (line {})", rec.umi, self.line_number);
            self.stats.wrong_umis += 1;
            return Ok(());
        };

        match self.tracker.consider(five_prime, rec.umi, rec.reverse) {
            Decision::Keep => {
                out.write_all(line)?;
                self.stats.unique_records += 1;
                if let State::InChromosome { emitted, .. } = &mut self.state {
                    *emitted += 1;
                }
            }
            Decision::Drop => self.stats.duplicates_removed += 1,
        }
        Ok(())
    }

    /// Close the final chromosome block and return the run statistics.
    pub fn finish(mut self) -> RunStatistics {
        self.close_block();
        self.stats
    }

    fn enter_chromosome(&mut self, chrom: &str) {
        if matches!(&self.state, State::InChromosome { chrom: current, .. } if current == chrom) {
            return;
        }
        self.close_block();
        self.tracker.reset(chrom);
        self.state = State::InChromosome { chrom: chrom.to_string(), emitted: 0 };
    }

    fn close_block(&mut self) {
        if let State::InChromosome { chrom, emitted } = mem::replace(&mut self.state, State::Idle) {
            debug!("Finished chromosome {chrom}: {emitted} records written");
            self.stats.finalize_chromosome(&chrom, emitted);
        }
    }

    fn on_malformed(&mut self, err: DedupError) -> crate::errors::Result<()> {
        let err = err.at_line(self.line_number);
        match self.options.malformed {
            MalformedPolicy::Abort => Err(err),
            MalformedPolicy::Skip => {
                warn!("Skipping {err}");
                self.stats.malformed_skipped += 1;
                Ok(())
            }
        }
    }
}

/// Deduplicate every line of `reader` into `out`.
///
/// `progress` is advanced every few thousand lines; pass
/// `ProgressBar::hidden()` for silent runs.
pub fn dedup_stream<R: BufRead, W: Write>(
    mut reader: R,
    out: &mut W,
    allow_list: &UmiAllowList,
    options: DedupOptions,
    progress: &ProgressBar,
) -> crate::errors::Result<RunStatistics> {
    let mut dedup = Deduplicator::new(allow_list, options);
    let mut line = Vec::new();
    let mut lines = 0u64;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        dedup.process_line(&line, out)?;
        lines += 1;
        if lines % PROGRESS_INTERVAL == 0 {
            progress.set_position(lines);
        }
    }
    progress.set_position(lines);

    Ok(dedup.finish())
}

fn progress_bar(enabled: bool) -> Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner} {human_pos} lines [{elapsed_precise}] {per_sec}",
    )?);
    Ok(pb)
}

/// Run a full deduplication described by `config`: load the UMI list, filter
/// the input into the output file and write the observed-UMI side file.
pub fn dedup_file(config: &Config) -> Result<RunStatistics> {
    let start = Instant::now();
    let allow_list = UmiAllowList::from_path(&config.umi_list)?;

    let reader = open_input(&config.input)?;
    let mut out = create_output(&config.output)?;
    let progress = progress_bar(config.progress)?;

    let stats = dedup_stream(reader, &mut out, &allow_list, config.options, &progress)
        .with_context(|| format!("Failed to deduplicate {}", config.input.display()))?;
    progress.finish_and_clear();
    out.finish()
        .with_context(|| format!("Failed to write {}", config.output.display()))?;

    let mut umi_out = create_output(&config.unique_umis)?;
    stats
        .write_observed_umis(&mut umi_out)
        .and_then(|()| umi_out.finish())
        .with_context(|| format!("Failed to write {}", config.unique_umis.display()))?;

    info!(
        "Wrote {} records ({} duplicates removed) in {:.3}s",
        stats.unique_records,
        stats.duplicates_removed,
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str, umis: &[&str], options: DedupOptions) -> (String, RunStatistics) {
        let allow: UmiAllowList = umis.iter().copied().collect();
        let mut out = Vec::new();
        let stats = dedup_stream(input.as_bytes(), &mut out, &allow, options, &ProgressBar::hidden())
            .unwrap();
        (String::from_utf8(out).unwrap(), stats)
    }

    #[test]
    fn test_state_follows_chromosome_blocks() {
        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let mut d = Deduplicator::new(&allow, DedupOptions::default());
        let mut out = Vec::new();
        assert_eq!(d.state(), &State::Idle);

        d.process_line(b"@HD\tVN:1.6\n", &mut out).unwrap();
        assert_eq!(d.state(), &State::Idle);

        d.process_line(b"r1:AACCGGTT\t0\t1\t100\t60\t10M\n", &mut out).unwrap();
        assert_eq!(d.state(), &State::InChromosome { chrom: "1".to_string(), emitted: 1 });

        d.process_line(b"r2:GGGGGGGG\t0\t2\t5\t60\t10M\n", &mut out).unwrap();
        assert_eq!(d.state(), &State::InChromosome { chrom: "2".to_string(), emitted: 0 });
        assert_eq!(d.stats().chrom_counts["1"], 1);

        let stats = d.finish();
        assert_eq!(stats.chrom_counts["2"], 0);
        assert_eq!(stats.wrong_umis, 1);
    }

    #[test]
    fn test_kept_lines_are_written_verbatim() {
        let input = "@HD\tVN:1.6\r\nr1:AACCGGTT\t0\t1\t100\t60\t10M\tXX\r\nr2:AACCGGTT\t0\t1\t101\t60\t10M";
        let (out, stats) = run(input, &["AACCGGTT"], DedupOptions::default());
        assert_eq!(out, input);
        assert_eq!(stats.unique_records, 2);
    }

    #[test]
    fn test_non_utf8_header_passes_through_unchanged() {
        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let input: &[u8] = b"@HD\tVN:1.6\n@CO\tsample caf\xE9\nr1:AACCGGTT\t0\t1\t100\t60\t10M\n";
        let mut out = Vec::new();
        let stats =
            dedup_stream(input, &mut out, &allow, DedupOptions::default(), &ProgressBar::hidden())
                .unwrap();
        assert_eq!(out, input);
        assert_eq!(stats.header_lines, 2);
        assert_eq!(stats.unique_records, 1);
    }

    #[test]
    fn test_non_utf8_data_line_is_malformed_at_its_line() {
        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let input: &[u8] = b"@HD\tVN:1.6\nr1:AACCGGTT\t0\t1\t100\t60\t10M\tXX:Z:\xFF\n";
        let err = dedup_stream(
            input,
            &mut Vec::<u8>::new(),
            &allow,
            DedupOptions::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DedupError::MalformedRecord { line: 2, .. }));

        let options = DedupOptions { malformed: MalformedPolicy::Skip, ..Default::default() };
        let mut out = Vec::new();
        let stats = dedup_stream(input, &mut out, &allow, options, &ProgressBar::hidden()).unwrap();
        assert_eq!(out, b"@HD\tVN:1.6\n");
        assert_eq!(stats.malformed_skipped, 1);
    }

    #[test]
    fn test_malformed_line_aborts_by_default() {
        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let input = "@HD\n r1:AACCGGTT\t0\t1\t100\n";
        let err = dedup_stream(
            input.as_bytes(),
            &mut Vec::<u8>::new(),
            &allow,
            DedupOptions::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DedupError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_unmappable_cigar_aborts_only_for_allowed_umis() {
        let options = DedupOptions::default();
        // Invalid UMI: the CIGAR is never looked at
        let (_, stats) = run("r1:TTTTTTTT\t4\t*\t0\t0\t*\n", &["AACCGGTT"], options);
        assert_eq!(stats.wrong_umis, 1);

        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let err = dedup_stream(
            "r1:AACCGGTT\t4\t*\t0\t0\t*\n".as_bytes(),
            &mut Vec::<u8>::new(),
            &allow,
            options,
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DedupError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_skip_policy_drops_malformed_lines_without_scope_change() {
        let options = DedupOptions { malformed: MalformedPolicy::Skip, ..Default::default() };
        let input = "r1:AACCGGTT\t0\t1\t100\t60\t10M\n\
                     r2:AACCGGTT\t0\t2\t100\t60\t*\n\
                     r3:AACCGGTT\t0\t1\t100\t60\t10M\n\
                     garbage\n";
        let (out, stats) = run(input, &["AACCGGTT"], options);
        assert_eq!(out, "r1:AACCGGTT\t0\t1\t100\t60\t10M\n");
        assert_eq!(stats.malformed_skipped, 2);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.chrom_counts.len(), 1);
        assert!(!stats.observed_umis.is_empty());
    }

    #[test]
    fn test_unsorted_input_fails_unless_check_disabled() {
        let input = "r1:AACCGGTT\t0\t1\t100\t60\t10M\n\
                     r2:AACCGGTT\t0\t2\t100\t60\t10M\n\
                     r3:AACCGGTT\t0\t1\t100\t60\t10M\n";
        let allow: UmiAllowList = ["AACCGGTT"].into_iter().collect();
        let err = dedup_stream(
            input.as_bytes(),
            &mut Vec::<u8>::new(),
            &allow,
            DedupOptions::default(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DedupError::UnsortedInput { line: 3, .. }));

        let options = DedupOptions { check_sort_order: false, ..Default::default() };
        let (_, stats) = run(input, &["AACCGGTT"], options);
        // The scope was reset in between, so the third read is not recognised
        assert_eq!(stats.unique_records, 3);
        assert_eq!(stats.chrom_counts["1"], 2);
        assert_eq!(stats.chrom_counts["2"], 1);
    }

    #[test]
    fn test_custom_umi_length() {
        let options = DedupOptions { umi_length: 4, ..Default::default() };
        let input = "r1_ACGT\t0\t1\t100\t60\t10M\nr2_ACGT\t0\t1\t100\t60\t10M\n";
        let (_, stats) = run(input, &["ACGT"], options);
        assert_eq!(stats.unique_records, 1);
        assert_eq!(stats.duplicates_removed, 1);
    }
}
