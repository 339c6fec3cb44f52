use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

/// Counters accumulated over one deduplication run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStatistics {
    pub header_lines: u64,
    pub unique_records: u64,
    pub wrong_umis: u64,
    pub duplicates_removed: u64,
    pub malformed_skipped: u64,
    /// Records written per chromosome, filled in as each block ends.
    pub chrom_counts: BTreeMap<String, u64>,
    /// Every distinct UMI seen in a data line, allowed or not.
    pub observed_umis: BTreeSet<String>,
}

impl RunStatistics {
    /// Close a chromosome block that emitted `emitted` records.
    pub fn finalize_chromosome(&mut self, chrom: &str, emitted: u64) {
        *self.chrom_counts.entry(chrom.to_string()).or_insert(0) += emitted;
    }

    pub fn observe_umi(&mut self, umi: &str) {
        if !self.observed_umis.contains(umi) {
            self.observed_umis.insert(umi.to_string());
        }
    }

    /// Write the run summary: totals followed by `chrom\tcount` lines in
    /// ascending chromosome order.
    pub fn write_summary<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "Header lines: {}", self.header_lines)?;
        writeln!(out, "Unique records: {}", self.unique_records)?;
        writeln!(out, "Wrong UMIs: {}", self.wrong_umis)?;
        writeln!(out, "Duplicates removed: {}", self.duplicates_removed)?;
        if self.malformed_skipped > 0 {
            writeln!(out, "Malformed records skipped: {}", self.malformed_skipped)?;
        }
        for (chrom, count) in &self.chrom_counts {
            writeln!(out, "{chrom}\t{count}")?;
        }
        Ok(())
    }

    /// Write the sorted distinct UMIs, one per line.
    pub fn write_observed_umis<W: Write>(&self, mut out: W) -> io::Result<()> {
        for umi in &self.observed_umis {
            writeln!(out, "{umi}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_chromosomes_sorted() {
        let mut stats = RunStatistics {
            header_lines: 3,
            unique_records: 5,
            wrong_umis: 1,
            duplicates_removed: 2,
            ..Default::default()
        };
        stats.finalize_chromosome("2", 1);
        stats.finalize_chromosome("10", 4);
        stats.finalize_chromosome("1", 0);

        let mut buf = Vec::new();
        stats.write_summary(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Header lines: 3\nUnique records: 5\nWrong UMIs: 1\nDuplicates removed: 2\n1\t0\n10\t4\n2\t1\n"
        );
    }

    #[test]
    fn test_summary_reports_skipped_malformed_lines() {
        let stats = RunStatistics { malformed_skipped: 2, ..Default::default() };
        let mut buf = Vec::new();
        stats.write_summary(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().ends_with("Malformed records skipped: 2\n"));
    }

    #[test]
    fn test_finalize_same_chromosome_accumulates() {
        let mut stats = RunStatistics::default();
        stats.finalize_chromosome("1", 2);
        stats.finalize_chromosome("1", 3);
        assert_eq!(stats.chrom_counts["1"], 5);
    }

    #[test]
    fn test_observed_umis_sorted_and_distinct() {
        let mut stats = RunStatistics::default();
        for umi in ["TTTTTTTT", "AACCGGTT", "TTTTTTTT", "CCCCCCCC"] {
            stats.observe_umi(umi);
        }
        let mut buf = Vec::new();
        stats.write_observed_umis(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "AACCGGTT\nCCCCCCCC\nTTTTTTTT\n");
    }
}
