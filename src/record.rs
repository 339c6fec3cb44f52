use crate::errors::{DedupError, Result};
use crate::extract_umi_from_read_name;

/// SAM flag bit marking a read aligned to the reverse strand.
pub const FLAG_REVERSE: u16 = 16;

/// Largest leftmost position allowed by the SAM format (2^31 - 1).
pub const MAX_POSITION: i64 = i32::MAX as i64;

/// Number of tab-delimited fields a data line must have for parsing.
const MIN_FIELDS: usize = 6;

/// The fields of one SAM data line that duplicate detection looks at.
///
/// Fields borrow from the line, so a record lives only as long as the line
/// it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord<'a> {
    /// Trailing characters of the read name.
    pub umi: &'a str,
    /// True when the read maps to the reverse strand.
    pub reverse: bool,
    /// Reference sequence name, verbatim.
    pub chrom: &'a str,
    /// 1-based leftmost mapped position as reported by the aligner.
    pub position: i64,
    /// Unparsed CIGAR string.
    pub cigar: &'a str,
}

/// Parse a SAM data line into an [`AlignmentRecord`].
///
/// Trailing `\n` / `\r\n` are ignored. Fails with `MalformedRecord` when the
/// line has fewer than six fields, when the flag or position fields are not
/// integers, or when the position lies outside `0..=2^31-1`.
pub fn parse_record(line: &str, umi_length: usize) -> Result<AlignmentRecord<'_>> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut fields = [""; MIN_FIELDS];
    let mut found = 0;
    for (slot, field) in fields.iter_mut().zip(line.split('\t')) {
        *slot = field;
        found += 1;
    }
    if found < MIN_FIELDS {
        return Err(DedupError::malformed(format!(
            "expected at least {MIN_FIELDS} tab-delimited fields, found {found}"
        )));
    }

    let flag: u16 = fields[1]
        .parse()
        .map_err(|_| DedupError::malformed(format!("flag '{}' is not an integer", fields[1])))?;
    let position: i64 = fields[3].parse().map_err(|_| {
        DedupError::malformed(format!("position '{}' is not an integer", fields[3]))
    })?;
    if !(0..=MAX_POSITION).contains(&position) {
        return Err(DedupError::malformed(format!(
            "position {position} is outside 0..={MAX_POSITION}"
        )));
    }

    Ok(AlignmentRecord {
        umi: extract_umi_from_read_name(fields[0], umi_length),
        reverse: flag & FLAG_REVERSE != 0,
        chrom: fields[2],
        position,
        cigar: fields[5],
    })
}
