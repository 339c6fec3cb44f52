use crate::errors::{DedupError, Result};

/// One `(length, operation)` element of a CIGAR string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    pub len: u32,
    pub kind: CigarKind,
}

/// CIGAR operation codes from the SAM specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    RefSkip,
    SoftClip,
    HardClip,
    Padding,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarKind {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'M' => Self::Match,
            b'I' => Self::Insertion,
            b'D' => Self::Deletion,
            b'N' => Self::RefSkip,
            b'S' => Self::SoftClip,
            b'H' => Self::HardClip,
            b'P' => Self::Padding,
            b'=' => Self::SequenceMatch,
            b'X' => Self::SequenceMismatch,
            _ => return None,
        })
    }

    /// True for operations that advance along the reference.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::RefSkip | Self::SequenceMatch | Self::SequenceMismatch
        )
    }
}

/// Split a CIGAR string into its operations.
///
/// Each operation is a run of digits followed by one operation code. Fails with
/// `MalformedRecord` for an empty string (including the SAM placeholder `*`),
/// a missing length, a trailing length without a code, or an unknown code.
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>> {
    let mut ops = Vec::new();
    let mut len: Option<u32> = None;

    for b in cigar.bytes() {
        if b.is_ascii_digit() {
            let digit = u32::from(b - b'0');
            let next = len
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| DedupError::malformed(format!("CIGAR length overflow in '{cigar}'")))?;
            len = Some(next);
            continue;
        }
        let kind = CigarKind::from_byte(b).ok_or_else(|| {
            DedupError::malformed(format!("unknown CIGAR operation '{}' in '{cigar}'", b as char))
        })?;
        let len = len
            .take()
            .ok_or_else(|| DedupError::malformed(format!("CIGAR operation without length in '{cigar}'")))?;
        ops.push(CigarOp { len, kind });
    }

    if len.is_some() {
        return Err(DedupError::malformed(format!("CIGAR '{cigar}' ends with a bare length")));
    }
    if ops.is_empty() {
        return Err(DedupError::malformed(format!("CIGAR '{cigar}' has no operations")));
    }
    Ok(ops)
}

/// Compute the 5' genomic coordinate of a read.
///
/// Forward reads start at `leftmost`, moved left by a leading soft clip.
/// Reverse reads start at `leftmost` plus every reference-consuming length and
/// any soft clip that is not the first operation. A leading soft clip on a
/// reverse read sits at its 3' end and is ignored.
pub fn five_prime_position(leftmost: i64, cigar: &str, reverse: bool) -> Result<i64> {
    let ops = parse_cigar(cigar)?;
    five_prime_from_ops(leftmost, &ops, reverse)
}

/// [`five_prime_position`] over an already tokenized CIGAR. Fails with
/// `MalformedRecord` if the result does not fit in an `i64`.
pub fn five_prime_from_ops(leftmost: i64, ops: &[CigarOp], reverse: bool) -> Result<i64> {
    let overflow = || DedupError::malformed(format!("5' position of read at {leftmost} overflows"));

    if !reverse {
        return match ops.first() {
            Some(CigarOp { len, kind: CigarKind::SoftClip }) => {
                leftmost.checked_sub(i64::from(*len)).ok_or_else(overflow)
            }
            _ => Ok(leftmost),
        };
    }

    ops.iter()
        .enumerate()
        .filter(|(i, op)| op.kind.consumes_reference() || (op.kind == CigarKind::SoftClip && *i != 0))
        .try_fold(leftmost, |pos, (_, op)| pos.checked_add(i64::from(op.len)))
        .ok_or_else(overflow)
}
