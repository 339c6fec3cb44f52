pub mod cigar;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod io;
pub mod record;
pub mod sort_check;
pub mod stats;
pub mod tracker;
pub mod umi;

/// Default number of trailing read-name characters that make up the UMI.
pub const DEFAULT_UMI_LENGTH: usize = 8;

/// Extract the UMI from a read name.
///
/// The UMI is the last `umi_length` characters of the name, e.g.
/// `NS500451:154:HWKTMBGXX:1:11101:24260:1121:CTGTTCAC` yields `CTGTTCAC`.
/// Names shorter than `umi_length` are returned whole. The characters are not
/// validated; membership in the allow-list decides whether the UMI is usable.
pub fn extract_umi_from_read_name(read_name: &str, umi_length: usize) -> &str {
    if umi_length == 0 {
        return "";
    }
    let start = read_name
        .char_indices()
        .rev()
        .nth(umi_length - 1)
        .map_or(0, |(i, _)| i);
    &read_name[start..]
}
