//! Reading and writing `.spy` files
//!
//! A spy file lists the nonzeros of a sparse matrix together with the
//! processor owning each of them:
//!
//! ```text
//! # comment lines ('#' or '%'), any number
//! Title
//! rows cols nonzeros [procs]
//! row col proc
//! ...
//! ```
//!
//! Rows and columns are 1-indexed, processors 0-indexed.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ParseError, ParseErrorKind, Result, SpyError};
use crate::stats::PartitionStats;

/// Title used when a matrix has none
pub const DEFAULT_TITLE: &str = "anonymous";

/// Header of a spy file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SparseMatrixDescriptor {
    pub title: String,
    pub rows: u32,
    pub cols: u32,
    pub nonzero_count: usize,
    /// Processor count from the optional fourth header field
    pub procs: Option<u32>,
}

impl SparseMatrixDescriptor {
    pub fn new(title: impl Into<String>, rows: u32, cols: u32, nonzero_count: usize) -> Self {
        Self {
            title: title.into(),
            rows,
            cols,
            nonzero_count,
            procs: None,
        }
    }

    /// Whether `entry` lies inside the declared dimensions
    pub fn contains(&self, entry: &NonzeroEntry) -> bool {
        (1..=self.rows).contains(&entry.row) && (1..=self.cols).contains(&entry.col)
    }
}

/// One nonzero of the matrix and its owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NonzeroEntry {
    pub row: u32,
    pub col: u32,
    pub proc: u32,
}

impl NonzeroEntry {
    pub const fn new(row: u32, col: u32, proc: u32) -> Self {
        Self { row, col, proc }
    }
}

/// A fully parsed spy file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpyMatrix {
    pub descriptor: SparseMatrixDescriptor,
    pub entries: Vec<NonzeroEntry>,
}

impl SpyMatrix {
    /// Build a matrix from entries, deriving the nonzero count
    pub fn new(title: impl Into<String>, rows: u32, cols: u32, entries: Vec<NonzeroEntry>) -> Self {
        Self {
            descriptor: SparseMatrixDescriptor::new(title, rows, cols, entries.len()),
            entries,
        }
    }
}

/// Line reader that tracks line numbers and strips line terminators
struct Lines<R> {
    reader: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// Read the next line into `buf`. Returns false at end of stream.
    fn advance(&mut self) -> Result<bool> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        let len = self.buf.trim_end_matches(['\n', '\r']).len();
        self.buf.truncate(len);
        Ok(true)
    }

    fn current(&self) -> &str {
        &self.buf
    }

    /// Error located just past the last line read
    fn eof_error(&self, kind: ParseErrorKind) -> SpyError {
        ParseError::new(self.line_no + 1, kind).into()
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('%')
}

/// Lines skipped before the title. Whitespace-only lines are titles.
fn is_comment_or_empty(line: &str) -> bool {
    line.is_empty() || is_comment(line)
}

fn parse_field<T: FromStr>(token: &str, line: usize) -> std::result::Result<T, ParseError> {
    token.parse().map_err(|_| {
        ParseError::new(
            line,
            ParseErrorKind::InvalidInteger {
                token: token.to_string(),
            },
        )
    })
}

/// Split a line into at least `expected` whitespace separated fields
fn fields(line: &str, expected: usize, line_no: usize) -> std::result::Result<Vec<&str>, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < expected {
        return Err(ParseError::new(
            line_no,
            ParseErrorKind::TooFewFields {
                expected,
                found: tokens.len(),
            },
        ));
    }
    Ok(tokens)
}

/// Streaming spy file reader.
///
/// Construction consumes the comments, title and dimension line; iterating
/// then yields exactly `nonzero_count` entries, or an error.
pub struct SpyReader<R> {
    lines: Lines<R>,
    descriptor: SparseMatrixDescriptor,
    read: usize,
    failed: bool,
}

impl<R: BufRead> SpyReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut lines = Lines::new(reader);

        let title = loop {
            if !lines.advance()? {
                return Err(lines.eof_error(ParseErrorKind::MissingTitle));
            }
            if !is_comment_or_empty(lines.current()) {
                break lines.current().to_string();
            }
        };

        if !lines.advance()? {
            return Err(lines.eof_error(ParseErrorKind::MissingHeader));
        }
        let line_no = lines.line_no;
        let tokens = fields(lines.current(), 3, line_no)?;
        let rows = parse_field(tokens[0], line_no)?;
        let cols = parse_field(tokens[1], line_no)?;
        let nonzero_count = parse_field(tokens[2], line_no)?;
        let procs = match tokens.get(3) {
            Some(token) => Some(parse_field(token, line_no)?),
            None => None,
        };
        if tokens.len() > 4 {
            log::debug!("line {}: ignoring {} extra header fields", line_no, tokens.len() - 4);
        }

        Ok(Self {
            lines,
            descriptor: SparseMatrixDescriptor {
                title,
                rows,
                cols,
                nonzero_count,
                procs,
            },
            read: 0,
            failed: false,
        })
    }

    pub fn descriptor(&self) -> &SparseMatrixDescriptor {
        &self.descriptor
    }

    /// Number of entries still to be read
    pub fn remaining(&self) -> usize {
        self.descriptor.nonzero_count - self.read
    }

    fn read_entry(&mut self) -> Result<NonzeroEntry> {
        if !self.lines.advance()? {
            return Err(self.lines.eof_error(ParseErrorKind::UnexpectedEof {
                expected: self.descriptor.nonzero_count,
                found: self.read,
            }));
        }
        let line_no = self.lines.line_no;
        let tokens = fields(self.lines.current(), 3, line_no)?;
        let entry = NonzeroEntry {
            row: parse_field(tokens[0], line_no)?,
            col: parse_field(tokens[1], line_no)?,
            proc: parse_field(tokens[2], line_no)?,
        };

        if !self.descriptor.contains(&entry) {
            log::warn!(
                "line {}: entry ({}, {}) lies outside the {}x{} matrix",
                line_no,
                entry.row,
                entry.col,
                self.descriptor.rows,
                self.descriptor.cols
            );
        }
        Ok(entry)
    }
}

impl<R: BufRead> Iterator for SpyReader<R> {
    type Item = Result<NonzeroEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.read >= self.descriptor.nonzero_count {
            return None;
        }
        let result = self.read_entry();
        match result {
            Ok(_) => self.read += 1,
            Err(_) => self.failed = true,
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining()))
        }
    }
}

/// Parse a complete spy file from a reader
pub fn parse_spy<R: BufRead>(reader: R) -> Result<SpyMatrix> {
    let mut spy = SpyReader::new(reader)?;
    // the declared count is untrusted, so cap the up-front allocation
    let mut entries = Vec::with_capacity(spy.remaining().min(1 << 16));
    for entry in spy.by_ref() {
        entries.push(entry?);
    }
    Ok(SpyMatrix {
        descriptor: spy.descriptor,
        entries,
    })
}

/// Parse a spy file held in memory
pub fn parse_spy_str(text: &str) -> Result<SpyMatrix> {
    parse_spy(text.as_bytes())
}

/// Open and parse a spy file. The file is closed before returning.
pub fn read_spy_file(path: &Path) -> Result<SpyMatrix> {
    let file = File::open(path).map_err(|source| SpyError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let matrix = parse_spy(BufReader::new(file))?;
    log::info!(
        "Read {}: '{}' {}x{} with {} nonzeros",
        path.display(),
        matrix.descriptor.title,
        matrix.descriptor.rows,
        matrix.descriptor.cols,
        matrix.entries.len()
    );
    Ok(matrix)
}

/// Write a matrix in spy format, with its partition statistics as comments
pub fn write_spy<W: Write>(mut out: W, matrix: &SpyMatrix) -> Result<()> {
    let title = title_line(&matrix.descriptor.title)?;
    let stats = PartitionStats::from_matrix(matrix);
    let d = &matrix.descriptor;

    writeln!(out, "%%MatrixMarket matrix coordinate integer general")?;
    writeln!(out, "% Matrix sparsity:      {:.4}", stats.sparsity)?;
    writeln!(out, "% Load imbalance:       {:.4}", stats.load_imbalance)?;
    writeln!(out, "% Communication Volume: {}", stats.communication_volume)?;
    writeln!(out, "{}", title)?;

    match d.procs {
        Some(procs) => writeln!(out, "{} {} {} {}", d.rows, d.cols, matrix.entries.len(), procs)?,
        None => writeln!(out, "{} {} {}", d.rows, d.cols, matrix.entries.len())?,
    }
    for e in &matrix.entries {
        writeln!(out, "{} {} {}", e.row, e.col, e.proc)?;
    }
    out.flush()?;
    Ok(())
}

/// Title flattened onto one line. An empty title becomes [`DEFAULT_TITLE`];
/// a title the reader would skip as a comment is refused.
fn title_line(title: &str) -> Result<String> {
    let flat = title.replace(['\n', '\r'], " ");
    if flat.is_empty() {
        return Ok(DEFAULT_TITLE.to_string());
    }
    if is_comment(&flat) {
        return Err(SpyError::Config(format!(
            "title '{}' starts with a comment marker and would not read back",
            flat
        )));
    }
    Ok(flat)
}

/// File name stem for a title; path separators cannot leave the target directory
fn file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// First of `dir/title.ext`, `dir/title_1.ext`, `dir/title_2.ext`, ... that
/// does not exist yet
pub fn next_free_path(dir: &Path, title: &str, ext: &str) -> PathBuf {
    let stem = file_stem(title);
    let candidate = dir.join(format!("{}.{}", stem, ext));
    if !candidate.exists() {
        return candidate;
    }
    (1u64..)
        .map(|i| dir.join(format!("{}_{}.{}", stem, i, ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Save a matrix under `dir` without overwriting earlier spy files
pub fn save_spy(dir: &Path, matrix: &SpyMatrix) -> Result<PathBuf> {
    let title = title_line(&matrix.descriptor.title)?;
    std::fs::create_dir_all(dir)?;
    let path = next_free_path(dir, &title, "spy");
    let file = File::create(&path)?;
    write_spy(BufWriter::new(file), matrix)?;
    log::info!("Spy saved to file: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse_err(text: &str) -> ParseError {
        match parse_spy_str(text) {
            Err(SpyError::Parse(e)) => e,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let text = "# test\nTitle\n3 3 2\n1 1 0\n2 2 1\n";
        let m = parse_spy_str(text).unwrap();
        assert_eq!(m.descriptor, SparseMatrixDescriptor::new("Title", 3, 3, 2));
        assert_eq!(
            m.entries,
            vec![NonzeroEntry::new(1, 1, 0), NonzeroEntry::new(2, 2, 1)]
        );
    }

    #[test]
    fn test_skips_many_comments_and_blank_lines() {
        let mut text = String::new();
        for i in 0..25 {
            text.push_str(&format!("# comment {}\n", i));
            text.push('\n');
        }
        text.push_str("% matrix market style\nMy Matrix\n2 2 1\n2 1 3\n");

        let m = parse_spy_str(&text).unwrap();
        assert_eq!(m.descriptor.title, "My Matrix");
        assert_eq!(m.entries, vec![NonzeroEntry::new(2, 1, 3)]);
    }

    #[test]
    fn test_title_keeps_inner_text_and_drops_crlf() {
        let m = parse_spy_str("#\r\n  spaced  title \r\n1 1 0\r\n").unwrap();
        assert_eq!(m.descriptor.title, "  spaced  title ");
        assert!(m.entries.is_empty());
    }

    #[test]
    fn test_fourth_header_field_is_procs() {
        let m = parse_spy_str("T\n4 5 1 8\n1 1 7\n").unwrap();
        assert_eq!(m.descriptor.procs, Some(8));

        // anything past the fourth field is ignored
        let m = parse_spy_str("T\n4 5 1 8 whatever\n1 1 7 extra\n").unwrap();
        assert_eq!(m.descriptor.procs, Some(8));
        assert_eq!(m.entries, vec![NonzeroEntry::new(1, 1, 7)]);
    }

    #[test]
    fn test_premature_eof() {
        let err = parse_err("T\n5 5 5\n1 1 0\n2 2 0\n3 3 0\n");
        assert_eq!(err.line, 6);
        assert_eq!(
            err.kind,
            ParseErrorKind::UnexpectedEof {
                expected: 5,
                found: 3
            }
        );
    }

    #[test]
    fn test_short_data_line() {
        let err = parse_err("T\n2 2 2\n1 1 0\n2 2\n");
        assert_eq!(err.line, 4);
        assert_eq!(err.kind, ParseErrorKind::TooFewFields { expected: 3, found: 2 });
    }

    #[test]
    fn test_non_integer_and_negative_tokens() {
        let err = parse_err("T\n2 2 1\n1 x 0\n");
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ParseErrorKind::InvalidInteger { token: "x".to_string() });

        let err = parse_err("T\n2 2 1\n1 1 -1\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidInteger { token: "-1".to_string() });

        let err = parse_err("T\n2 2.5 1\n");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_missing_title_and_header() {
        assert_eq!(parse_err("").kind, ParseErrorKind::MissingTitle);
        assert_eq!(parse_err("# only\n\n").kind, ParseErrorKind::MissingTitle);

        let err = parse_err("# c\nTitle\n");
        assert_eq!(err.kind, ParseErrorKind::MissingHeader);
        assert_eq!(err.line, 3);

        let err = parse_err("Title\n3 3\n");
        assert_eq!(err.kind, ParseErrorKind::TooFewFields { expected: 3, found: 2 });
    }

    #[test]
    fn test_out_of_bounds_entries_are_kept() {
        let m = parse_spy_str("T\n2 2 2\n3 1 0\n0 9 1\n").unwrap();
        assert_eq!(m.entries.len(), 2);
        assert!(!m.descriptor.contains(&m.entries[0]));
        assert!(!m.descriptor.contains(&m.entries[1]));
    }

    #[test]
    fn test_reader_is_lazy() {
        let text = "T\n3 3 3\n1 1 0\n2 2 1\nbroken\n";
        let mut reader = SpyReader::new(text.as_bytes()).unwrap();
        assert_eq!(reader.descriptor().nonzero_count, 3);
        assert_eq!(reader.remaining(), 3);

        assert_eq!(reader.next().unwrap().unwrap(), NonzeroEntry::new(1, 1, 0));
        assert_eq!(reader.next().unwrap().unwrap(), NonzeroEntry::new(2, 2, 1));
        assert!(reader.next().unwrap().is_err());
        // fused after an error
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_trailing_lines_are_ignored() {
        let m = parse_spy_str("T\n2 2 1\n1 2 0\n2 2 0\nnot part of the matrix\n").unwrap();
        assert_eq!(m.entries, vec![NonzeroEntry::new(1, 2, 0)]);
    }

    #[test]
    fn test_write_spy_has_stats_comments() {
        let m = SpyMatrix::new(
            "diag",
            2,
            2,
            vec![NonzeroEntry::new(1, 1, 0), NonzeroEntry::new(2, 2, 1)],
        );
        let mut out = Vec::new();
        write_spy(&mut out, &m).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("%%MatrixMarket"));
        assert!(text.contains("% Matrix sparsity:      0.5000"));
        assert!(text.contains("% Load imbalance:       1.0000"));
        assert!(text.contains("% Communication Volume: 0"));
        assert!(text.contains("diag\n2 2 2\n1 1 0\n2 2 1\n"));

        assert_eq!(parse_spy_str(&text).unwrap(), m);
    }

    #[test]
    fn test_whitespace_line_is_a_title() {
        let m = parse_spy_str("# c\n\n   \n2 2 0\n").unwrap();
        assert_eq!(m.descriptor.title, "   ");
        assert_eq!((m.descriptor.rows, m.descriptor.cols), (2, 2));
    }

    #[test]
    fn test_write_spy_empty_and_blank_titles() {
        let written = |title: &str| {
            let m = SpyMatrix::new(title, 1, 1, vec![NonzeroEntry::new(1, 1, 0)]);
            let mut out = Vec::new();
            write_spy(&mut out, &m).unwrap();
            parse_spy(out.as_slice()).unwrap()
        };
        assert_eq!(written("").descriptor.title, DEFAULT_TITLE);
        assert_eq!(written("  ").descriptor.title, "  ");
        assert_eq!(written("two\nlines").descriptor.title, "two lines");
        assert_eq!(written("  # indented").descriptor.title, "  # indented");
    }

    #[test]
    fn test_write_spy_refuses_comment_titles() {
        for title in ["# results", "% run 3", "%%MatrixMarket"] {
            let m = SpyMatrix::new(
                title,
                2,
                2,
                vec![NonzeroEntry::new(1, 1, 0), NonzeroEntry::new(2, 2, 1)],
            );
            let mut out = Vec::new();
            let err = write_spy(&mut out, &m).unwrap_err();
            assert!(matches!(err, SpyError::Config(_)), "{:?}", err);
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_save_spy_refuses_comment_title() {
        let dir = tempfile::tempdir().unwrap();
        let m = SpyMatrix::new("# results", 1, 1, vec![NonzeroEntry::new(1, 1, 0)]);
        assert!(matches!(save_spy(dir.path(), &m), Err(SpyError::Config(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_spy_stays_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner");

        for title in ["../escape", "a/b", "back\\slash"] {
            let m = SpyMatrix::new(title, 1, 1, vec![NonzeroEntry::new(1, 1, 0)]);
            let path = save_spy(&inner, &m).unwrap();
            assert_eq!(path.parent().unwrap(), inner.as_path());
            assert_eq!(read_spy_file(&path).unwrap().descriptor.title, title);
        }
        assert_eq!(
            next_free_path(&inner, "../escape", "spy").file_name().unwrap(),
            ".._escape_1.spy"
        );
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_spy_file(&dir.path().join("nope.spy")).unwrap_err();
        assert!(matches!(err, SpyError::FileNotFound { .. }));
    }

    #[test]
    fn test_save_spy_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let m = SpyMatrix::new("A", 1, 1, vec![NonzeroEntry::new(1, 1, 0)]);

        let first = save_spy(dir.path(), &m).unwrap();
        let second = save_spy(dir.path(), &m).unwrap();
        let third = save_spy(dir.path(), &m).unwrap();

        assert_eq!(first.file_name().unwrap(), "A.spy");
        assert_eq!(second.file_name().unwrap(), "A_1.spy");
        assert_eq!(third.file_name().unwrap(), "A_2.spy");
        assert_eq!(read_spy_file(&third).unwrap(), m);
    }

    fn arb_matrix() -> impl Strategy<Value = SpyMatrix> {
        (1u32..200, 1u32..200, "[^\n\r#%][^\n\r]{0,30}").prop_flat_map(|(rows, cols, title)| {
            let entry = (1..=rows, 1..=cols, 0u32..64)
                .prop_map(|(row, col, proc)| NonzeroEntry::new(row, col, proc));
            prop::collection::vec(entry, 0..100)
                .prop_map(move |entries| SpyMatrix::new(title.clone(), rows, cols, entries))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_write_then_parse_preserves_matrix(m in arb_matrix()) {
            let mut out = Vec::new();
            write_spy(&mut out, &m).unwrap();
            let back = parse_spy(out.as_slice()).unwrap();

            prop_assert_eq!(&back.descriptor.title, &m.descriptor.title);
            prop_assert_eq!(back.descriptor.rows, m.descriptor.rows);
            prop_assert_eq!(back.descriptor.cols, m.descriptor.cols);
            prop_assert_eq!(back.descriptor.nonzero_count, m.descriptor.nonzero_count);
            prop_assert_eq!(back.entries, m.entries);
        }
    }
}
