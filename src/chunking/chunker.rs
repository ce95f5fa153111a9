//! Sliding-window chunker with overlap-aware line accounting.
//!
//! Splits file content into character windows of at most `max_chunk_size`
//! with stride `max_chunk_size - overlap_size`. A trailing window smaller
//! than `min_chunk_size` is merged into the previous chunk. Line ranges are
//! derived by counting newlines; when stepping to the next window the line
//! count of the overlap region is subtracted so ranges reflect the
//! overlapping source.

use regex::Regex;

use crate::chunking::language::{detect_language, is_jvm_family};
use crate::config::ChunkingConfig;
use crate::core::{Chunk, ChunkKind, LogStatement};
use crate::error::{ChunkingError, Result};

/// Pattern for log statements in JVM-family sources.
const LOG_PATTERN: &str = r"\b(log|logger)\.(trace|debug|info|warn|error)\s*\(([^;]+)\);";

/// Deterministic character-window chunker.
///
/// # Examples
///
/// ```
/// use repolens::chunking::Chunker;
/// use repolens::config::Config;
///
/// let config = Config::builder().build().unwrap();
/// let chunker = Chunker::new(&config.chunking).unwrap();
/// let chunks = chunker.chunk("notes.txt", "hello world", None).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].start_line, 1);
/// ```
#[derive(Debug)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap_size: usize,
    min_chunk_size: usize,
    context_overlap_percentage: usize,
    log_pattern: Regex,
}

impl Chunker {
    /// Creates a chunker from chunking configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured overlap is not smaller than the
    /// chunk size, or the log pattern fails to compile.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.max_chunk_size == 0 {
            return Err(ChunkingError::InvalidConfig {
                reason: "max_chunk_size must be > 0".to_string(),
            }
            .into());
        }
        if config.overlap_size >= config.max_chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: config.overlap_size,
                size: config.max_chunk_size,
            }
            .into());
        }

        let log_pattern = Regex::new(LOG_PATTERN).map_err(ChunkingError::from)?;

        Ok(Self {
            max_chunk_size: config.max_chunk_size,
            overlap_size: config.overlap_size,
            min_chunk_size: config.min_chunk_size,
            context_overlap_percentage: usize::from(config.context_overlap_percentage),
            log_pattern,
        })
    }

    /// Partitions file content into ordered chunks.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Relative path, used for chunk identity and language detection.
    /// * `content` - The file text.
    /// * `overlap` - Optional override for the configured overlap size.
    ///
    /// # Errors
    ///
    /// Returns an error if the overlap override is not smaller than the
    /// maximum chunk size.
    pub fn chunk(
        &self,
        file_path: &str,
        content: &str,
        overlap: Option<usize>,
    ) -> Result<Vec<Chunk>> {
        let overlap = overlap.unwrap_or(self.overlap_size);
        if overlap >= self.max_chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap,
                size: self.max_chunk_size,
            }
            .into());
        }

        let language = detect_language(file_path);

        // Byte offsets of every char boundary, with the end sentinel.
        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(content.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut chunks = if char_count <= self.max_chunk_size {
            vec![Chunk::new(
                file_path,
                0,
                ChunkKind::File,
                content.to_string(),
                1,
                lines_spanned(content).max(1),
                language,
            )]
        } else {
            self.windowed_chunks(file_path, content, &boundaries, char_count, overlap, language)
        };

        self.attach_context(&mut chunks);

        if is_jvm_family(language) {
            self.attach_logs(content, &mut chunks);
        }

        Ok(chunks)
    }

    /// Builds the window list and the chunks with line accounting.
    fn windowed_chunks(
        &self,
        file_path: &str,
        content: &str,
        boundaries: &[usize],
        char_count: usize,
        overlap: usize,
        language: &str,
    ) -> Vec<Chunk> {
        let stride = self.max_chunk_size - overlap;

        // Window positions in char indices.
        let mut windows: Vec<(usize, usize)> = Vec::new();
        let mut pos = 0usize;
        loop {
            let end = (pos + self.max_chunk_size).min(char_count);
            windows.push((pos, end));
            if end == char_count {
                break;
            }
            pos += stride;
        }

        // Merge a too-small tail into the previous window.
        if windows.len() > 1 {
            let (last_start, last_end) = windows[windows.len() - 1];
            if last_end - last_start < self.min_chunk_size {
                windows.pop();
                if let Some(prev) = windows.last_mut() {
                    prev.1 = char_count;
                }
            }
        }

        let mut chunks = Vec::with_capacity(windows.len());
        let mut start_line = 1usize;
        for (index, &(a, b)) in windows.iter().enumerate() {
            let slice = &content[boundaries[a]..boundaries[b]];
            let end_line = start_line + lines_spanned(slice).max(1) - 1;

            chunks.push(Chunk::new(
                file_path,
                index,
                ChunkKind::Chunk,
                slice.to_string(),
                start_line,
                end_line,
                language,
            ));

            // The next window shares the last `overlap` chars of this one;
            // its first line is this chunk's end line minus the newlines in
            // the shared region.
            if index + 1 < windows.len() {
                let overlap_start = b.saturating_sub(overlap).max(a);
                let overlap_slice = &content[boundaries[overlap_start]..boundaries[b]];
                start_line = end_line + 1 - lines_spanned(overlap_slice).max(1);
            }
        }

        chunks
    }

    /// Populates `context_before` / `context_after` from neighbour chunks.
    fn attach_context(&self, chunks: &mut [Chunk]) {
        if self.context_overlap_percentage == 0 || chunks.len() < 2 {
            return;
        }

        let tails: Vec<String> = chunks
            .iter()
            .map(|c| tail_fraction(&c.content, self.context_overlap_percentage))
            .collect();
        let heads: Vec<String> = chunks
            .iter()
            .map(|c| head_fraction(&c.content, self.context_overlap_percentage))
            .collect();

        for i in 0..chunks.len() {
            if i > 0 {
                chunks[i].context_before = tails[i - 1].clone();
            }
            if i + 1 < chunks.len() {
                chunks[i].context_after = heads[i + 1].clone();
            }
        }
    }

    /// Scans content for log statements and attaches each to the chunks
    /// whose line range contains it. A non-matching file yields no logs.
    fn attach_logs(&self, content: &str, chunks: &mut [Chunk]) {
        for caps in self.log_pattern.captures_iter(content) {
            let (Some(whole), Some(level), Some(message)) = (caps.get(0), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let line = content[..whole.start()].matches('\n').count() + 1;
            let statement = LogStatement {
                line,
                level: level.as_str().to_string(),
                message: message.as_str().trim().to_string(),
            };
            for chunk in chunks.iter_mut() {
                if chunk.contains_line(line) {
                    chunk.logs.push(statement.clone());
                }
            }
        }
    }
}

/// Extracts log statements from source text with the standard pattern.
///
/// Standalone form of the chunker's log scan, for callers that only hold
/// stored chunk content. A non-matching input yields an empty list.
#[must_use]
pub fn extract_log_statements(content: &str) -> Vec<LogStatement> {
    let Ok(pattern) = Regex::new(LOG_PATTERN) else {
        return Vec::new();
    };
    pattern
        .captures_iter(content)
        .filter_map(|caps| {
            let (whole, level, message) = (caps.get(0)?, caps.get(2)?, caps.get(3)?);
            Some(LogStatement {
                line: content[..whole.start()].matches('\n').count() + 1,
                level: level.as_str().to_string(),
                message: message.as_str().trim().to_string(),
            })
        })
        .collect()
}

/// Number of lines a slice touches: newlines plus one, minus the trailing
/// newline that only terminates the final touched line.
fn lines_spanned(slice: &str) -> usize {
    if slice.is_empty() {
        return 0;
    }
    let newlines = slice.matches('\n').count();
    if slice.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Last `percentage`% of a string's characters.
fn tail_fraction(text: &str, percentage: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let take = chars.len() * percentage / 100;
    chars[chars.len() - take..].iter().collect()
}

/// First `percentage`% of a string's characters.
fn head_fraction(text: &str, percentage: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let take = chars.len() * percentage / 100;
    chars[..take].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn chunker_with(max: usize, overlap: usize, min: usize) -> Chunker {
        let config = Config::builder()
            .max_chunk_size(max)
            .overlap_size(overlap)
            .min_chunk_size(min)
            .build()
            .unwrap();
        Chunker::new(&config.chunking).unwrap()
    }

    #[test]
    fn test_small_file_single_chunk() {
        let chunker = chunker_with(100, 10, 5);
        let chunks = chunker.chunk("a.txt", "one\ntwo\nthree", None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::File);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[0].id(), "a.txt#0");
    }

    #[test]
    fn test_exact_max_size_single_chunk() {
        let chunker = chunker_with(10, 2, 2);
        let content = "x".repeat(10);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::File);
    }

    #[test]
    fn test_max_plus_one_two_chunks() {
        let chunker = chunker_with(10, 2, 2);
        let content = "x".repeat(11);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.len(), 10);
        // Second window starts at stride 8, covers chars 8..11.
        assert_eq!(chunks[1].content.len(), 3);
        assert_eq!(chunks[1].kind, ChunkKind::Chunk);
    }

    #[test]
    fn test_adjacent_windows_share_overlap() {
        let chunker = chunker_with(10, 3, 2);
        let content: String = ('a'..='z').collect();
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        for pair in chunks.windows(2) {
            let prev = &pair[0].content;
            let next = &pair[1].content;
            // The last 3 chars of each chunk reappear at the head of the next.
            assert_eq!(&prev[prev.len() - 3..], &next[..3]);
        }
    }

    #[test]
    fn test_coverage_reconstructs_content() {
        let chunker = chunker_with(10, 3, 2);
        let content = "abcdefghijklmnopqrstuvwxyz0123456789";
        let chunks = chunker.chunk("a.txt", content, None).unwrap();

        let mut rebuilt = chunks[0].content.clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk.content[3..]);
        }
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_small_tail_merges_into_previous() {
        let chunker = chunker_with(10, 2, 5);
        // 19 chars: windows [0,10), [8,18), tail [16,19) of len 3 < 5 merges,
        // extending the second window to [8,19).
        let content = "x".repeat(19);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content.len(), 11);

        // A tail at exactly min_chunk_size stays separate: 21 chars gives
        // tail [16,21) of len 5.
        let content = "x".repeat(21);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].content.len(), 5);
    }

    #[test]
    fn test_line_accounting_across_overlap() {
        let chunker = chunker_with(12, 4, 2);
        // Six lines of "aaa\n".."fff\n" = 24 chars; windows [0,12), [8,20), [16,24).
        let content = "aaa\nbbb\nccc\nddd\neee\nfff\n";
        let chunks = chunker.chunk("a.txt", content, None).unwrap();
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        // Overlap "ccc\n" spans one line, so the next chunk starts on line 3.
        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[1].end_line, 5);
        assert_eq!(chunks[2].start_line, 5);
        assert_eq!(chunks[2].end_line, 6);

        // Every line from 1 to 6 is covered by some chunk.
        for line in 1..=6 {
            assert!(
                chunks.iter().any(|c| c.contains_line(line)),
                "line {line} not covered"
            );
        }
    }

    #[test]
    fn test_twenty_thousand_chars_three_chunks() {
        let chunker = chunker_with(8000, 200, 500);
        let line = format!("{}\n", "y".repeat(99));
        let content = line.repeat(200); // 20_000 chars, 200 lines
        let chunks = chunker.chunk("src/A.java", &content, None).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, 200);

        // Each line is covered; overlap duplicates a bounded set.
        for line_no in 1..=200 {
            assert!(chunks.iter().any(|c| c.contains_line(line_no)));
        }
    }

    #[test]
    fn test_context_attachment() {
        let chunker = chunker_with(10, 2, 2);
        let content = "x".repeat(30);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks[0].context_before.is_empty());
        assert!(!chunks[0].context_after.is_empty());
        assert!(!chunks[1].context_before.is_empty());
        assert!(chunks.last().unwrap().context_after.is_empty());
    }

    #[test]
    fn test_log_extraction_java() {
        let chunker = chunker_with(1000, 10, 5);
        let content = "class A {\n  void f() {\n    log.info(\"started {}\", id);\n  }\n}\n";
        let chunks = chunker.chunk("A.java", content, None).unwrap();
        assert_eq!(chunks[0].logs.len(), 1);
        assert_eq!(chunks[0].logs[0].level, "info");
        assert_eq!(chunks[0].logs[0].line, 3);
        assert!(chunks[0].logs[0].message.contains("started"));
    }

    #[test]
    fn test_log_extraction_logger_variable() {
        let chunker = chunker_with(1000, 10, 5);
        let content = "logger.error(ex.getMessage());\n";
        let chunks = chunker.chunk("B.java", content, None).unwrap();
        assert_eq!(chunks[0].logs.len(), 1);
        assert_eq!(chunks[0].logs[0].level, "error");
    }

    #[test]
    fn test_no_logs_for_non_jvm() {
        let chunker = chunker_with(1000, 10, 5);
        let content = "log.info(\"hi\");\n";
        let chunks = chunker.chunk("a.py", content, None).unwrap();
        assert!(chunks[0].logs.is_empty());
    }

    #[test]
    fn test_no_match_yields_empty_logs() {
        let chunker = chunker_with(1000, 10, 5);
        let chunks = chunker.chunk("A.java", "class A {}\n", None).unwrap();
        assert!(chunks[0].logs.is_empty());
    }

    #[test]
    fn test_empty_content() {
        let chunker = chunker_with(100, 10, 5);
        let chunks = chunker.chunk("a.txt", "", None).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 1);
    }

    #[test]
    fn test_overlap_override_validation() {
        let chunker = chunker_with(10, 2, 2);
        let result = chunker.chunk("a.txt", "hello", Some(10));
        assert!(result.is_err());
    }

    #[test]
    fn test_multibyte_content_boundaries() {
        let chunker = chunker_with(10, 2, 2);
        let content = "é".repeat(25);
        let chunks = chunker.chunk("a.txt", &content, None).unwrap();
        for chunk in &chunks {
            assert!(chunk.size() <= 10 || chunk.index == chunks.len() - 1);
        }
        // Rebuild from stride segments.
        let mut rebuilt = chunks[0].content.clone();
        for chunk in &chunks[1..] {
            let chars: Vec<char> = chunk.content.chars().collect();
            rebuilt.extend(chars[2..].iter());
        }
        assert_eq!(rebuilt, content);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Stripping each chunk's leading overlap reconstructs the input.
            #[test]
            fn chunk_coverage_roundtrip(content in "[ -~\n]{0,400}") {
                let chunker = chunker_with(40, 8, 4);
                let chunks = chunker.chunk("f.txt", &content, None).unwrap();

                let mut rebuilt: String = chunks[0].content.clone();
                for chunk in &chunks[1..] {
                    let chars: Vec<char> = chunk.content.chars().collect();
                    rebuilt.extend(chars[8.min(chars.len())..].iter());
                }
                prop_assert_eq!(rebuilt, content);
            }

            // Line ranges are ordered and start at 1.
            #[test]
            fn line_ranges_are_monotonic(content in "[a-z\n]{0,300}") {
                let chunker = chunker_with(30, 5, 3);
                let chunks = chunker.chunk("f.txt", &content, None).unwrap();
                prop_assert_eq!(chunks[0].start_line, 1);
                for chunk in &chunks {
                    prop_assert!(chunk.start_line <= chunk.end_line);
                }
                for pair in chunks.windows(2) {
                    prop_assert!(pair[0].start_line <= pair[1].start_line);
                    prop_assert!(pair[0].end_line >= pair[1].start_line);
                }
            }
        }
    }
}
