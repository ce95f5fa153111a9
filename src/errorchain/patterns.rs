//! Regex patterns for exception-site scanning.
//!
//! The site patterns are parameterized by the exception's simple class
//! name. Catch bodies are extracted by brace balancing rather than a
//! multiline regex, so body-level checks (empty catch, swallowed) never
//! match across block boundaries.

use regex::Regex;

use crate::error::{ChunkingError, Result};

/// Compiled patterns for one exception simple name.
#[derive(Debug)]
pub struct ExceptionPatterns {
    /// `throw new <Simple>(`
    pub throw_site: Regex,
    /// `catch (<Simple> ident`
    pub catch_site: Regex,
    /// `new <Wrapper>Exception(... <Simple> ...)` capturing the wrapper.
    pub wraps_into: Regex,
    /// `new <Simple>(... <Wrapped>Exception ...)` capturing the wrapped.
    pub wraps_from: Regex,
    /// Logger call mentioning the exception, capturing the level.
    pub log_site: Regex,
    /// First string literal passed to the constructor.
    pub message: Regex,
}

impl ExceptionPatterns {
    /// Compiles the pattern set for a simple class name.
    ///
    /// # Errors
    ///
    /// Returns an error when a pattern fails to compile (a malformed class
    /// name containing regex metacharacters).
    pub fn compile(simple_name: &str) -> Result<Self> {
        let name = regex::escape(simple_name);
        let build = |pattern: String| -> Result<Regex> {
            Regex::new(&pattern).map_err(|e| ChunkingError::from(e).into())
        };

        Ok(Self {
            throw_site: build(format!(r"\bthrow\s+new\s+(?:[\w.]+\.)?{name}\s*\("))?,
            catch_site: build(format!(r"catch\s*\(\s*(?:[\w.]+\.)?{name}\s+"))?,
            wraps_into: build(format!(
                r"new\s+([\w.]*\w+Exception)\s*\([^)]*\b{name}\b[^)]*\)"
            ))?,
            wraps_from: build(format!(
                r"new\s+(?:[\w.]+\.)?{name}\s*\([^)]*\b([\w.]*\w+Exception)\b[^)]*\)"
            ))?,
            log_site: build(format!(
                r"\blog(?:ger)?\.(error|warn|info|debug|trace)\s*\(.*{name}.*\)"
            ))?,
            message: build(format!(r#"new\s+(?:[\w.]+\.)?{name}\s*\(\s*"([^"]*)""#))?,
        })
    }
}

/// One catch block extracted from source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchBlock {
    /// Caught exception type as written.
    pub exception_type: String,
    /// The bound exception identifier.
    pub identifier: String,
    /// Block body between the braces.
    pub body: String,
    /// 1-based line of the `catch` keyword.
    pub line: usize,
}

/// Extracts every catch block by balancing braces from the block opener.
///
/// Malformed input (unbalanced braces) drops the trailing block rather
/// than failing.
#[must_use]
pub fn extract_catch_blocks(content: &str) -> Vec<CatchBlock> {
    // Header: catch (Type ident) { — with optional qualification and unions.
    let Ok(header) =
        Regex::new(r"catch\s*\(\s*(?:final\s+)?([\w.|\s]+?)\s+(\w+)\s*\)\s*\{")
    else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for caps in header.captures_iter(content) {
        let (Some(whole), Some(exception_type), Some(identifier)) =
            (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let open = whole.end() - 1;
        let Some(close) = matching_brace(content, open) else {
            continue;
        };
        blocks.push(CatchBlock {
            exception_type: exception_type.as_str().trim().to_string(),
            identifier: identifier.as_str().to_string(),
            body: content[open + 1..close].to_string(),
            line: line_of(content, whole.start()),
        });
    }
    blocks
}

/// Index of the brace matching the one at `open`, skipping string and char
/// literals and line comments.
fn matching_brace(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    let mut in_string = false;
    let mut in_char = false;
    let mut in_line_comment = false;

    while i < bytes.len() {
        let b = bytes[i];
        if in_line_comment {
            if b == b'\n' {
                in_line_comment = false;
            }
        } else if in_string {
            if b == b'\\' {
                i += 1;
            } else if b == b'"' {
                in_string = false;
            }
        } else if in_char {
            if b == b'\\' {
                i += 1;
            } else if b == b'\'' {
                in_char = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'\'' => in_char = true,
                b'/' if bytes.get(i + 1) == Some(&b'/') => in_line_comment = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// 1-based line of a byte offset.
#[must_use]
pub fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throw_site() {
        let p = ExceptionPatterns::compile("FooException").unwrap();
        assert!(p.throw_site.is_match("throw new FooException(\"bad\");"));
        assert!(p.throw_site.is_match("throw new com.example.FooException();"));
        assert!(!p.throw_site.is_match("throw new BarException();"));
    }

    #[test]
    fn test_catch_site() {
        let p = ExceptionPatterns::compile("FooException").unwrap();
        assert!(p.catch_site.is_match("catch (FooException e) {"));
        assert!(p.catch_site.is_match("} catch ( com.example.FooException ex ) {"));
        assert!(!p.catch_site.is_match("catch (IOException e) {"));
    }

    #[test]
    fn test_wrapping_directions() {
        let p = ExceptionPatterns::compile("FooException").unwrap();

        let caps = p
            .wraps_into
            .captures("throw new ServiceException(\"ctx\", fooException);")
            .unwrap();
        assert_eq!(&caps[1], "ServiceException");

        let caps = p
            .wraps_from
            .captures("throw new FooException(barException);")
            .unwrap();
        assert_eq!(&caps[1], "barException");
    }

    #[test]
    fn test_log_site_levels() {
        let p = ExceptionPatterns::compile("FooException").unwrap();
        let caps = p
            .log_site
            .captures("log.error(\"failed\", fooException)")
            .unwrap();
        assert_eq!(&caps[1], "error");
        assert!(p.log_site.is_match("logger.warn(\"FooException seen\")"));
        assert!(!p.log_site.is_match("log.error(\"unrelated\")"));
    }

    #[test]
    fn test_message_literal() {
        let p = ExceptionPatterns::compile("FooException").unwrap();
        let caps = p
            .message
            .captures("throw new FooException(\"customer not found\");")
            .unwrap();
        assert_eq!(&caps[1], "customer not found");
    }

    #[test]
    fn test_extract_catch_blocks() {
        let source = r#"
class A {
  void run() {
    try {
      work();
    } catch (IOException e) {
      log.error("io", e);
    } catch (Exception ex) {
    }
  }
}
"#;
        let blocks = extract_catch_blocks(source);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].exception_type, "IOException");
        assert_eq!(blocks[0].identifier, "e");
        assert!(blocks[0].body.contains("log.error"));
        assert_eq!(blocks[1].exception_type, "Exception");
        assert!(blocks[1].body.trim().is_empty());
        assert_eq!(blocks[0].line, 6);
    }

    #[test]
    fn test_nested_braces_balanced() {
        let source = r#"
try { x(); } catch (FooException e) {
  if (retryable(e)) {
    retry();
  }
  throw e;
}
"#;
        let blocks = extract_catch_blocks(source);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].body.contains("retry()"));
        assert!(blocks[0].body.contains("throw e"));
    }

    #[test]
    fn test_braces_in_strings_ignored() {
        let source = "catch (FooException e) { log.warn(\"brace } in string\"); }";
        let blocks = extract_catch_blocks(source);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].body.contains("brace } in string"));
    }

    #[test]
    fn test_unbalanced_tail_dropped() {
        let source = "catch (FooException e) { log.warn(";
        assert!(extract_catch_blocks(source).is_empty());
    }

    #[test]
    fn test_line_of() {
        let content = "a\nb\nc";
        assert_eq!(line_of(content, 0), 1);
        assert_eq!(line_of(content, 2), 2);
        assert_eq!(line_of(content, 4), 3);
    }
}
