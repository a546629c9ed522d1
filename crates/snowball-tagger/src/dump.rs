//! Extracted dump reader
//!
//! Reads files made of `<doc id=".." url=".." title="..">` ... `</doc>`
//! blocks, one page at a time.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Result, TaggerError};

/// One page of an extracted dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: u64,
    pub url: String,
    pub title: String,
    /// Body lines between the header and the closing tag
    pub text: String,
}

/// Split a `<doc id="..." url="..." title="...">` header into its attributes
fn parse_header(line: &str) -> Option<(&str, &str, &str)> {
    let rest = line.trim_end().strip_prefix("<doc id=\"")?;
    let (id, rest) = rest.split_once("\" url=\"")?;
    let (url, rest) = rest.split_once("\" title=\"")?;
    let title = rest.strip_suffix("\">")?;
    Some((id, url, title))
}

fn is_page_end(line: &str) -> bool {
    line.trim_end() == "</doc>"
}

/// Iterator over the pages of a dump file
pub struct PageReader<R> {
    reader: R,
    path: PathBuf,
    line: String,
    line_no: usize,
}

impl PageReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TaggerError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = Self::new(BufReader::new(file));
        reader.path = path.to_path_buf();
        Ok(reader)
    }
}

impl<R: BufRead> PageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            path: PathBuf::from("<input>"),
            line: String::new(),
            line_no: 0,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .reader
            .read_line(&mut self.line)
            .map_err(|source| TaggerError::IoError {
                path: self.path.clone(),
                source,
            })?;
        self.line_no += 1;
        Ok(n > 0)
    }

    /// Next complete page, `None` at end of input.
    ///
    /// Lines outside a page are skipped; a page cut off by end of input is
    /// dropped.
    pub fn next_page(&mut self) -> Result<Option<Page>> {
        let mut current: Option<Page> = None;

        while self.read_line()? {
            if let Some((id, url, title)) = parse_header(&self.line) {
                let id = id.parse().map_err(|_| {
                    TaggerError::MalformedDump(format!(
                        "{} line {}: non-numeric page id {:?}",
                        self.path.display(),
                        self.line_no,
                        id
                    ))
                })?;
                current = Some(Page {
                    id,
                    url: url.to_string(),
                    title: title.to_string(),
                    text: String::new(),
                });
            } else if is_page_end(&self.line) {
                if let Some(page) = current.take() {
                    return Ok(Some(page));
                }
            } else if let Some(page) = current.as_mut() {
                page.text.push_str(&self.line);
            }
        }

        if let Some(page) = current {
            warn!("Dropping truncated page {} ({})", page.id, page.title);
        }
        Ok(None)
    }
}

impl<R: BufRead> Iterator for PageReader<R> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DUMP: &str = r#"<doc id="12" url="https://en.wikipedia.org/wiki?curid=12" title="Anarchism">
Anarchism

Anarchism is a political philosophy.
</doc>
stray line
<doc id="25" url="https://en.wikipedia.org/wiki?curid=25" title="Autism">
Autism is a disorder.
</doc>
"#;

    #[test]
    fn test_reads_pages_in_order() {
        let pages: Vec<Page> = PageReader::new(Cursor::new(DUMP))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, 12);
        assert_eq!(pages[0].title, "Anarchism");
        assert_eq!(pages[0].text, "Anarchism\n\nAnarchism is a political philosophy.\n");
        assert_eq!(pages[1].url, "https://en.wikipedia.org/wiki?curid=25");
        assert_eq!(pages[1].text, "Autism is a disorder.\n");
    }

    #[test]
    fn test_truncated_page_is_dropped() {
        let text = "<doc id=\"1\" url=\"u\" title=\"t\">\nno end\n";
        let mut reader = PageReader::new(Cursor::new(text));
        assert!(reader.next_page().unwrap().is_none());
    }

    #[test]
    fn test_bad_id_is_an_error() {
        let text = "<doc id=\"abc\" url=\"u\" title=\"t\">\nx\n</doc>\n";
        let mut reader = PageReader::new(Cursor::new(text));
        assert!(matches!(reader.next_page(), Err(TaggerError::MalformedDump(_))));
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("<doc id=\"7\" url=\"http://x\" title=\"New York\">\n"),
            Some(("7", "http://x", "New York"))
        );
        assert_eq!(parse_header("</doc>"), None);
    }

    #[test]
    fn test_open_missing_file() {
        let err = PageReader::open("/nonexistent/wiki_00").err().unwrap();
        assert!(matches!(err, TaggerError::IoError { .. }));
    }
}
