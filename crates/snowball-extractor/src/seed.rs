//! Seed file parsing
//!
//! Format: the relation name on the first line, `SUBJECT_TAG OBJECT_TAG` on
//! the second, then one `subject<TAB>object` pair per line.

use std::path::Path;

use serde::{Deserialize, Serialize};
use snowball_core::{RelationTuple, Result, SnowballError};

use crate::tuple::CandidateTuple;

/// Relation definition and its initial trusted pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSet {
    pub relation: String,
    pub subject_tag: String,
    pub object_tag: String,
    pub pairs: Vec<(String, String)>,
}

impl SeedSet {
    /// Read and parse a seed file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SnowballError::io(path, e))?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse seed text; `source` names the input in errors
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let invalid = |line: usize, reason: &str| SnowballError::InvalidSeedFile {
            path: source.to_string(),
            line,
            reason: reason.to_string(),
        };

        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l.trim()));

        let relation = match lines.next() {
            Some((_, rel)) if !rel.is_empty() => rel.to_string(),
            _ => return Err(invalid(1, "missing relation name")),
        };

        let (subject_tag, object_tag) = match lines.next() {
            Some((n, tags)) => {
                let mut fields = tags.split_whitespace();
                match (fields.next(), fields.next()) {
                    (Some(s), Some(o)) => (s.to_string(), o.to_string()),
                    _ => return Err(invalid(n, "expected `SUBJECT_TAG OBJECT_TAG`")),
                }
            }
            None => return Err(invalid(2, "missing entity tag line")),
        };

        let mut pairs = Vec::new();
        for (n, line) in lines {
            if line.is_empty() {
                continue;
            }
            let mut fields: Vec<&str> = if line.contains('\t') {
                line.split('\t').map(str::trim).filter(|f| !f.is_empty()).collect()
            } else {
                line.split_whitespace().collect()
            };
            if fields.len() < 2 {
                return Err(invalid(n, "expected `subject<TAB>object`"));
            }
            fields.truncate(2);
            pairs.push((fields[0].to_string(), fields[1].to_string()));
        }

        Ok(Self {
            relation,
            subject_tag,
            object_tag,
            pairs,
        })
    }

    /// Relation tuples for every seed pair
    pub fn relation_tuples(&self) -> Vec<RelationTuple> {
        self.pairs
            .iter()
            .map(|(subject, object)| {
                RelationTuple::new(
                    self.relation.as_str(),
                    subject.as_str(),
                    object.as_str(),
                    self.subject_tag.as_str(),
                    self.object_tag.as_str(),
                )
            })
            .collect()
    }

    /// Initial seed candidates, each with confidence `1.0`
    pub fn tuples(&self, update_factor: f64) -> Vec<CandidateTuple> {
        self.relation_tuples()
            .into_iter()
            .map(|t| CandidateTuple::new(t, update_factor))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEEDS: &str = "capital_of\nLOCATION COUNTRY\nParis\tFrance\nBerlin\tGermany\n\nNew_Delhi India\n";

    #[test]
    fn test_parse_seed_text() {
        let seeds = SeedSet::parse(SEEDS, "seeds").unwrap();

        assert_eq!(seeds.relation, "capital_of");
        assert_eq!(seeds.subject_tag, "LOCATION");
        assert_eq!(seeds.object_tag, "COUNTRY");
        assert_eq!(
            seeds.pairs,
            vec![
                ("Paris".to_string(), "France".to_string()),
                ("Berlin".to_string(), "Germany".to_string()),
                ("New_Delhi".to_string(), "India".to_string()),
            ]
        );
    }

    #[test]
    fn test_tuples_start_trusted() {
        let seeds = SeedSet::parse(SEEDS, "seeds").unwrap();
        let tuples = seeds.tuples(0.5);

        assert_eq!(tuples.len(), 3);
        assert!(tuples.iter().all(|t| t.confidence() == 1.0));
        assert_eq!(tuples[0].tuple.subject_anchor(), "<LOCATION>Paris</LOCATION>");
        assert_eq!(tuples[0].tuple.object_anchor(), "<COUNTRY>France</COUNTRY>");
    }

    #[test]
    fn test_tab_separated_pairs_keep_spaces() {
        let seeds = SeedSet::parse("r\nA B\nSan Jose\tCosta Rica\n", "seeds").unwrap();
        assert_eq!(
            seeds.pairs,
            vec![("San Jose".to_string(), "Costa Rica".to_string())]
        );
    }

    #[test]
    fn test_missing_tag_is_rejected() {
        let err = SeedSet::parse("capital_of\nLOCATION\nParis\tFrance\n", "seeds").unwrap_err();
        assert!(matches!(err, SnowballError::InvalidSeedFile { line: 2, .. }));
    }

    #[test]
    fn test_short_pair_line_is_rejected() {
        let err = SeedSet::parse("r\nA B\nParis\tFrance\nLonely\n", "seeds").unwrap_err();
        assert!(matches!(err, SnowballError::InvalidSeedFile { line: 4, .. }));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let err = SeedSet::parse("", "seeds").unwrap_err();
        assert!(matches!(err, SnowballError::InvalidSeedFile { line: 1, .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEEDS.as_bytes()).unwrap();

        let seeds = SeedSet::from_file(file.path()).unwrap();
        assert_eq!(seeds.pairs.len(), 3);

        let missing = SeedSet::from_file("/nonexistent/seeds");
        assert!(matches!(missing, Err(SnowballError::IoError { .. })));
    }
}
