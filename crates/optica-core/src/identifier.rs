//! # Identifier Templates
//!
//! Human-readable sequential identifiers for clients and sales.
//!
//! ## Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Identifier Anatomy                                   │
//! │                                                                         │
//! │   Template:   SALE/{year}/{month}/{seq:3}                               │
//! │                                                                         │
//! │   Date 2025-03-14                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   Bucket:     SALE/2025/03/      ← everything before {seq}              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   Last stored: SALE/2025/03/041  → sequence 41                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   Next:       SALE/2025/03/042                                          │
//! │                                                                         │
//! │   New month → new bucket → no stored row matches → sequence 1           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Templates are plain strings so a deployment can keep the numbering its
//! paper records already use (`opt/M/{seq:3}` has no period at all).
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use optica_core::identifier::IdTemplate;
//!
//! let template: IdTemplate = "M/{year}/{month}/{seq}".parse().unwrap();
//! let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
//!
//! let bucket = template.bucket(date);
//! assert_eq!(bucket, "M/2025/03/");
//!
//! let next = template.next_sequence(&bucket, Some("M/2025/03/9")).unwrap();
//! assert_eq!(template.render(&bucket, next), "M/2025/03/10");
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::IdentifierError;

/// Default client registration template.
pub const DEFAULT_CLIENT_TEMPLATE: &str = "M/{year}/{month}/{seq}";

/// Default sale reference template.
pub const DEFAULT_SALE_TEMPLATE: &str = "SALE/{year}/{month}/{seq:3}";

/// Widest zero padding a template may ask for.
const MAX_SEQ_WIDTH: usize = 9;

// =============================================================================
// Entity Kind
// =============================================================================

/// Which record family an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Client registration number.
    Client,
    /// Sale reference number.
    Sale,
}

impl EntityKind {
    /// Stable lowercase name, used in counter keys and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Sale => "sale",
        }
    }

    /// Key of the sequence counter for a bucket of this kind.
    ///
    /// The kind is part of the key so two families never share a counter,
    /// even if their templates render the same prefix.
    pub fn counter_key(&self, bucket: &str) -> String {
        format!("{}:{}", self.as_str(), bucket)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// A generated identifier together with the parts it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Identifier {
    /// Full identifier, e.g. `M/2025/03/2`.
    pub value: String,
    /// Prefix shared by every identifier in the same period.
    pub bucket: String,
    /// Position within the bucket, starting at 1.
    pub sequence: u64,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// =============================================================================
// Template
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Year,
    Month,
}

/// A parsed identifier template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTemplate {
    source: String,
    segments: Vec<Segment>,
    seq_width: usize,
}

impl IdTemplate {
    /// The template string this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Zero-pad width of the sequence (0 = unpadded).
    pub fn seq_width(&self) -> usize {
        self.seq_width
    }

    /// Renders the prefix shared by all identifiers issued on `date`'s period.
    pub fn bucket(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Year => out.push_str(&format!("{:04}", date.year())),
                Segment::Month => out.push_str(&format!("{:02}", date.month())),
            }
        }
        out
    }

    /// Renders a full identifier from a bucket and sequence number.
    ///
    /// Sequences wider than the pad are written in full rather than truncated.
    pub fn render(&self, bucket: &str, sequence: u64) -> String {
        format!("{}{:0width$}", bucket, sequence, width = self.seq_width)
    }

    /// Builds the [`Identifier`] for `sequence` in `date`'s bucket.
    pub fn identifier(&self, date: NaiveDate, sequence: u64) -> Identifier {
        let bucket = self.bucket(date);
        Identifier {
            value: self.render(&bucket, sequence),
            bucket,
            sequence,
        }
    }

    /// Computes the sequence that follows `last` within `bucket`.
    ///
    /// ## Rules
    /// - No previous identifier → 1
    /// - Previous identifier → its trailing number + 1
    /// - Previous identifier outside the bucket or with a non-numeric tail →
    ///   [`IdentifierError::Malformed`]
    pub fn next_sequence(&self, bucket: &str, last: Option<&str>) -> Result<u64, IdentifierError> {
        let Some(last) = last else {
            return Ok(1);
        };

        let current = self.sequence_in(bucket, last)?;
        current.checked_add(1).ok_or_else(|| IdentifierError::Malformed {
            identifier: last.to_string(),
            reason: "sequence is at its maximum".to_string(),
        })
    }

    /// Produces the next identifier for `date`, asking `lookup` for the last
    /// identifier issued in that period.
    ///
    /// `lookup` receives the bucket prefix and stands in for the store's
    /// "last identifier with this prefix" query.
    pub fn next_identifier<F, E>(&self, date: NaiveDate, lookup: F) -> Result<Identifier, E>
    where
        F: FnOnce(&str) -> Result<Option<String>, E>,
        E: From<IdentifierError>,
    {
        let bucket = self.bucket(date);
        let last = lookup(&bucket)?;
        let sequence = self.next_sequence(&bucket, last.as_deref())?;
        Ok(Identifier {
            value: self.render(&bucket, sequence),
            bucket,
            sequence,
        })
    }

    /// Splits an identifier produced by this template into bucket and sequence.
    pub fn parse(&self, identifier: &str) -> Result<Identifier, IdentifierError> {
        let digits = identifier
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        let (bucket, _) = identifier.split_at(identifier.len() - digits);

        if !self.matches_bucket(bucket) {
            return Err(IdentifierError::Malformed {
                identifier: identifier.to_string(),
                reason: format!("does not match template '{}'", self.source),
            });
        }

        let sequence = self.sequence_in(bucket, identifier)?;
        Ok(Identifier {
            value: identifier.to_string(),
            bucket: bucket.to_string(),
            sequence,
        })
    }

    fn sequence_in(&self, bucket: &str, identifier: &str) -> Result<u64, IdentifierError> {
        let tail = identifier
            .strip_prefix(bucket)
            .ok_or_else(|| IdentifierError::Malformed {
                identifier: identifier.to_string(),
                reason: format!("expected prefix '{}'", bucket),
            })?;

        if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdentifierError::Malformed {
                identifier: identifier.to_string(),
                reason: format!("trailing segment '{}' is not a number", tail),
            });
        }

        tail.parse::<u64>().map_err(|e| IdentifierError::Malformed {
            identifier: identifier.to_string(),
            reason: e.to_string(),
        })
    }

    /// Checks that `candidate` has the shape of a bucket this template renders.
    fn matches_bucket(&self, candidate: &str) -> bool {
        let mut rest = candidate;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => match rest.strip_prefix(text.as_str()) {
                    Some(r) => rest = r,
                    None => return false,
                },
                Segment::Year => match rest.get(..4) {
                    Some(year) if year.chars().all(|c| c.is_ascii_digit()) => rest = &rest[4..],
                    _ => return false,
                },
                Segment::Month => match rest.get(..2).map(str::parse::<u32>) {
                    Some(Ok(m)) if (1..=12).contains(&m) => rest = &rest[2..],
                    _ => return false,
                },
            }
        }
        rest.is_empty()
    }
}

impl FromStr for IdTemplate {
    type Err = IdentifierError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| IdentifierError::InvalidTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut seq_width = None;
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            if seq_width.is_some() {
                return Err(invalid("{seq} must be the last element"));
            }
            if c != '{' {
                literal.push(c);
                continue;
            }

            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if !closed {
                return Err(invalid("unclosed '{'"));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            match name.as_str() {
                "year" => segments.push(Segment::Year),
                "month" => segments.push(Segment::Month),
                "seq" => seq_width = Some(0),
                other => match other.strip_prefix("seq:") {
                    Some(width) => {
                        let width: usize = width
                            .parse()
                            .map_err(|_| invalid("sequence width must be a number"))?;
                        if width == 0 || width > MAX_SEQ_WIDTH {
                            return Err(invalid("sequence width must be between 1 and 9"));
                        }
                        seq_width = Some(width);
                    }
                    None => return Err(invalid(&format!("unknown placeholder '{{{}}}'", other))),
                },
            }
        }

        let seq_width = seq_width.ok_or_else(|| invalid("missing {seq} placeholder"))?;

        Ok(IdTemplate {
            source: source.to_string(),
            segments,
            seq_width,
        })
    }
}

impl fmt::Display for IdTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// =============================================================================
// Template Set
// =============================================================================

/// The templates in use for each entity kind.
#[derive(Debug, Clone)]
pub struct IdTemplates {
    client: IdTemplate,
    sale: IdTemplate,
}

impl IdTemplates {
    /// Creates a template set.
    ///
    /// The two templates must render different prefixes, otherwise a
    /// registration number could be read as a sale reference. Padding of
    /// `{seq}` does not count as a difference.
    pub fn new(client: IdTemplate, sale: IdTemplate) -> Result<Self, IdentifierError> {
        if client.segments == sale.segments {
            return Err(IdentifierError::InvalidTemplate {
                template: sale.as_str().to_string(),
                reason: format!("renders the same prefix as client template '{}'", client.as_str()),
            });
        }
        Ok(IdTemplates { client, sale })
    }

    pub fn client(&self) -> &IdTemplate {
        &self.client
    }

    pub fn sale(&self) -> &IdTemplate {
        &self.sale
    }

    /// Returns the template for `kind`.
    pub fn for_kind(&self, kind: EntityKind) -> &IdTemplate {
        match kind {
            EntityKind::Client => &self.client,
            EntityKind::Sale => &self.sale,
        }
    }
}

impl Default for IdTemplates {
    fn default() -> Self {
        IdTemplates {
            client: IdTemplate {
                source: DEFAULT_CLIENT_TEMPLATE.to_string(),
                segments: vec![
                    Segment::Literal("M/".to_string()),
                    Segment::Year,
                    Segment::Literal("/".to_string()),
                    Segment::Month,
                    Segment::Literal("/".to_string()),
                ],
                seq_width: 0,
            },
            sale: IdTemplate {
                source: DEFAULT_SALE_TEMPLATE.to_string(),
                segments: vec![
                    Segment::Literal("SALE/".to_string()),
                    Segment::Year,
                    Segment::Literal("/".to_string()),
                    Segment::Month,
                    Segment::Literal("/".to_string()),
                ],
                seq_width: 3,
            },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
