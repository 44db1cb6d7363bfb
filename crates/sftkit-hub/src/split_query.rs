//! Split query expressions: `train`, `train[10:20]`, `train[:2%]`, `train[-2%:]+test`.
//!
//! A query names one or more splits joined with `+`, each optionally sliced
//! with Python-style `[start:end]` bounds. Bounds are row counts or
//! percentages of the split; negative bounds count from the end.
//! Percentages round to the nearest row. A malformed query is reported as
//! [`SftError::RemoteFetch`], like any other query the hub rejects.

use sftkit_core::{Result, SftError};
use std::fmt;
use std::ops::Range;

/// One slice bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// A row index.
    Rows(i64),
    /// A percentage of the split, in `-100..=100`.
    Percent(i64),
}

impl Bound {
    fn parse(text: &str, query: &str) -> Result<Option<Self>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let (digits, percent) = match text.strip_suffix('%') {
            Some(digits) => (digits.trim_end(), true),
            None => (text, false),
        };
        let value: i64 = digits
            .parse()
            .map_err(|_| invalid(query, format!("bad bound '{}'", text)))?;
        if percent {
            if !(-100..=100).contains(&value) {
                return Err(invalid(query, format!("percentage {}% out of range", value)));
            }
            Ok(Some(Self::Percent(value)))
        } else {
            Ok(Some(Self::Rows(value)))
        }
    }

    /// Row index this bound lands on in a split of `len` rows.
    fn resolve(self, len: usize) -> usize {
        let (magnitude, negative) = match self {
            Self::Rows(n) => (n.unsigned_abs() as u128, n < 0),
            Self::Percent(p) => {
                let rows = (u128::from(p.unsigned_abs()) * len as u128 + 50) / 100;
                (rows, p < 0)
            }
        };
        let magnitude = usize::try_from(magnitude).unwrap_or(usize::MAX).min(len);
        if negative {
            len - magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows(n) => write!(f, "{}", n),
            Self::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// A named split with an optional slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSlice {
    /// Split name, e.g. `train`.
    pub split: String,
    /// Inclusive start; `None` means the first row.
    pub start: Option<Bound>,
    /// Exclusive end; `None` means past the last row.
    pub end: Option<Bound>,
}

impl SplitSlice {
    /// The rows this slice selects from a split of `len` rows.
    ///
    /// Bounds are clamped to the split; an inverted range selects nothing.
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let start = self.start.map_or(0, |b| b.resolve(len));
        let end = self.end.map_or(len, |b| b.resolve(len));
        start..end.max(start)
    }

    fn parse(text: &str, query: &str) -> Result<Self> {
        let text = text.trim();
        let (name, slice) = match text.find('[') {
            Some(open) => {
                let inner = text[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| invalid(query, "unclosed '['".to_string()))?;
                (&text[..open], Some(inner))
            }
            None => (text, None),
        };

        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid(query, format!("bad split name '{}'", name)));
        }

        let (start, end) = match slice {
            None => (None, None),
            Some(inner) => {
                let (start, end) = inner
                    .split_once(':')
                    .ok_or_else(|| invalid(query, format!("slice '[{}]' needs a ':'", inner)))?;
                (Bound::parse(start, query)?, Bound::parse(end, query)?)
            }
        };

        Ok(Self {
            split: name.to_string(),
            start,
            end,
        })
    }
}

impl fmt::Display for SplitSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.split)?;
        if self.start.is_some() || self.end.is_some() {
            f.write_str("[")?;
            if let Some(start) = self.start {
                write!(f, "{}", start)?;
            }
            f.write_str(":")?;
            if let Some(end) = self.end {
                write!(f, "{}", end)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// A parsed split query: slices whose rows are concatenated in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    slices: Vec<SplitSlice>,
}

impl SplitQuery {
    /// Parse a query expression.
    pub fn parse(query: &str) -> Result<Self> {
        let slices = query
            .split('+')
            .map(|part| SplitSlice::parse(part, query))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slices })
    }

    /// The slices, in query order.
    pub fn slices(&self) -> &[SplitSlice] {
        &self.slices
    }

    /// Distinct split names, in first-use order.
    pub fn split_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for slice in &self.slices {
            if !names.contains(&slice.split.as_str()) {
                names.push(&slice.split);
            }
        }
        names
    }
}

impl std::str::FromStr for SplitQuery {
    type Err = SftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SplitQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slice) in self.slices.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", slice)?;
        }
        Ok(())
    }
}

fn invalid(query: &str, reason: String) -> SftError {
    SftError::RemoteFetch(format!("invalid split query '{}': {}", query, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(query: &str, len: usize) -> Range<usize> {
        SplitQuery::parse(query).unwrap().slices()[0].resolve(len)
    }

    #[test]
    fn test_plain_split() {
        let query = SplitQuery::parse("train").unwrap();
        assert_eq!(query.slices().len(), 1);
        assert_eq!(query.slices()[0].resolve(7), 0..7);
        assert_eq!(query.to_string(), "train");
    }

    #[test]
    fn test_row_bounds() {
        assert_eq!(range("train[10:20]", 100), 10..20);
        assert_eq!(range("train[:5]", 100), 0..5);
        assert_eq!(range("train[95:]", 100), 95..100);
        assert_eq!(range("train[-3:]", 10), 7..10);
        assert_eq!(range("train[:-3]", 10), 0..7);
        assert_eq!(range("train[5:500]", 10), 5..10);
        assert_eq!(range("train[8:2]", 10), 8..8);
    }

    #[test]
    fn test_percent_bounds() {
        assert_eq!(range("train[:2%]", 1000), 0..20);
        assert_eq!(range("train[-2%:]", 1000), 980..1000);
        assert_eq!(range("train[10%:20%]", 50), 5..10);
        // 2% of 130 is 2.6 rows.
        assert_eq!(range("train[:2%]", 130), 0..3);
        assert_eq!(range("train[:100%]", 3), 0..3);
    }

    #[test]
    fn test_joined_queries() {
        let query: SplitQuery = "train[:10]+validation+train[-10:]".parse().unwrap();
        assert_eq!(query.slices().len(), 3);
        assert_eq!(query.split_names(), vec!["train", "validation"]);
        assert_eq!(query.to_string(), "train[:10]+validation+train[-10:]");
    }

    #[test]
    fn test_invalid_queries() {
        for bad in ["", "train[", "train[5]", "train[a:b]", "train[:101%]", "tr ain", "+test"] {
            let err = SplitQuery::parse(bad).unwrap_err();
            assert!(matches!(err, SftError::RemoteFetch(_)), "{bad}: {err}");
        }
    }
}
