use std::fmt::{Display, Write};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{NetError, Result};

/// Appends `<value>` to `out`.
pub(crate) fn push_tag(out: &mut String, value: impl Display) {
    // Writing into a String cannot fail.
    let _ = write!(out, "<{value}>");
}

/// Appends the JSON form of a parameter blob; an unset blob is written as `null`.
pub(crate) fn push_blob<T: Serialize>(out: &mut String, blob: &Option<T>) -> Result<()> {
    out.push_str(&serde_json::to_string(blob)?);
    Ok(())
}

/// Sequential reader over `<field><field>...<trailing blob>` text.
pub(crate) struct TagReader<'a> {
    rest: &'a str,
}

impl<'a> TagReader<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        TagReader { rest: text.trim() }
    }

    pub(crate) fn has_tag(&self) -> bool {
        self.rest.starts_with('<')
    }

    /// Consumes the next `<...>` field and returns its contents.
    pub(crate) fn tag(&mut self) -> Result<&'a str> {
        let body = self.rest.strip_prefix('<').ok_or_else(|| {
            NetError::Parse(format!("expected `<` at `{}`", preview(self.rest)))
        })?;
        let end = body.find('>').ok_or_else(|| {
            NetError::Parse(format!("unterminated tag at `{}`", preview(self.rest)))
        })?;
        self.rest = &body[end + 1..];
        Ok(&body[..end])
    }

    pub(crate) fn number<T: FromStr>(&mut self, field: &str) -> Result<T> {
        let raw = self.tag()?;
        raw.parse()
            .map_err(|_| NetError::Parse(format!("`{raw}` is not a valid {field}")))
    }

    /// Parses everything left as one JSON value.
    pub(crate) fn blob<T: DeserializeOwned>(&mut self, field: &str) -> Result<T> {
        if self.rest.is_empty() {
            return Err(NetError::Parse(format!("missing {field}")));
        }
        let value = serde_json::from_str(self.rest)?;
        self.rest = "";
        Ok(value)
    }

    /// Fails if anything is left unread.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(NetError::Parse(format!("unexpected trailing text `{}`", preview(self.rest))))
        }
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(24) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fields_then_blob() {
        let mut reader = TagReader::new("<NLayer><3>[[1.0,2.0,3.0]]");
        assert_eq!(reader.tag().unwrap(), "NLayer");
        assert_eq!(reader.number::<usize>("node count").unwrap(), 3);
        assert!(!reader.has_tag());
        let w: Vec<Vec<f64>> = reader.blob("weights").unwrap();
        assert_eq!(w, vec![vec![1.0, 2.0, 3.0]]);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(TagReader::new("NLayer>").tag().is_err());
        assert!(TagReader::new("<NLayer").tag().is_err());
        let mut reader = TagReader::new("<ALayer><two>");
        reader.tag().unwrap();
        assert!(reader.number::<usize>("kernel size").is_err());
    }
}
