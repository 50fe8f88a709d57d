use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Entries shorter than this are ignored.
pub const MIN_WORD_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum WordlistError {
    #[error("no word list path configured")]
    NotConfigured,

    #[error("Failed to load wordlist from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Auxiliary dictionary of lowercase words, one per line in the source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wordlist {
    words: HashSet<String>,
}

impl Wordlist {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, WordlistError> {
        let text = fs::read_to_string(path)
            .map_err(|source| WordlistError::Read { path: path.to_path_buf(), source })?;
        Ok(Self::parse(&text))
    }

    /// Like [`Wordlist::load`], but a missing or unreadable list only logs a
    /// warning and yields an empty list.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let result = match path {
            Some(path) => Self::load(path),
            None => Err(WordlistError::NotConfigured),
        };
        match result {
            Ok(list) => {
                tracing::debug!("loaded {} wordlist entries", list.len());
                list
            }
            Err(WordlistError::NotConfigured) => {
                tracing::debug!("no wordlist configured");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!("{e}");
                Self::empty()
            }
        }
    }

    pub fn parse(text: &str) -> Self {
        let words = text
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|word| word.chars().count() >= MIN_WORD_LEN)
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filters_short_entries_and_normalizes_case() {
        let list = Wordlist::parse("Audio\n  riff \nabc\n\nVIDEO\r\naudio\n");
        assert_eq!(list.len(), 3);
        assert!(list.contains("audio"));
        assert!(list.contains("RIFF"));
        assert!(list.contains("video"));
        assert!(!list.contains("abc"));
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let list = Wordlist::load_or_empty(Some(Path::new("/nonexistent/wax/words.txt")));
        assert!(list.is_empty());
        assert!(Wordlist::load_or_empty(None).is_empty());
    }
}
