//! Text sources: loading documents and managing the imported-book library.
//!
//! A document is the whitespace-split token sequence of a UTF-8 text file,
//! immutable once loaded. The library is a flat directory the reader copies
//! imported files into.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// An ordered, immutable token sequence plus the book it came from.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub tokens: Vec<String>,
}

impl Document {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Load a document from a plain-text file.
pub fn load_document(path: &Path) -> Result<Document> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let tokens: Vec<String> = data.split_whitespace().map(str::to_string).collect();
    let title = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!(title = %title, tokens = tokens.len(), "Loaded document");
    Ok(Document { title, tokens })
}

/// Flat directory of imported books.
pub struct Library {
    books_dir: PathBuf,
}

impl Library {
    pub fn open(books_dir: &Path) -> Result<Self> {
        fs::create_dir_all(books_dir)
            .with_context(|| format!("Failed to create library dir {}", books_dir.display()))?;
        Ok(Self {
            books_dir: books_dir.to_path_buf(),
        })
    }

    /// Copy a file into the library and return the library path. Importing
    /// the same filename again overwrites the stored copy.
    pub fn import(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .with_context(|| format!("Source has no file name: {}", source.display()))?;
        let dest = self.books_dir.join(name);
        if dest != source {
            fs::copy(source, &dest)
                .with_context(|| format!("Failed to import {}", source.display()))?;
            info!(book = %dest.display(), "Imported book");
        }
        Ok(dest)
    }

    /// Titles of every imported book, sorted for stable listings.
    pub fn books(&self) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let entries = fs::read_dir(&self.books_dir)
            .with_context(|| format!("Failed to list {}", self.books_dir.display()))?;
        for entry in entries {
            let entry = entry.context("Failed to read library entry")?;
            if entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                titles.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        titles.sort();
        Ok(titles)
    }

    pub fn path_of(&self, title: &str) -> PathBuf {
        self.books_dir.join(title)
    }
}
