//! Library store: where ingested books, their chapters, folders and reading
//! progress live.
//!
//! Ingestion never persists anything itself; the caller hands a
//! [`ParsedBook`] to a [`LibraryStore`]. [`MemoryLibrary`] is the in-process
//! implementation used by the CLI and the tests.

use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;

use crate::document::{slugify, Book, Chapter, Folder, ReadingProgress, TocChapter};
use crate::error::LibraryError;
use crate::ingest::ParsedBook;

// ---------------------------------------------------------------------------
// Listing options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// Title, case-insensitive ascending.
    Name,
    /// Newest first.
    AddedAt,
    /// Most recently read first; never-read books last.
    #[default]
    LastReadAt,
    /// Highest progress first.
    Progress,
}

impl std::str::FromStr for SortBy {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "addedAt" | "added" => Ok(Self::AddedAt),
            "lastReadAt" | "last-read" => Ok(Self::LastReadAt),
            "progress" => Ok(Self::Progress),
            other => Err(LibraryError::Invalid(format!("unknown sort order {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FolderFilter {
    #[default]
    All,
    /// Books without a folder.
    Unfiled,
    Folder(String),
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Persistence contract for the reader. Chapters and TOC groups belong to
/// their book and go away with it.
pub trait LibraryStore {
    /// Store a freshly ingested book. Fails if the id is already taken or
    /// the target folder does not exist.
    fn save_parsed(&mut self, parsed: ParsedBook) -> Result<(), LibraryError>;

    fn book(&self, id: &str) -> Result<Book, LibraryError>;

    fn list_books(&self, filter: &FolderFilter, sort: SortBy) -> Vec<Book>;

    /// Remove a book with its chapters, TOC groups and progress.
    fn delete_book(&mut self, id: &str) -> Result<(), LibraryError>;

    fn chapters(&self, book_id: &str) -> Result<Vec<Chapter>, LibraryError>;

    fn chapter_at(&self, book_id: &str, index: usize) -> Result<Chapter, LibraryError>;

    fn toc_chapters(&self, book_id: &str) -> Result<Vec<TocChapter>, LibraryError>;

    fn folders(&self) -> Vec<Folder>;

    /// Create a folder. Names are trimmed and unique case-insensitively.
    fn create_folder(&mut self, name: &str, created_at: i64) -> Result<Folder, LibraryError>;

    fn rename_folder(&mut self, id: &str, name: &str) -> Result<Folder, LibraryError>;

    /// Delete a folder; its books become unfiled.
    fn delete_folder(&mut self, id: &str) -> Result<(), LibraryError>;

    /// Move a book into a folder, or out of any folder with `None`.
    fn move_book(&mut self, book_id: &str, folder_id: Option<&str>) -> Result<(), LibraryError>;

    /// Record a reading position and mirror it onto the book.
    fn save_progress(&mut self, progress: ReadingProgress) -> Result<(), LibraryError>;

    fn progress(&self, book_id: &str) -> Option<ReadingProgress>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

struct StoredBook {
    book: Book,
    chapters: Vec<Chapter>,
    toc_chapters: Vec<TocChapter>,
}

#[derive(Default)]
pub struct MemoryLibrary {
    books: IndexMap<String, StoredBook>,
    folders: IndexMap<String, Folder>,
    progress: HashMap<String, ReadingProgress>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    fn stored(&self, id: &str) -> Result<&StoredBook, LibraryError> {
        self.books
            .get(id)
            .ok_or_else(|| LibraryError::NotFound(format!("book {id}")))
    }

    fn check_folder(&self, folder_id: Option<&str>) -> Result<(), LibraryError> {
        match folder_id {
            Some(id) if !self.folders.contains_key(id) => {
                Err(LibraryError::NotFound(format!("folder {id}")))
            }
            _ => Ok(()),
        }
    }

    fn check_folder_name(&self, name: &str, except: Option<&str>) -> Result<String, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::Invalid("folder name cannot be empty".into()));
        }
        let lower = name.to_lowercase();
        let taken = self
            .folders
            .values()
            .any(|f| Some(f.id.as_str()) != except && f.name.to_lowercase() == lower);
        if taken {
            return Err(LibraryError::DuplicateFolder(name.to_string()));
        }
        Ok(name.to_string())
    }
}

fn compare_books(a: &Book, b: &Book, sort: SortBy) -> Ordering {
    match sort {
        SortBy::Name => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortBy::AddedAt => b.added_at.cmp(&a.added_at),
        SortBy::LastReadAt => b.last_read_at.unwrap_or(0).cmp(&a.last_read_at.unwrap_or(0)),
        SortBy::Progress => b.progress.total_cmp(&a.progress),
    }
}

impl LibraryStore for MemoryLibrary {
    fn save_parsed(&mut self, parsed: ParsedBook) -> Result<(), LibraryError> {
        let ParsedBook {
            book,
            chapters,
            toc_chapters,
        } = parsed;
        if self.books.contains_key(&book.id) {
            return Err(LibraryError::DuplicateId(book.id));
        }
        self.check_folder(book.folder_id.as_deref())?;

        tracing::debug!("Saving book {} ({} chapters)", book.id, chapters.len());
        self.books.insert(
            book.id.clone(),
            StoredBook {
                book,
                chapters,
                toc_chapters,
            },
        );
        Ok(())
    }

    fn book(&self, id: &str) -> Result<Book, LibraryError> {
        Ok(self.stored(id)?.book.clone())
    }

    fn list_books(&self, filter: &FolderFilter, sort: SortBy) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .values()
            .map(|s| &s.book)
            .filter(|b| match filter {
                FolderFilter::All => true,
                FolderFilter::Unfiled => b.folder_id.is_none(),
                FolderFilter::Folder(id) => b.folder_id.as_deref() == Some(id.as_str()),
            })
            .cloned()
            .collect();
        books.sort_by(|a, b| compare_books(a, b, sort));
        books
    }

    fn delete_book(&mut self, id: &str) -> Result<(), LibraryError> {
        self.books
            .shift_remove(id)
            .ok_or_else(|| LibraryError::NotFound(format!("book {id}")))?;
        self.progress.remove(id);
        tracing::debug!("Deleted book {}", id);
        Ok(())
    }

    fn chapters(&self, book_id: &str) -> Result<Vec<Chapter>, LibraryError> {
        Ok(self.stored(book_id)?.chapters.clone())
    }

    fn chapter_at(&self, book_id: &str, index: usize) -> Result<Chapter, LibraryError> {
        self.stored(book_id)?
            .chapters
            .iter()
            .find(|c| c.index == index)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(format!("chapter {index} of {book_id}")))
    }

    fn toc_chapters(&self, book_id: &str) -> Result<Vec<TocChapter>, LibraryError> {
        Ok(self.stored(book_id)?.toc_chapters.clone())
    }

    fn folders(&self) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self.folders.values().cloned().collect();
        folders.sort_by_key(|f| f.sort_order);
        folders
    }

    fn create_folder(&mut self, name: &str, created_at: i64) -> Result<Folder, LibraryError> {
        let name = self.check_folder_name(name, None)?;
        let slug = slugify(&name);

        let base_id = format!("folder-{created_at}");
        let mut id = base_id.clone();
        let mut n = 1;
        while self.folders.contains_key(&id) {
            id = format!("{base_id}-{n}");
            n += 1;
        }

        let sort_order = self
            .folders
            .values()
            .map(|f| f.sort_order + 1)
            .max()
            .unwrap_or(0);
        let folder = Folder {
            id: id.clone(),
            name,
            slug,
            created_at,
            sort_order,
        };
        self.folders.insert(id, folder.clone());
        Ok(folder)
    }

    fn rename_folder(&mut self, id: &str, name: &str) -> Result<Folder, LibraryError> {
        let name = self.check_folder_name(name, Some(id))?;
        let folder = self
            .folders
            .get_mut(id)
            .ok_or_else(|| LibraryError::NotFound(format!("folder {id}")))?;
        folder.slug = slugify(&name);
        folder.name = name;
        Ok(folder.clone())
    }

    fn delete_folder(&mut self, id: &str) -> Result<(), LibraryError> {
        self.folders
            .shift_remove(id)
            .ok_or_else(|| LibraryError::NotFound(format!("folder {id}")))?;
        for stored in self.books.values_mut() {
            if stored.book.folder_id.as_deref() == Some(id) {
                stored.book.folder_id = None;
            }
        }
        Ok(())
    }

    fn move_book(&mut self, book_id: &str, folder_id: Option<&str>) -> Result<(), LibraryError> {
        self.check_folder(folder_id)?;
        let stored = self
            .books
            .get_mut(book_id)
            .ok_or_else(|| LibraryError::NotFound(format!("book {book_id}")))?;
        stored.book.folder_id = folder_id.map(str::to_string);
        Ok(())
    }

    fn save_progress(&mut self, progress: ReadingProgress) -> Result<(), LibraryError> {
        let stored = self
            .books
            .get_mut(&progress.book_id)
            .ok_or_else(|| LibraryError::NotFound(format!("book {}", progress.book_id)))?;
        if progress.chapter_index >= stored.chapters.len() {
            return Err(LibraryError::Invalid(format!(
                "chapter {} out of range for {}",
                progress.chapter_index, progress.book_id
            )));
        }
        stored.book.current_chapter = progress.chapter_index;
        stored.book.progress = progress.percentage;
        stored.book.last_read_at = Some(progress.last_read_at);
        self.progress.insert(progress.book_id.clone(), progress);
        Ok(())
    }

    fn progress(&self, book_id: &str) -> Option<ReadingProgress> {
        self.progress.get(book_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parsed(id: &str, title: &str, added_at: i64, chapters: usize) -> ParsedBook {
        let chapters = (0..chapters)
            .map(|i| Chapter {
                id: format!("{id}-chapter-{i}"),
                book_id: id.into(),
                index: i,
                title: format!("Chapter {}", i + 1),
                content: "<p>x</p>".into(),
                href: format!("ch{i}.xhtml"),
                toc_chapter_id: None,
            })
            .collect::<Vec<_>>();
        ParsedBook {
            book: Book {
                id: id.into(),
                title: title.into(),
                author: "A".into(),
                cover: None,
                language: None,
                publisher: None,
                description: None,
                added_at,
                last_read_at: None,
                total_chapters: chapters.len(),
                current_chapter: 0,
                progress: 0.0,
                folder_id: None,
            },
            chapters,
            toc_chapters: Vec::new(),
        }
    }

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn save_get_and_duplicate_id() {
        let mut lib = MemoryLibrary::new();
        lib.save_parsed(parsed("a-1", "Alpha", 1, 2)).unwrap();
        assert_eq!(lib.book("a-1").unwrap().title, "Alpha");
        assert!(matches!(
            lib.save_parsed(parsed("a-1", "Again", 2, 1)),
            Err(LibraryError::DuplicateId(_))
        ));
        assert_eq!(lib.chapter_at("a-1", 1).unwrap().id, "a-1-chapter-1");
        assert!(matches!(lib.chapter_at("a-1", 5), Err(LibraryError::NotFound(_))));
    }

    #[test]
    fn list_sorting() {
        let mut lib = MemoryLibrary::new();
        lib.save_parsed(parsed("b", "beta", 2, 1)).unwrap();
        lib.save_parsed(parsed("a", "Alpha", 1, 1)).unwrap();
        lib.save_parsed(parsed("c", "Gamma", 3, 4)).unwrap();
        lib.save_progress(ReadingProgress::new("c", 1, 0.0, 4, 50)).unwrap();
        lib.save_progress(ReadingProgress::new("a", 0, 50.0, 1, 10)).unwrap();

        assert_eq!(titles(&lib.list_books(&FolderFilter::All, SortBy::Name)), vec!["Alpha", "beta", "Gamma"]);
        assert_eq!(titles(&lib.list_books(&FolderFilter::All, SortBy::AddedAt)), vec!["Gamma", "beta", "Alpha"]);
        assert_eq!(titles(&lib.list_books(&FolderFilter::All, SortBy::LastReadAt)), vec!["Gamma", "Alpha", "beta"]);
        assert_eq!(titles(&lib.list_books(&FolderFilter::All, SortBy::Progress)), vec!["Alpha", "Gamma", "beta"]);
    }

    #[test]
    fn delete_cascades() {
        let mut lib = MemoryLibrary::new();
        lib.save_parsed(parsed("a", "Alpha", 1, 3)).unwrap();
        lib.save_progress(ReadingProgress::new("a", 2, 0.0, 3, 5)).unwrap();
        lib.delete_book("a").unwrap();
        assert!(lib.is_empty());
        assert!(lib.chapters("a").is_err());
        assert!(lib.progress("a").is_none());
        assert!(matches!(lib.delete_book("a"), Err(LibraryError::NotFound(_))));
    }

    #[test]
    fn folders_unique_and_unfile_on_delete() {
        let mut lib = MemoryLibrary::new();
        let fantasy = lib.create_folder(" Fantasy ", 100).unwrap();
        assert_eq!(fantasy.name, "Fantasy");
        assert_eq!(fantasy.slug, "fantasy");
        assert!(matches!(
            lib.create_folder("FANTASY", 101),
            Err(LibraryError::DuplicateFolder(_))
        ));
        assert!(matches!(lib.create_folder("  ", 102), Err(LibraryError::Invalid(_))));
        let scifi = lib.create_folder("Sci-Fi", 100).unwrap();
        assert_ne!(scifi.id, fantasy.id);
        assert_eq!(scifi.sort_order, 1);

        lib.save_parsed(parsed("a", "Alpha", 1, 1)).unwrap();
        lib.save_parsed(parsed("b", "Beta", 2, 1)).unwrap();
        lib.move_book("a", Some(&fantasy.id)).unwrap();
        assert!(lib.move_book("b", Some("nope")).is_err());

        let in_folder = lib.list_books(&FolderFilter::Folder(fantasy.id.clone()), SortBy::Name);
        assert_eq!(titles(&in_folder), vec!["Alpha"]);
        assert_eq!(titles(&lib.list_books(&FolderFilter::Unfiled, SortBy::Name)), vec!["Beta"]);

        lib.rename_folder(&fantasy.id, "fantasy").unwrap();
        assert!(lib.rename_folder(&fantasy.id, "sci-fi").is_err());

        lib.delete_folder(&fantasy.id).unwrap();
        assert_eq!(lib.book("a").unwrap().folder_id, None);
        assert_eq!(lib.folders().len(), 1);
    }

    #[test]
    fn progress_is_mirrored_on_the_book() {
        let mut lib = MemoryLibrary::new();
        lib.save_parsed(parsed("a", "Alpha", 1, 4)).unwrap();
        lib.save_progress(ReadingProgress::new("a", 1, 50.0, 4, 77)).unwrap();
        let book = lib.book("a").unwrap();
        assert_eq!(book.current_chapter, 1);
        assert_eq!(book.progress, 37.5);
        assert_eq!(book.last_read_at, Some(77));
        assert_eq!(lib.progress("a").unwrap().chapter_id, "a-chapter-1");
        assert!(lib.save_progress(ReadingProgress::new("a", 9, 0.0, 4, 1)).is_err());
    }
}
