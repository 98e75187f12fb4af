//! Corpus loading: resolve work titles against the built-in catalog, fetch
//! the full text from a [`CorpusSource`], and split it into line-sized
//! [`Document`]s with corpus-wide unique ids.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A public-domain work the pipeline knows how to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Work {
    pub title: &'static str,
    pub gutenberg_id: u32,
}

/// Works resolvable by [`resolve_work`]. Title queries must match exactly one
/// entry, so the catalog deliberately contains more works than a single run
/// uses.
pub const CATALOG: &[Work] = &[
    Work {
        title: "The War of the Worlds",
        gutenberg_id: 36,
    },
    Work {
        title: "Pride and Prejudice",
        gutenberg_id: 1342,
    },
    Work {
        title: "The Time Machine",
        gutenberg_id: 35,
    },
    Work {
        title: "Sense and Sensibility",
        gutenberg_id: 161,
    },
    Work {
        title: "Emma",
        gutenberg_id: 158,
    },
    Work {
        title: "Moby Dick; Or, The Whale",
        gutenberg_id: 2701,
    },
];

#[derive(thiserror::Error, Debug)]
pub enum CorpusError {
    /// No catalog entry matches the requested title.
    #[error("no known work matches '{query}'")]
    UnknownWork { query: String },

    /// More than one catalog entry matches the requested title.
    #[error("'{query}' is ambiguous, matches: {}", matches.join(", "))]
    AmbiguousWork {
        query: String,
        matches: Vec<String>,
    },

    /// The source failed to produce the work's text.
    #[error("failed to fetch '{title}': {reason}")]
    Fetch { title: String, reason: String },

    /// The fetched text contained no non-blank lines.
    #[error("'{title}' resolved to an empty text")]
    EmptyWork { title: String },
}

/// Resolve a title query to exactly one catalog entry.
///
/// An exact (case-insensitive) title match wins outright; otherwise the query
/// is matched as a case-insensitive substring and must hit a single work.
pub fn resolve_work(query: &str) -> Result<&'static Work, CorpusError> {
    let needle = query.to_lowercase();

    if let Some(work) = CATALOG.iter().find(|w| w.title.to_lowercase() == needle) {
        return Ok(work);
    }

    let matches: Vec<&Work> = CATALOG
        .iter()
        .filter(|w| w.title.to_lowercase().contains(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(CorpusError::UnknownWork {
            query: query.to_string(),
        }),
        [work] => Ok(work),
        many => Err(CorpusError::AmbiguousWork {
            query: query.to_string(),
            matches: many.iter().map(|w| w.title.to_string()).collect(),
        }),
    }
}

/// Identifier assigned to each line of the combined corpus, unique across
/// both works and stable for identical input.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocumentId(pub u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One line of raw text from a source work. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub text: String,
}

/// External collaborator that turns a resolved [`Work`] into its full text.
pub trait CorpusSource {
    fn fetch_text(&self, work: &Work) -> Result<String, CorpusError>;
}

/// Fetches the plain-text edition from the Project Gutenberg cache.
pub struct GutenbergSource {
    base_url: String,
}

impl GutenbergSource {
    pub fn new() -> Self {
        Self {
            base_url: "https://www.gutenberg.org/cache/epub".to_string(),
        }
    }

    /// Point at a mirror instead of gutenberg.org.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for GutenbergSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusSource for GutenbergSource {
    fn fetch_text(&self, work: &Work) -> Result<String, CorpusError> {
        let url = format!(
            "{}/{id}/pg{id}.txt",
            self.base_url,
            id = work.gutenberg_id
        );
        info!(title = work.title, %url, "Fetching work");
        let fetch_err = |reason: String| CorpusError::Fetch {
            title: work.title.to_string(),
            reason,
        };
        ureq::get(&url)
            .call()
            .map_err(|e| fetch_err(e.to_string()))?
            .into_string()
            .map_err(|e| fetch_err(e.to_string()))
    }
}

/// Reads `{gutenberg_id}.txt` files from a local directory, for offline runs.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CorpusSource for DirSource {
    fn fetch_text(&self, work: &Work) -> Result<String, CorpusError> {
        let path = self.dir.join(format!("{}.txt", work.gutenberg_id));
        std::fs::read_to_string(&path).map_err(|e| CorpusError::Fetch {
            title: work.title.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// In-memory source keyed by Gutenberg id. Intended for tests and demos.
#[derive(Default)]
pub struct MemorySource {
    texts: ahash::HashMap<u32, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gutenberg_id: u32, text: impl Into<String>) {
        self.texts.insert(gutenberg_id, text.into());
    }
}

impl CorpusSource for MemorySource {
    fn fetch_text(&self, work: &Work) -> Result<String, CorpusError> {
        self.texts
            .get(&work.gutenberg_id)
            .cloned()
            .ok_or_else(|| CorpusError::Fetch {
                title: work.title.to_string(),
                reason: "not present in memory source".to_string(),
            })
    }
}

/// Strip the Project Gutenberg license boilerplate, keeping only the text
/// between the `*** START OF ...` and `*** END OF ...` marker lines. Texts
/// without markers pass through untouched.
fn strip_boilerplate(text: &str) -> &str {
    let body = match text.find("*** START OF") {
        Some(pos) => match text[pos..].find('\n') {
            Some(nl) => &text[pos + nl + 1..],
            None => return text,
        },
        None => text,
    };
    match body.find("*** END OF") {
        Some(pos) => {
            let end = body[..pos].rfind('\n').map_or(0, |nl| nl);
            &body[..end]
        }
        None => body,
    }
}

/// Fetch every requested work and explode it into per-line [`Document`]s.
///
/// Ids are assigned sequentially over the whole combined corpus in request
/// order, so re-running on identical input yields identical ids. Blank lines
/// are skipped; a work that is blank end to end is an error.
pub fn load_corpus<S: CorpusSource>(
    queries: &[impl AsRef<str>],
    source: &S,
) -> Result<Vec<Document>, CorpusError> {
    let mut documents = Vec::new();
    let mut next_id = 0u32;

    for query in queries {
        let work = resolve_work(query.as_ref())?;
        let raw = source.fetch_text(work)?;
        let body = strip_boilerplate(&raw);

        let before = documents.len();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            documents.push(Document {
                id: DocumentId(next_id),
                title: work.title.to_string(),
                text: line.to_string(),
            });
            next_id += 1;
        }

        let lines = documents.len() - before;
        if lines == 0 {
            warn!(title = work.title, "Fetched text contained no lines");
            return Err(CorpusError::EmptyWork {
                title: work.title.to_string(),
            });
        }
        debug!(title = work.title, lines, "Work loaded");
    }

    info!(documents = documents.len(), "Corpus loaded");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_novel_source() -> MemorySource {
        let mut source = MemorySource::new();
        source.insert(36, "The chances against anything manlike on Mars\nNo one would have believed\n");
        source.insert(1342, "It is a truth universally acknowledged\nthat a single man in possession\n");
        source
    }

    #[test]
    fn resolves_unique_substring() {
        let work = resolve_work("war of the worlds").unwrap();
        assert_eq!(work.gutenberg_id, 36);
    }

    #[test]
    fn resolves_exact_title_even_when_substring_would_be_ambiguous() {
        // "Emma" is a substring-unique title here, but exact matching must
        // win regardless of what else the catalog grows.
        let work = resolve_work("Emma").unwrap();
        assert_eq!(work.gutenberg_id, 158);
    }

    #[test]
    fn unknown_title_fails() {
        assert!(matches!(
            resolve_work("Finnegans Wake"),
            Err(CorpusError::UnknownWork { .. })
        ));
    }

    #[test]
    fn ambiguous_title_fails_with_candidates() {
        match resolve_work("the") {
            Err(CorpusError::AmbiguousWork { matches, .. }) => {
                assert!(matches.len() > 1);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn document_ids_are_unique_and_stable() {
        let source = two_novel_source();
        let titles = ["The War of the Worlds", "Pride and Prejudice"];

        let first = load_corpus(&titles, &source).unwrap();
        let second = load_corpus(&titles, &source).unwrap();

        let mut seen = ahash::HashSet::default();
        for doc in &first {
            assert!(seen.insert(doc.id), "duplicate id {}", doc.id);
        }
        let ids = |docs: &[Document]| docs.iter().map(|d| d.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn ids_run_across_works_not_per_work() {
        let source = two_novel_source();
        let docs =
            load_corpus(&["The War of the Worlds", "Pride and Prejudice"], &source).unwrap();
        assert_eq!(docs[0].id, DocumentId(0));
        assert_eq!(docs[2].id, DocumentId(2));
        assert_eq!(docs[2].title, "Pride and Prejudice");
    }

    #[test]
    fn empty_work_is_an_error() {
        let mut source = MemorySource::new();
        source.insert(36, "\n  \n");
        assert!(matches!(
            load_corpus(&["The War of the Worlds"], &source),
            Err(CorpusError::EmptyWork { .. })
        ));
    }

    #[test]
    fn boilerplate_is_stripped() {
        let text = "The Project Gutenberg eBook\nlegal preamble\n\
                    *** START OF THE PROJECT GUTENBERG EBOOK ***\n\
                    the actual first line\n\
                    *** END OF THE PROJECT GUTENBERG EBOOK ***\n\
                    license text\n";
        let mut source = MemorySource::new();
        source.insert(36, text);
        let docs = load_corpus(&["The War of the Worlds"], &source).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "the actual first line");
    }

    #[test]
    fn text_without_markers_passes_through() {
        assert_eq!(strip_boilerplate("plain\ntext"), "plain\ntext");
    }

    #[test]
    fn dir_source_reads_by_gutenberg_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("36.txt"), "a line\n").unwrap();
        let source = DirSource::new(dir.path());
        let docs = load_corpus(&["The War of the Worlds"], &source).unwrap();
        assert_eq!(docs[0].text, "a line");
    }
}
