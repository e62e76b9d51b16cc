//! Parser registry: pluggable journal readers.
//!
//! Readers (the text parser, the binary cache) register here and are tried
//! in order: `test` probes the stream, then `parse` reads it. A parser
//! returning 0 entries means "recognized but not usable" -- for a cache,
//! stale -- and the caller falls through to regeneration.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use crate::account::AccountIdx;
use crate::error::{Error, Result};
use crate::journal::Journal;

/// Stream bound for parser inputs: readable and rewindable.
pub trait JournalInput: Read + Seek {}

impl<T: Read + Seek> JournalInput for T {}

/// A journal reader that can recognize its own format.
pub trait JournalParser {
    /// Probe the stream. Must leave the stream rewound to position 0 when
    /// returning `false`; may leave it past the probed header when
    /// returning `true`.
    fn test(&self, input: &mut dyn JournalInput) -> io::Result<bool>;

    /// Read the stream into `journal`, continuing from wherever `test`
    /// left it. `master`, when given, is the account the parsed tree is
    /// grafted under. Returns the number of entries read; 0 means the
    /// input is recognized but unusable.
    fn parse(
        &self,
        input: &mut dyn JournalInput,
        journal: &mut Journal,
        master: Option<AccountIdx>,
        original_file: Option<&Path>,
    ) -> Result<usize>;
}

/// Ordered collection of parsers, tried in registration order.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn JournalParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: Box<dyn JournalParser>) {
        self.parsers.push(parser);
    }

    /// Parse `path` with the first parser whose `test` accepts it.
    pub fn parse_file(&self, path: &Path, journal: &mut Journal) -> Result<usize> {
        self.parse_file_with(path, journal, None, Some(path))
    }

    /// Parse `path`, grafting under `master` and naming the journal file
    /// the input stands in for.
    ///
    /// A cache file is parsed with `original_file` set to the journal file
    /// it claims to represent, not to the cache's own path.
    pub fn parse_file_with(
        &self,
        path: &Path,
        journal: &mut Journal,
        master: Option<AccountIdx>,
        original_file: Option<&Path>,
    ) -> Result<usize> {
        let mut input = BufReader::new(File::open(path)?);
        for parser in &self.parsers {
            if parser.test(&mut input)? {
                return parser.parse(&mut input, journal, master, original_file);
            }
        }
        Err(Error::UnrecognizedFormat(path.display().to_string()))
    }
}
