//! Loader configuration.

use sdna_schema::DEFAULT_MAX_TABLE_LEN;

use crate::header::DEFAULT_IDENTIFIER;

/// Options for [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Identifier the file header must carry.
    pub identifier: [u8; 7],
    /// Upper bound on the entries of any schema table.
    pub max_table_len: usize,
    /// Struct type names whose records are never patched.
    pub skip_types: Vec<String>,
    /// Accept a stream that ends without an end marker.
    pub tolerate_missing_end: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER,
            max_table_len: DEFAULT_MAX_TABLE_LEN,
            skip_types: Vec::new(),
            tolerate_missing_end: true,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifier(mut self, identifier: [u8; 7]) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_max_table_len(mut self, max_table_len: usize) -> Self {
        self.max_table_len = max_table_len;
        self
    }

    /// Skip records of the named struct type.
    pub fn skip_type(mut self, name: impl Into<String>) -> Self {
        self.skip_types.push(name.into());
        self
    }

    pub fn with_tolerate_missing_end(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_end = tolerate;
        self
    }
}
