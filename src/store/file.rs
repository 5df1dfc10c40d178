use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::record::{DomainName, TxtRecordSet};
use crate::store::{parse_record_set, RecordSource};

/// Reads a saved API response instead of calling the API. The same file
/// serves every domain.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSource for FileSource {
    fn fetch(&self, domain: &DomainName) -> Result<TxtRecordSet, StoreError> {
        log::debug!("Loading TXT records of {domain} from {}", self.path.display());
        let raw = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_record_set(&raw)
    }
}
