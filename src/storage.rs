use std::io::{Read, Write};

use tracing::{error, info, span, Level};

use crate::{
    fs,
    model::fs::{FSError, FileInfo},
};

/// Named files kept in a backing store.
///
/// Names are relative to the storage root. Every call is a single attempt and
/// returns the backing store's error unchanged.
pub trait Storage: Send + Sync {
    /// Every entry at or below the root, synthesized directories included,
    /// sorted by name in descending order.
    fn list(&self) -> Result<Vec<FileInfo>, FSError>;

    /// Removes `name` and everything nested below it. Deleting a name that
    /// matches nothing succeeds.
    fn delete(&self, name: &str) -> Result<(), FSError>;

    fn upload(&self, name: &str, src: &mut dyn Read) -> Result<(), FSError>;

    fn download(&self, name: &str, dst: &mut dyn Write) -> Result<(), FSError>;
}

impl Storage for fs::ObjectStorage {
    fn list(&self) -> Result<Vec<FileInfo>, FSError> {
        let span = span!(Level::INFO, "list", context = "list");
        let _e = span.enter();
        info!(bucket = self.bucket(), prefix = self.prefix(), "called");

        let entries = match self.list_path(self.prefix()) {
            Err(err) => {
                error!(error_message=%err, error_group="list_objects");
                return Err(err);
            }
            Ok(entries) => entries,
        };

        info!(count = entries.len(), "listed");

        Ok(entries)
    }

    fn delete(&self, name: &str) -> Result<(), FSError> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();

        let path = match self.key(name) {
            Err(err) => {
                error!(error_message=%err, error_group="invalid_name");
                return Err(err);
            }
            Ok(path) => path,
        };
        info!(bucket = self.bucket(), path = %path, "called");

        match self.delete_path(&path) {
            Err(err) => {
                error!(error_message=%err, error_group="delete_objects");
                Err(err)
            }
            Ok(count) => {
                info!(count = count, "deleted");
                Ok(())
            }
        }
    }

    fn upload(&self, name: &str, src: &mut dyn Read) -> Result<(), FSError> {
        let span = span!(Level::INFO, "upload", context = "upload");
        let _e = span.enter();

        let key = match self.key(name) {
            Err(err) => {
                error!(error_message=%err, error_group="invalid_name");
                return Err(err);
            }
            Ok(key) => key,
        };
        info!(bucket = self.bucket(), key = %key, part_size = self.part_size(), "called");

        if let Err(err) = self.upload_stream(&key, src) {
            error!(error_message=%err, error_group="upload");
            return Err(err);
        }

        Ok(())
    }

    fn download(&self, name: &str, dst: &mut dyn Write) -> Result<(), FSError> {
        let span = span!(Level::INFO, "download", context = "download");
        let _e = span.enter();

        let key = match self.key(name) {
            Err(err) => {
                error!(error_message=%err, error_group="invalid_name");
                return Err(err);
            }
            Ok(key) => key,
        };
        info!(bucket = self.bucket(), key = %key, "called");

        if let Err(err) = self.download_stream(&key, dst) {
            error!(error_message=%err, error_group="download");
            return Err(err);
        }

        Ok(())
    }
}
