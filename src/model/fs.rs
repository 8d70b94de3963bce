use std::time::SystemTime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FSError {
    #[error("{message}")]
    Remote { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid part size: {0}")]
    InvalidPartSize(String),
}

impl FSError {
    pub fn remote(message: String) -> Self {
        FSError::Remote { message }
    }
}

/// One object as reported by a listing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FSObject {
    pub key: String,
    pub size: i64,
    pub modified_time: SystemTime,
}

/// A listed entry, either a real object or a directory derived from key prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileInfo {
    name: String,
    size: i64,
    mod_time: SystemTime,
    is_dir: bool,
}

impl FileInfo {
    pub fn file(name: String, size: i64, mod_time: SystemTime) -> Self {
        Self {
            name,
            size,
            mod_time,
            is_dir: false,
        }
    }

    /// Directory entries always have a zero size.
    pub fn directory(name: String, mod_time: SystemTime) -> Self {
        Self {
            name,
            size: 0,
            mod_time,
            is_dir: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn mod_time(&self) -> SystemTime {
        self.mod_time
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

impl From<FSObject> for FileInfo {
    fn from(object: FSObject) -> Self {
        FileInfo::file(object.key, object.size, object.modified_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_has_no_size() {
        let dir = FileInfo::directory("a/".to_string(), SystemTime::UNIX_EPOCH);

        assert!(dir.is_dir());
        assert_eq!(dir.size(), 0);
        assert_eq!(dir.name(), "a/");
    }

    #[test]
    fn test_from_object() {
        let object = FSObject {
            key: "a/b.txt".to_string(),
            size: 42,
            modified_time: SystemTime::UNIX_EPOCH,
        };

        let info = FileInfo::from(object);

        assert!(!info.is_dir());
        assert_eq!(info.size(), 42);
        assert_eq!(info.name(), "a/b.txt");
        assert_eq!(info.mod_time(), SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn test_error_display() {
        let cases = vec![
            (FSError::remote("failed to get_object at: k, boom".to_string()), "failed to get_object at: k, boom"),
            (FSError::InvalidLocation("ftp://x".to_string()), "invalid location: ftp://x"),
            (FSError::InvalidPartSize("0".to_string()), "invalid part size: 0"),
            (FSError::InvalidName("..".to_string()), "invalid name: .."),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected, "failed for case: {}", expected);
        }
    }
}
