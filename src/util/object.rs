use crate::model::fs::FSError;

pub const SEPARATOR: char = '/';

/// S3 rejects multipart parts below this size, except for the last one.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Joins key segments the way a path join would: empty and `.` segments are
/// dropped and `..` removes the previous segment.
pub fn join_key(prefix: &str, name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in prefix.split(SEPARATOR).chain(name.split(SEPARATOR)) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let key = segments.join("/");
    if prefix.starts_with(SEPARATOR) {
        format!("/{}", key)
    } else {
        key
    }
}

/// Normalizes a name relative to a root. Returns `None` when `..` would
/// climb above the root.
pub fn clean_name(name: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }

    Some(segments.join("/"))
}

/// Directory entry standing for `root` itself.
pub fn root_dir(root: &str) -> String {
    if root.is_empty() {
        "./".to_string()
    } else if root.ends_with(SEPARATOR) {
        root.to_string()
    } else {
        format!("{}/", root)
    }
}

/// Containing directory of `key`, with a trailing separator.
/// A key ending in the separator is its own directory.
pub fn parent_dir(key: &str) -> Option<&str> {
    key.rfind(SEPARATOR).map(|pos| &key[..=pos])
}

/// Whether `key` is `path` itself or nested below it.
pub fn is_under(key: &str, path: &str) -> bool {
    if path.is_empty() {
        return true;
    }

    match key.strip_prefix(path) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR) || path.ends_with(SEPARATOR),
        None => false,
    }
}

/// Splits `s3://bucket/prefix` into bucket and prefix.
pub fn parse_location(uri: &str) -> Result<(&str, &str), FSError> {
    let rest = match uri.strip_prefix("s3://") {
        Some(rest) => rest,
        None => return Err(FSError::InvalidLocation(uri.to_string())),
    };

    let (bucket, prefix) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(FSError::InvalidLocation(uri.to_string()));
    }

    Ok((bucket, prefix.trim_end_matches(SEPARATOR)))
}

pub fn parse_part_size(value: &str) -> Result<usize, FSError> {
    let size = value
        .parse::<usize>()
        .map_err(|err| FSError::InvalidPartSize(format!("{}: {}", value, err)))?;

    if size < MIN_PART_SIZE {
        return Err(FSError::InvalidPartSize(format!(
            "{} is below the minimum of {}",
            size, MIN_PART_SIZE
        )));
    }

    Ok(size)
}
