use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
    time::SystemTime,
};

use tracing::{debug, info, warn};

use crate::{
    adapters,
    model::{
        fs::{FSError, FSObject, FileInfo},
        s3::MultipartUpload,
    },
    util::{content_type, object},
};

pub const DEFAULT_PART_SIZE: usize = 100 * 1024 * 1024;

/// Files stored as objects of `bucket`, rooted at `prefix`.
pub struct ObjectStorage {
    client: Box<dyn adapters::Object>,
    bucket: String,
    prefix: String,
    part_size: usize,
}

impl ObjectStorage {
    /// `prefix` is normalized once, so every operation shares the same root.
    pub fn new(client: Box<dyn adapters::Object>, bucket: &str, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: object::join_key(prefix, ""),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn with_part_size(
        client: Box<dyn adapters::Object>,
        bucket: &str,
        prefix: &str,
        part_size: usize,
    ) -> Result<Self, FSError> {
        if part_size == 0 {
            return Err(FSError::InvalidPartSize(
                "part size must be positive".to_string(),
            ));
        }

        Ok(Self {
            part_size,
            ..Self::new(client, bucket, prefix)
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    /// Key of `name` under the root. Names climbing above the root are rejected.
    pub fn key(&self, name: &str) -> Result<String, FSError> {
        match object::clean_name(name) {
            Some(name) => Ok(object::join_key(&self.prefix, &name)),
            None => Err(FSError::InvalidName(name.to_string())),
        }
    }

    /// Drains every listing page and keeps the keys at or below `path`.
    pub fn list_objects(&self, path: &str) -> Result<Vec<FSObject>, FSError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .fs_list_objects_page(&self.bucket, path, continuation_token)?;

            debug!(path = path, count = page.objects.len(), "listed page");

            objects.extend(
                page.objects
                    .into_iter()
                    .filter(|o| object::is_under(&o.key, path)),
            );

            continuation_token = page.next_token;
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(objects)
    }

    /// Objects and synthesized directories at or below `path`, newest name first.
    pub fn list_path(&self, path: &str) -> Result<Vec<FileInfo>, FSError> {
        Ok(index_objects(path, self.list_objects(path)?))
    }

    /// Removes every object at or below `path`. Returns how many keys were deleted.
    pub fn delete_path(&self, path: &str) -> Result<usize, FSError> {
        let keys: Vec<String> = self
            .list_objects(path)?
            .into_iter()
            .map(|o| o.key)
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }

        self.client.fs_delete_objects(&self.bucket, &keys)?;

        Ok(keys.len())
    }

    pub fn upload_stream(&self, key: &str, src: &mut dyn Read) -> Result<(), FSError> {
        let mut upload: Option<MultipartUpload> = None;

        let res = self.upload_chunks(key, src, &mut upload);
        if let (Err(err), Some(mu)) = (&res, &upload) {
            self.abort_upload(mu, err);
        }

        res
    }

    fn upload_chunks(
        &self,
        key: &str,
        src: &mut dyn Read,
        upload: &mut Option<MultipartUpload>,
    ) -> Result<(), FSError> {
        let mut buf = vec![0u8; self.part_size];

        loop {
            let n = read_chunk(src, &mut buf)?;
            let chunk = &buf[..n];

            // A short chunk means the source is exhausted.
            if n < self.part_size {
                return match upload.as_mut() {
                    None => self.put_single(key, chunk),
                    Some(mu) => self.complete_upload(mu, chunk),
                };
            }

            if upload.is_none() {
                *upload = Some(self.open_upload(key, chunk)?);
            }

            if let Some(mu) = upload.as_mut() {
                self.upload_part(mu, chunk)?;
            }
        }
    }

    fn put_single(&self, key: &str, body: &[u8]) -> Result<(), FSError> {
        let ct = content_type::detect(body);
        debug!(key = key, size = body.len(), content_type = ct, "single put");

        self.client
            .fs_put_object(&self.bucket, key, body, Some(ct))
    }

    /// The first chunk fixes the content type of the whole object.
    fn open_upload(&self, key: &str, first_chunk: &[u8]) -> Result<MultipartUpload, FSError> {
        let ct = content_type::detect(first_chunk);
        let upload_id = self
            .client
            .fs_create_multipart_upload(&self.bucket, key, ct)?;

        info!(key = key, upload_id = %upload_id, content_type = ct, "opened multipart upload");

        Ok(MultipartUpload::new(key, upload_id))
    }

    fn upload_part(&self, mu: &mut MultipartUpload, body: &[u8]) -> Result<(), FSError> {
        let part_number = mu.next_part_number();
        let part = self.client.fs_upload_part(
            &self.bucket,
            &mu.key,
            &mu.upload_id,
            part_number,
            body,
        )?;

        debug!(key = %mu.key, part_number = part_number, size = body.len(), "uploaded part");
        mu.parts.push(part);

        Ok(())
    }

    fn complete_upload(&self, mu: &mut MultipartUpload, last_chunk: &[u8]) -> Result<(), FSError> {
        self.upload_part(mu, last_chunk)?;

        self.client.fs_complete_multipart_upload(
            &self.bucket,
            &mu.key,
            &mu.upload_id,
            &mu.parts,
        )?;

        info!(key = %mu.key, parts = mu.parts.len(), "completed multipart upload");

        Ok(())
    }

    fn abort_upload(&self, mu: &MultipartUpload, cause: &FSError) {
        match self
            .client
            .fs_abort_multipart_upload(&self.bucket, &mu.key, &mu.upload_id)
        {
            Ok(()) => {
                info!(key = %mu.key, upload_id = %mu.upload_id, cause = %cause, "aborted multipart upload")
            }
            Err(err) => {
                warn!(error_message=%err, error_group="abort_multipart_upload", key = %mu.key, upload_id = %mu.upload_id)
            }
        }
    }

    pub fn download_stream(&self, key: &str, dst: &mut dyn Write) -> Result<(), FSError> {
        let mut body = self.client.fs_get_object(&self.bucket, key)?;
        let mut buf = vec![0u8; self.part_size];

        loop {
            let n = read_chunk(&mut *body, &mut buf)?;
            dst.write_all(&buf[..n])?;

            if n < self.part_size {
                break;
            }
        }

        dst.flush()?;

        Ok(())
    }
}

/// Fills `buf` from `src`, stopping early only at end of stream.
pub fn read_chunk(src: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(filled)
}

/// Adds one directory entry per distinct containing path, stamped with the
/// latest modification time among its objects. Keys ending in the separator
/// are folder markers and only contribute a directory. Keys without any
/// separator belong to `root`'s own entry.
pub fn index_objects(root: &str, objects: Vec<FSObject>) -> Vec<FileInfo> {
    let mut directories: BTreeMap<String, SystemTime> = BTreeMap::new();
    let mut entries = Vec::with_capacity(objects.len());

    for o in objects {
        let dir = match object::parent_dir(&o.key) {
            Some(dir) => dir.to_string(),
            None => object::root_dir(root),
        };
        directories
            .entry(dir)
            .and_modify(|t| *t = (*t).max(o.modified_time))
            .or_insert(o.modified_time);

        if !o.key.ends_with(object::SEPARATOR) {
            entries.push(FileInfo::from(o));
        }
    }

    entries.extend(
        directories
            .into_iter()
            .map(|(name, modified_time)| FileInfo::directory(name, modified_time)),
    );
    entries.sort_by(|a, b| b.name().cmp(a.name()));

    entries
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn obj(key: &str, size: i64, secs: u64) -> FSObject {
        FSObject {
            key: key.to_string(),
            size,
            modified_time: at(secs),
        }
    }

    struct Trickle<'a> {
        data: &'a [u8],
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[0];
            self.data = &self.data[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_read_chunk() {
        let cases = vec![
            ("empty", b"".as_slice(), 0),
            ("short", b"abc".as_slice(), 3),
            ("exact", b"abcd".as_slice(), 4),
            ("long", b"abcdefg".as_slice(), 4),
        ];

        for (name, data, expected) in cases {
            let mut buf = [0u8; 4];
            let n = read_chunk(&mut Trickle { data }, &mut buf).unwrap();
            assert_eq!(n, expected, "failed for case: {}", name);
            assert_eq!(&buf[..n], &data[..n], "failed for case: {}", name);
        }
    }

    #[test]
    fn test_index_objects_order() {
        let entries = index_objects("", vec![obj("a/b.txt", 3, 1), obj("a/c.txt", 4, 2)]);

        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a/c.txt", "a/b.txt", "a/"]);
    }

    #[test]
    fn test_index_objects_directory_mtime() {
        let cases = vec![
            vec![obj("a/old", 1, 1), obj("a/new", 1, 5)],
            vec![obj("a/new", 1, 5), obj("a/old", 1, 1)],
        ];

        for objects in cases {
            let entries = index_objects("", objects.clone());
            let dir = entries.iter().find(|e| e.is_dir()).unwrap();

            assert_eq!(dir.name(), "a/");
            assert_eq!(dir.mod_time(), at(5), "failed for case: {:?}", objects);
        }
    }

    #[test]
    fn test_index_objects_nested_and_root() {
        let entries = index_objects("", vec![
            obj("backups/x.tar", 10, 1),
            obj("backups/2024/y.tar", 20, 2),
            obj("top", 1, 3),
        ]);

        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "top",
                "backups/x.tar",
                "backups/2024/y.tar",
                "backups/2024/",
                "backups/",
                "./"
            ]
        );
        let root = entries.last().unwrap();
        assert!(root.is_dir());
        assert_eq!(root.mod_time(), at(3));
    }

    #[test]
    fn test_index_objects_folder_marker() {
        let entries = index_objects("", vec![obj("a/", 0, 1), obj("a/b", 2, 2)]);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "a/b");
        assert_eq!(entries[1].name(), "a/");
        assert!(entries[1].is_dir());
        assert_eq!(entries[1].mod_time(), at(2));
    }

    #[test]
    fn test_index_objects_key_equal_to_root() {
        let entries = index_objects("backups", vec![obj("backups", 1, 4), obj("backups/x", 1, 2)]);

        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["backups/x", "backups/", "backups"]);
        assert_eq!(entries[1].mod_time(), at(4));
    }

    #[test]
    fn test_prefix_is_normalized() {
        let cases = vec![
            ("./backups", "backups"),
            ("backups//daily/", "backups/daily"),
            ("", ""),
        ];

        for (prefix, expected) in cases {
            let storage =
                ObjectStorage::new(Box::new(adapters::mock::MockClient::new()), "bucket", prefix);
            assert_eq!(storage.prefix(), expected, "failed for case: {}", prefix);
        }
    }

    #[test]
    fn test_key_stays_under_root() {
        let storage =
            ObjectStorage::new(Box::new(adapters::mock::MockClient::new()), "bucket", "backups");

        let cases = vec![
            ("a/b.txt", Some("backups/a/b.txt")),
            ("./a//b", Some("backups/a/b")),
            ("a/..", Some("backups")),
            ("..", None),
            ("a/../..", None),
            ("../other-team/db.tar", None),
        ];

        for (name, expected) in cases {
            let res = storage.key(name);
            match expected {
                Some(key) => assert_eq!(res.unwrap(), key, "failed for case: {}", name),
                None => assert!(
                    matches!(res, Err(FSError::InvalidName(_))),
                    "failed for case: {}",
                    name
                ),
            }
        }
    }

    #[test]
    fn test_with_part_size() {
        let client = adapters::mock::MockClient::new();
        let res = ObjectStorage::with_part_size(Box::new(client), "bucket", "backups", 0);
        assert!(matches!(res, Err(FSError::InvalidPartSize(_))));

        let client = adapters::mock::MockClient::new();
        let storage = ObjectStorage::new(Box::new(client), "bucket", "backups");
        assert_eq!(storage.part_size(), DEFAULT_PART_SIZE);
        assert_eq!(storage.key("a/b.txt").unwrap(), "backups/a/b.txt");
    }
}
