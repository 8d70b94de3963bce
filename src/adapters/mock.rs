use std::{
    collections::{BTreeMap, HashMap},
    io::{Cursor, Read},
    sync::{Mutex, MutexGuard},
    time::{Duration, SystemTime},
};

use crate::{adapters, model};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug)]
struct MockEntry {
    body: Vec<u8>,
    content_type: Option<String>,
    modified_time: SystemTime,
}

#[derive(Debug)]
struct MockUpload {
    key: String,
    content_type: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

/// In-memory object store. A single namespace is shared by every bucket name.
pub struct MockClient {
    page_size: usize,
    clock: Mutex<u64>,
    next_upload: Mutex<u64>,
    objects: Mutex<BTreeMap<String, MockEntry>>,
    uploads: Mutex<HashMap<String, MockUpload>>,
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, model::fs::FSError> {
    mutex
        .lock()
        .map_err(|err| model::fs::FSError::remote(format!("failed to acquire guard: {}", err)))
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            clock: Mutex::new(0),
            next_upload: Mutex::new(0),
            objects: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    /// Stores an object directly, bypassing the call log.
    pub fn insert(&self, key: &str, body: &[u8], modified_time: SystemTime) {
        self.objects
            .lock()
            .expect("failed to acquire `objects` guard")
            .insert(
                key.to_string(),
                MockEntry {
                    body: body.to_vec(),
                    content_type: None,
                    modified_time,
                },
            );
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("failed to acquire `objects` guard")
            .get(key)
            .map(|e| e.body.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .expect("failed to acquire `objects` guard")
            .get(key)
            .and_then(|e| e.content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("failed to acquire `objects` guard")
            .keys()
            .cloned()
            .collect()
    }

    /// Calls made so far, formatted as `op key [detail]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("failed to acquire `calls` guard")
            .clone()
    }

    pub fn open_uploads(&self) -> usize {
        self.uploads
            .lock()
            .expect("failed to acquire `uploads` guard")
            .len()
    }

    /// Makes every later call of `op` fail.
    pub fn fail_on(&self, op: &str) {
        *self.fail_on.lock().expect("failed to acquire `fail_on` guard") = Some(op.to_string());
    }

    fn record(&self, op: &str, at: &str, detail: String) -> Result<(), model::fs::FSError> {
        let call = if detail.is_empty() {
            format!("{} {}", op, at)
        } else {
            format!("{} {} {}", op, at, detail)
        };
        guard(&self.calls)?.push(call);

        if guard(&self.fail_on)?.as_deref() == Some(op) {
            return Err(model::fs::FSError::remote(format!(
                "failed to {} at: {}, injected failure",
                op, at
            )));
        }

        Ok(())
    }

    fn tick(&self) -> Result<SystemTime, model::fs::FSError> {
        let mut clock = guard(&self.clock)?;
        *clock += 1;

        Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(*clock))
    }

    fn store(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), model::fs::FSError> {
        let modified_time = self.tick()?;
        guard(&self.objects)?.insert(
            key.to_string(),
            MockEntry {
                body,
                content_type,
                modified_time,
            },
        );

        Ok(())
    }
}

impl adapters::Object for MockClient {
    fn fs_list_objects_page(
        &self,
        _bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<model::s3::ListPage, model::fs::FSError> {
        self.record(
            "list_objects",
            prefix,
            continuation_token.clone().unwrap_or_default(),
        )?;

        let objects = guard(&self.objects)?;
        let mut matched = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| match &continuation_token {
                Some(tok) => key.as_str() > tok.as_str(),
                None => true,
            });

        let page: Vec<model::fs::FSObject> = matched
            .by_ref()
            .take(self.page_size)
            .map(|(key, e)| model::fs::FSObject {
                key: key.clone(),
                size: e.body.len() as i64,
                modified_time: e.modified_time,
            })
            .collect();

        let next_token = match matched.next() {
            Some(_) => page.last().map(|o| o.key.clone()),
            None => None,
        };

        Ok(model::s3::ListPage {
            objects: page,
            next_token,
        })
    }

    fn fs_put_object(
        &self,
        _bucket: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), model::fs::FSError> {
        self.record("put_object", key, body.len().to_string())?;
        self.store(key, body.to_vec(), content_type.map(|ct| ct.to_string()))
    }

    fn fs_create_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, model::fs::FSError> {
        self.record("create_multipart_upload", key, content_type.to_string())?;

        let upload_id = {
            let mut next_upload = guard(&self.next_upload)?;
            *next_upload += 1;
            format!("upload-{}", *next_upload)
        };
        guard(&self.uploads)?.insert(
            upload_id.clone(),
            MockUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );

        Ok(upload_id)
    }

    fn fs_upload_part(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: &[u8],
    ) -> Result<model::s3::CompletedPart, model::fs::FSError> {
        self.record("upload_part", key, format!("{} {}", part_number, body.len()))?;

        let mut uploads = guard(&self.uploads)?;
        let upload = match uploads.get_mut(upload_id) {
            Some(upload) if upload.key == key => upload,
            _ => {
                return Err(model::fs::FSError::remote(format!(
                    "failed to upload_part at: {}, NoSuchUpload",
                    key
                )))
            }
        };
        upload.parts.insert(part_number, body.to_vec());

        Ok(model::s3::CompletedPart {
            part_number,
            e_tag: format!("etag-{}-{}", upload_id, part_number),
        })
    }

    fn fs_complete_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[model::s3::CompletedPart],
    ) -> Result<(), model::fs::FSError> {
        self.record("complete_multipart_upload", key, parts.len().to_string())?;

        let upload = match guard(&self.uploads)?.remove(upload_id) {
            Some(upload) => upload,
            None => {
                return Err(model::fs::FSError::remote(format!(
                    "failed to complete_multipart_upload at: {}, NoSuchUpload",
                    key
                )))
            }
        };

        let mut body = Vec::new();
        let mut previous = 0;
        for part in parts {
            let expected_tag = format!("etag-{}-{}", upload_id, part.part_number);
            let data = match upload.parts.get(&part.part_number) {
                Some(data) if part.part_number > previous && part.e_tag == expected_tag => data,
                _ => {
                    return Err(model::fs::FSError::remote(format!(
                        "failed to complete_multipart_upload at: {}, InvalidPart {}",
                        key, part.part_number
                    )))
                }
            };
            body.extend_from_slice(data);
            previous = part.part_number;
        }

        self.store(key, body, Some(upload.content_type))
    }

    fn fs_abort_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), model::fs::FSError> {
        self.record("abort_multipart_upload", key, String::new())?;
        guard(&self.uploads)?.remove(upload_id);

        Ok(())
    }

    fn fs_get_object(
        &self,
        _bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, model::fs::FSError> {
        self.record("get_object", key, String::new())?;

        match guard(&self.objects)?.get(key) {
            Some(e) => Ok(Box::new(Cursor::new(e.body.clone()))),
            None => Err(model::fs::FSError::remote(format!(
                "failed to get_object at: {}, NoSuchKey",
                key
            ))),
        }
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        self.record("delete_objects", bucket, keys.join(","))?;

        let mut objects = guard(&self.objects)?;
        for key in keys {
            objects.remove(key);
        }

        Ok(())
    }
}
