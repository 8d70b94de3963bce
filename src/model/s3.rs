use crate::model::fs::FSObject;

/// One page of a prefix listing. `next_token` is `None` on the last page.
#[derive(Clone, Debug, Default)]
pub struct ListPage {
    pub objects: Vec<FSObject>,
    pub next_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// An open multipart session on `key`.
#[derive(Clone, Debug)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

impl MultipartUpload {
    pub fn new(key: &str, upload_id: String) -> Self {
        Self {
            key: key.to_string(),
            upload_id,
            parts: Vec::new(),
        }
    }

    pub fn next_part_number(&self) -> i32 {
        self.parts.len() as i32 + 1
    }
}
