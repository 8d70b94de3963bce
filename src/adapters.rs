use std::{io::Read, sync::Arc};

use crate::model;

pub mod mock;
pub mod s3;

/// Remote object store capability. Every call is a single attempt.
pub trait Object: Send + Sync {
    fn fs_list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<model::s3::ListPage, model::fs::FSError>;

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), model::fs::FSError>;

    /// Returns the upload id of the new session.
    fn fs_create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, model::fs::FSError>;

    fn fs_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: &[u8],
    ) -> Result<model::s3::CompletedPart, model::fs::FSError>;

    fn fs_complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[model::s3::CompletedPart],
    ) -> Result<(), model::fs::FSError>;

    fn fs_abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), model::fs::FSError>;

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, model::fs::FSError>;

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError>;
}

/// Lets several storages share one client.
impl<T: Object + ?Sized> Object for Arc<T> {
    fn fs_list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<model::s3::ListPage, model::fs::FSError> {
        (**self).fs_list_objects_page(bucket, prefix, continuation_token)
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), model::fs::FSError> {
        (**self).fs_put_object(bucket, key, body, content_type)
    }

    fn fs_create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, model::fs::FSError> {
        (**self).fs_create_multipart_upload(bucket, key, content_type)
    }

    fn fs_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: &[u8],
    ) -> Result<model::s3::CompletedPart, model::fs::FSError> {
        (**self).fs_upload_part(bucket, key, upload_id, part_number, body)
    }

    fn fs_complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[model::s3::CompletedPart],
    ) -> Result<(), model::fs::FSError> {
        (**self).fs_complete_multipart_upload(bucket, key, upload_id, parts)
    }

    fn fs_abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), model::fs::FSError> {
        (**self).fs_abort_multipart_upload(bucket, key, upload_id)
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, model::fs::FSError> {
        (**self).fs_get_object(bucket, key)
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        (**self).fs_delete_objects(bucket, keys)
    }
}
