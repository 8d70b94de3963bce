use std::{
    future::Future,
    io::{self, Read},
    task::{Context, Poll},
    thread,
    time::{Duration, SystemTime},
};

use aws_sdk_s3::{
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
    types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier},
};
use bytes::{Buf, Bytes};
use futures::task::noop_waker_ref;
use tracing::debug;

use crate::{adapters, model};

// DeleteObjects accepts at most this many keys per request.
const MAX_DELETE_KEYS: usize = 1000;

const SEND_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an SDK future on the calling thread. The SDK's own runtime drives
/// the I/O, so this must be called from a blocking thread, never from an
/// async worker.
fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = Box::pin(future);
    let mut context = Context::from_waker(noop_waker_ref());

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => thread::sleep(SEND_POLL_INTERVAL),
        }
    }
}

fn send<T, E, F>(op: &str, at: &str, request: F) -> Result<T, model::fs::FSError>
where
    E: std::error::Error,
    F: Future<Output = Result<T, E>>,
{
    block_on(request).map_err(|err| remote_error(op, at, err))
}

fn remote_error<E: std::error::Error>(op: &str, at: &str, err: E) -> model::fs::FSError {
    model::fs::FSError::remote(format!(
        "failed to {} at: {}, {}",
        op,
        at,
        DisplayErrorContext(err)
    ))
}

fn to_system_time(last_modified: Option<&DateTime>) -> SystemTime {
    let secs = last_modified.map(|t| t.secs()).unwrap_or(0);
    let nanos = last_modified.map(|t| t.subsec_nanos()).unwrap_or(0);

    SystemTime::UNIX_EPOCH + Duration::new(secs.max(0) as u64, nanos)
}

/// Blocking `Read` over the body of a `GetObject` response.
struct ByteStreamReader {
    stream: ByteStream,
    chunk: Bytes,
}

impl Read for ByteStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while !self.chunk.has_remaining() {
            match block_on(self.stream.try_next()).map_err(io::Error::other)? {
                Some(chunk) => self.chunk = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.remaining());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);

        Ok(n)
    }
}

impl adapters::Object for aws_sdk_s3::Client {
    fn fs_list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<model::s3::ListPage, model::fs::FSError> {
        let req = self
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token);

        let lo = send("list_objects", prefix, req.send())?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| model::fs::FSObject {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0),
                modified_time: to_system_time(o.last_modified()),
            })
            .collect();

        Ok(model::s3::ListPage {
            objects,
            next_token: lo.next_continuation_token().map(|tok| tok.to_string()),
        })
    }

    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), model::fs::FSError> {
        let req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .set_content_type(content_type.map(|ct| ct.to_string()));

        send("put_object", key, req.send())?;

        Ok(())
    }

    fn fs_create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, model::fs::FSError> {
        let req = self
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type);

        let mu = send("create_multipart_upload", key, req.send())?;

        match mu.upload_id() {
            Some(id) => Ok(id.to_string()),
            None => Err(model::fs::FSError::remote(format!(
                "failed to create_multipart_upload at: {}, no upload id returned",
                key
            ))),
        }
    }

    fn fs_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: &[u8],
    ) -> Result<model::s3::CompletedPart, model::fs::FSError> {
        let req = self
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(body.len() as i64)
            .body(ByteStream::from(body.to_vec()));

        let up = send("upload_part", key, req.send())?;

        debug!(key = key, part_number = part_number, size = body.len(), "part uploaded");

        Ok(model::s3::CompletedPart {
            part_number,
            e_tag: up.e_tag().unwrap_or("").to_string(),
        })
    }

    fn fs_complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[model::s3::CompletedPart],
    ) -> Result<(), model::fs::FSError> {
        let parts = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.e_tag)
                    .build()
            })
            .collect();

        let req = self
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            );

        send("complete_multipart_upload", key, req.send())?;

        Ok(())
    }

    fn fs_abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), model::fs::FSError> {
        let req = self
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id);

        send("abort_multipart_upload", key, req.send())?;

        Ok(())
    }

    fn fs_get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn Read + Send>, model::fs::FSError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = send("get_object", key, req.send())?;

        Ok(Box::new(ByteStreamReader {
            stream: o.body,
            chunk: Bytes::new(),
        }))
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), model::fs::FSError> {
        for batch in keys.chunks(MAX_DELETE_KEYS) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|err| remote_error("delete_objects", key, err))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| remote_error("delete_objects", bucket, err))?;

            let req = self.delete_objects().bucket(bucket).delete(delete);

            let dout = send("delete_objects", bucket, req.send())?;

            if let Some(err) = dout.errors().first() {
                return Err(model::fs::FSError::remote(format!(
                    "failed to delete_objects at: {}, {}",
                    err.key().unwrap_or(""),
                    err.message().unwrap_or("unknown error")
                )));
            }

            debug!(bucket = bucket, count = batch.len(), "objects deleted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_system_time() {
        let cases = vec![
            (None, SystemTime::UNIX_EPOCH),
            (
                Some(DateTime::from_secs(10)),
                SystemTime::UNIX_EPOCH + Duration::from_secs(10),
            ),
            (
                Some(DateTime::from_secs_and_nanos(1, 500)),
                SystemTime::UNIX_EPOCH + Duration::new(1, 500),
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(
                to_system_time(input.as_ref()),
                expected,
                "failed for case: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_send() {
        let ok = send("put_object", "backups/f", async { Ok::<u8, io::Error>(1) });
        let err = send("put_object", "backups/f", async {
            Err::<u8, _>(io::Error::other("access denied"))
        });

        assert!(matches!(ok, Ok(1)));
        match err {
            Err(model::fs::FSError::Remote { message }) => {
                assert!(message.starts_with("failed to put_object at: backups/f, "));
                assert!(message.contains("access denied"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_block_on_pending_future() {
        let mut polled = false;
        let future = futures::future::poll_fn(move |_| {
            if polled {
                Poll::Ready("done")
            } else {
                polled = true;
                Poll::Pending
            }
        });

        assert_eq!(block_on(future), "done");
    }

    #[test]
    fn test_byte_stream_reader() {
        let mut reader = ByteStreamReader {
            stream: ByteStream::from(b"hello world".to_vec()),
            chunk: Bytes::new(),
        };

        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, b"hello world");
    }
}
