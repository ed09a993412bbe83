/*!
Amazon S3 asset storage adapter.

Alternate cloud backend for worlds whose asset library lives in an S3
bucket rather than on the local filesystem. Selected through
[`StorageConfig`](crate::config::StorageConfig) environment detection.
*/

use std::sync::Arc;

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::{AssetStorage, BrowseOptions, BrowseResult};
use crate::error::{CaravanError, Result};

/// S3-backed asset storage.
///
/// Uses the standard AWS credential provider chain (environment variables,
/// credentials file, instance roles). Object keys mirror the forward-slash
/// paths the pipelines use everywhere else; "directories" are purely
/// notional, so `create_directory` is a no-op.
#[derive(Debug)]
pub struct S3AssetStorage {
    client: S3Client,
    bucket: String,
    runtime: Arc<Runtime>,
}

impl S3AssetStorage {
    /// Create a new adapter for the specified bucket.
    pub fn new(bucket: String) -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| {
            CaravanError::storage(format!("Failed to create async runtime for S3 client: {e}"))
        })?;

        let sdk_config = runtime.block_on(async {
            aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await
        });

        if sdk_config.credentials_provider().is_none() {
            return Err(CaravanError::storage(
                "AWS credentials not found. Set AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and AWS_REGION",
            ));
        }

        let client = S3Client::new(&sdk_config);
        info!(bucket = %bucket, "Initialized S3 asset storage");

        Ok(S3AssetStorage {
            client,
            bucket,
            runtime: Arc::new(runtime),
        })
    }

    /// The bucket name this adapter writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let result = self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(ByteStream::from(data.to_vec()))
                .send()
                .await
        });

        match result {
            Ok(_) => {
                debug!(bucket = %self.bucket, key = %key, size = data.len(), "Uploaded asset to S3");
                Ok(())
            }
            Err(e) => Err(map_s3_error("put_object", e, key)),
        }
    }
}

impl AssetStorage for S3AssetStorage {
    fn browse(&self, target: &str, options: &BrowseOptions) -> Result<BrowseResult> {
        let prefix = format!("{}/", target.trim_end_matches('/'));
        let mut result = BrowseResult::default();
        let mut continuation: Option<String> = None;

        loop {
            let request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(continuation.take());

            let output = self
                .runtime
                .block_on(async { request.send().await })
                .map_err(|e| map_s3_error("list_objects_v2", e, target))?;

            for object in output.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.trim_start_matches(&prefix);
                if name.is_empty() {
                    continue;
                }
                if !options.extensions.is_empty()
                    && !options.extensions.iter().any(|ext| name.ends_with(ext))
                {
                    continue;
                }
                result.files.push(key.to_string());
            }
            for common in output.common_prefixes() {
                if let Some(dir) = common.prefix() {
                    result.dirs.push(dir.trim_end_matches('/').to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        result.files.sort();
        result.dirs.sort();
        Ok(result)
    }

    fn create_directory(&self, _path: &str) -> Result<()> {
        // Object stores have no directories; keys imply the hierarchy.
        Ok(())
    }

    fn upload_file(&self, dir: &str, filename: &str, data: &[u8]) -> Result<()> {
        let key = format!("{}/{}", dir.trim_end_matches('/'), filename);
        caravan_retry::with_custom_backoff(
            "s3_upload",
            caravan_retry::cloud_storage_backoff_policy(),
            || self.put_object(&key, data),
        )
    }

    fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        let output = self
            .runtime
            .block_on(async {
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(path)
                    .send()
                    .await
            })
            .map_err(|e| {
                let mapped = map_s3_error("get_object", e, path);
                // Reads feed the export degrade path, which keys off this variant.
                CaravanError::asset_unavailable(path, mapped.to_string())
            })?;

        let bytes = self
            .runtime
            .block_on(async { output.body.collect().await })
            .map_err(|e| CaravanError::storage(format!("Failed to read S3 object stream: {e}")))?;

        Ok(bytes.into_bytes().to_vec())
    }

    fn exists(&self, path: &str) -> bool {
        self.runtime
            .block_on(async {
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(path)
                    .send()
                    .await
            })
            .is_ok()
    }
}

/// Map AWS SDK errors to the core taxonomy.
fn map_s3_error<E: ProvideErrorMetadata + std::fmt::Debug>(
    op: &str,
    error: aws_sdk_s3::error::SdkError<E>,
    key: &str,
) -> CaravanError {
    use aws_sdk_s3::error::SdkError;

    match &error {
        SdkError::TimeoutError(_) => {
            CaravanError::storage(format!("S3 {op} request timed out (key: {key})"))
        }
        SdkError::DispatchFailure(dispatch_err) => {
            CaravanError::storage(format!("S3 {op} request failed to dispatch: {dispatch_err:?}"))
        }
        SdkError::ServiceError(service_err) => match service_err.err().code() {
            Some("EntityTooLarge") => CaravanError::UploadTooLarge {
                path: key.to_string(),
            },
            Some("AccessDenied") | Some("Forbidden") => CaravanError::UploadRejected {
                path: key.to_string(),
                reason: "access denied (check credentials and permissions)".to_string(),
            },
            Some("NoSuchKey") => {
                CaravanError::storage(format!("S3 object '{key}' not found"))
            }
            Some(code) => CaravanError::storage(format!(
                "S3 service error ({code}): {}",
                service_err.err().message().unwrap_or("unknown error")
            )),
            None => CaravanError::storage(format!("S3 {op} service error: {service_err:?}")),
        },
        _ => CaravanError::storage(format!("S3 {op} error: {error}")),
    }
}
