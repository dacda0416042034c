//! The `s3s::S3` trait implementation for [`ShardGateway`].
//!
//! Bridges the HTTP layer to the handlers in [`crate::ops`]. Operations the
//! gateway does not support — multipart upload, versioning, tagging, ACL
//! writes, policies, object-lock, copy — answer with the S3
//! `NotImplemented` error, stubbed explicitly so the unsupported surface is
//! visible in one place.
//!
//! # Object safety
//!
//! The [`s3s::S3`] trait uses `#[async_trait]` because it must be
//! object-safe for dynamic dispatch. We follow the same pattern here.

// The s3s DTO module contains dozens of types we reference; wildcard is clearer.
#[allow(clippy::wildcard_imports)]
use s3s::dto::*;
use s3s::{S3, S3Request, S3Response, S3Result};
use tracing::debug;

use crate::error::GatewayError;
use crate::provider::ShardGateway;

macro_rules! not_implemented {
    ($op:literal) => {{
        debug!(concat!($op, " is not implemented"));
        return Err(GatewayError::NotImplemented.into_s3_error());
    }};
}

#[async_trait::async_trait]
impl S3 for ShardGateway {
    // -----------------------------------------------------------------------
    // Bucket operations
    // -----------------------------------------------------------------------

    async fn list_buckets(
        &self,
        req: S3Request<ListBucketsInput>,
    ) -> S3Result<S3Response<ListBucketsOutput>> {
        self.handle_list_buckets(req.input).await.map(S3Response::new)
    }

    async fn create_bucket(
        &self,
        req: S3Request<CreateBucketInput>,
    ) -> S3Result<S3Response<CreateBucketOutput>> {
        self.handle_create_bucket(req.input).await.map(S3Response::new)
    }

    async fn delete_bucket(
        &self,
        req: S3Request<DeleteBucketInput>,
    ) -> S3Result<S3Response<DeleteBucketOutput>> {
        self.handle_delete_bucket(req.input).await.map(S3Response::new)
    }

    async fn head_bucket(
        &self,
        req: S3Request<HeadBucketInput>,
    ) -> S3Result<S3Response<HeadBucketOutput>> {
        self.handle_head_bucket(req.input).await.map(S3Response::new)
    }

    async fn get_bucket_acl(
        &self,
        req: S3Request<GetBucketAclInput>,
    ) -> S3Result<S3Response<GetBucketAclOutput>> {
        self.handle_get_bucket_acl(req.input).await.map(S3Response::new)
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    async fn put_object(
        &self,
        req: S3Request<PutObjectInput>,
    ) -> S3Result<S3Response<PutObjectOutput>> {
        self.handle_put_object(req.input).await.map(S3Response::new)
    }

    async fn get_object(
        &self,
        req: S3Request<GetObjectInput>,
    ) -> S3Result<S3Response<GetObjectOutput>> {
        self.handle_get_object(req.input).await.map(S3Response::new)
    }

    async fn head_object(
        &self,
        req: S3Request<HeadObjectInput>,
    ) -> S3Result<S3Response<HeadObjectOutput>> {
        self.handle_head_object(req.input).await.map(S3Response::new)
    }

    async fn delete_object(
        &self,
        req: S3Request<DeleteObjectInput>,
    ) -> S3Result<S3Response<DeleteObjectOutput>> {
        self.handle_delete_object(req.input).await.map(S3Response::new)
    }

    async fn delete_objects(
        &self,
        req: S3Request<DeleteObjectsInput>,
    ) -> S3Result<S3Response<DeleteObjectsOutput>> {
        self.handle_delete_objects(req.input).await.map(S3Response::new)
    }

    async fn list_objects(
        &self,
        req: S3Request<ListObjectsInput>,
    ) -> S3Result<S3Response<ListObjectsOutput>> {
        self.handle_list_objects(req.input).await.map(S3Response::new)
    }

    async fn list_objects_v2(
        &self,
        req: S3Request<ListObjectsV2Input>,
    ) -> S3Result<S3Response<ListObjectsV2Output>> {
        self.handle_list_objects_v2(req.input).await.map(S3Response::new)
    }

    // -----------------------------------------------------------------------
    // Unsupported operations
    // -----------------------------------------------------------------------

    async fn copy_object(
        &self,
        _req: S3Request<CopyObjectInput>,
    ) -> S3Result<S3Response<CopyObjectOutput>> {
        not_implemented!("copy_object")
    }

    async fn get_object_acl(
        &self,
        _req: S3Request<GetObjectAclInput>,
    ) -> S3Result<S3Response<GetObjectAclOutput>> {
        not_implemented!("get_object_acl")
    }

    async fn put_object_acl(
        &self,
        _req: S3Request<PutObjectAclInput>,
    ) -> S3Result<S3Response<PutObjectAclOutput>> {
        not_implemented!("put_object_acl")
    }

    async fn put_bucket_acl(
        &self,
        _req: S3Request<PutBucketAclInput>,
    ) -> S3Result<S3Response<PutBucketAclOutput>> {
        not_implemented!("put_bucket_acl")
    }

    async fn get_object_tagging(
        &self,
        _req: S3Request<GetObjectTaggingInput>,
    ) -> S3Result<S3Response<GetObjectTaggingOutput>> {
        not_implemented!("get_object_tagging")
    }

    async fn put_object_tagging(
        &self,
        _req: S3Request<PutObjectTaggingInput>,
    ) -> S3Result<S3Response<PutObjectTaggingOutput>> {
        not_implemented!("put_object_tagging")
    }

    async fn delete_object_tagging(
        &self,
        _req: S3Request<DeleteObjectTaggingInput>,
    ) -> S3Result<S3Response<DeleteObjectTaggingOutput>> {
        not_implemented!("delete_object_tagging")
    }

    async fn get_bucket_tagging(
        &self,
        _req: S3Request<GetBucketTaggingInput>,
    ) -> S3Result<S3Response<GetBucketTaggingOutput>> {
        not_implemented!("get_bucket_tagging")
    }

    async fn put_bucket_tagging(
        &self,
        _req: S3Request<PutBucketTaggingInput>,
    ) -> S3Result<S3Response<PutBucketTaggingOutput>> {
        not_implemented!("put_bucket_tagging")
    }

    async fn delete_bucket_tagging(
        &self,
        _req: S3Request<DeleteBucketTaggingInput>,
    ) -> S3Result<S3Response<DeleteBucketTaggingOutput>> {
        not_implemented!("delete_bucket_tagging")
    }

    async fn get_bucket_policy(
        &self,
        _req: S3Request<GetBucketPolicyInput>,
    ) -> S3Result<S3Response<GetBucketPolicyOutput>> {
        not_implemented!("get_bucket_policy")
    }

    async fn put_bucket_policy(
        &self,
        _req: S3Request<PutBucketPolicyInput>,
    ) -> S3Result<S3Response<PutBucketPolicyOutput>> {
        not_implemented!("put_bucket_policy")
    }

    async fn delete_bucket_policy(
        &self,
        _req: S3Request<DeleteBucketPolicyInput>,
    ) -> S3Result<S3Response<DeleteBucketPolicyOutput>> {
        not_implemented!("delete_bucket_policy")
    }

    async fn get_bucket_versioning(
        &self,
        _req: S3Request<GetBucketVersioningInput>,
    ) -> S3Result<S3Response<GetBucketVersioningOutput>> {
        not_implemented!("get_bucket_versioning")
    }

    async fn put_bucket_versioning(
        &self,
        _req: S3Request<PutBucketVersioningInput>,
    ) -> S3Result<S3Response<PutBucketVersioningOutput>> {
        not_implemented!("put_bucket_versioning")
    }

    async fn list_object_versions(
        &self,
        _req: S3Request<ListObjectVersionsInput>,
    ) -> S3Result<S3Response<ListObjectVersionsOutput>> {
        not_implemented!("list_object_versions")
    }

    async fn get_object_attributes(
        &self,
        _req: S3Request<GetObjectAttributesInput>,
    ) -> S3Result<S3Response<GetObjectAttributesOutput>> {
        not_implemented!("get_object_attributes")
    }

    async fn restore_object(
        &self,
        _req: S3Request<RestoreObjectInput>,
    ) -> S3Result<S3Response<RestoreObjectOutput>> {
        not_implemented!("restore_object")
    }

    async fn create_multipart_upload(
        &self,
        _req: S3Request<CreateMultipartUploadInput>,
    ) -> S3Result<S3Response<CreateMultipartUploadOutput>> {
        not_implemented!("create_multipart_upload")
    }

    async fn upload_part(
        &self,
        _req: S3Request<UploadPartInput>,
    ) -> S3Result<S3Response<UploadPartOutput>> {
        not_implemented!("upload_part")
    }

    async fn upload_part_copy(
        &self,
        _req: S3Request<UploadPartCopyInput>,
    ) -> S3Result<S3Response<UploadPartCopyOutput>> {
        not_implemented!("upload_part_copy")
    }

    async fn complete_multipart_upload(
        &self,
        _req: S3Request<CompleteMultipartUploadInput>,
    ) -> S3Result<S3Response<CompleteMultipartUploadOutput>> {
        not_implemented!("complete_multipart_upload")
    }

    async fn abort_multipart_upload(
        &self,
        _req: S3Request<AbortMultipartUploadInput>,
    ) -> S3Result<S3Response<AbortMultipartUploadOutput>> {
        not_implemented!("abort_multipart_upload")
    }

    async fn list_multipart_uploads(
        &self,
        _req: S3Request<ListMultipartUploadsInput>,
    ) -> S3Result<S3Response<ListMultipartUploadsOutput>> {
        not_implemented!("list_multipart_uploads")
    }

    async fn list_parts(
        &self,
        _req: S3Request<ListPartsInput>,
    ) -> S3Result<S3Response<ListPartsOutput>> {
        not_implemented!("list_parts")
    }

    async fn get_object_retention(
        &self,
        _req: S3Request<GetObjectRetentionInput>,
    ) -> S3Result<S3Response<GetObjectRetentionOutput>> {
        not_implemented!("get_object_retention")
    }

    async fn put_object_retention(
        &self,
        _req: S3Request<PutObjectRetentionInput>,
    ) -> S3Result<S3Response<PutObjectRetentionOutput>> {
        not_implemented!("put_object_retention")
    }

    async fn get_object_legal_hold(
        &self,
        _req: S3Request<GetObjectLegalHoldInput>,
    ) -> S3Result<S3Response<GetObjectLegalHoldOutput>> {
        not_implemented!("get_object_legal_hold")
    }

    async fn put_object_legal_hold(
        &self,
        _req: S3Request<PutObjectLegalHoldInput>,
    ) -> S3Result<S3Response<PutObjectLegalHoldOutput>> {
        not_implemented!("put_object_legal_hold")
    }

    async fn get_object_lock_configuration(
        &self,
        _req: S3Request<GetObjectLockConfigurationInput>,
    ) -> S3Result<S3Response<GetObjectLockConfigurationOutput>> {
        not_implemented!("get_object_lock_configuration")
    }

    async fn put_object_lock_configuration(
        &self,
        _req: S3Request<PutObjectLockConfigurationInput>,
    ) -> S3Result<S3Response<PutObjectLockConfigurationOutput>> {
        not_implemented!("put_object_lock_configuration")
    }
}
