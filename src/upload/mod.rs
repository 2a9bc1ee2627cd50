//! Artifact upload.
//!
//! A full deploy pushes child templates, the code package and static assets
//! into the artifact bucket before the stack is touched.

mod artifacts;
mod store;
mod task;
mod uploader;

pub use artifacts::{
    code_task, discover_assets, discover_templates, ArtifactSet, CODE_SEGMENT, PUBLIC_SEGMENT,
    TEMPLATES_SEGMENT,
};
pub use store::{ObjectStore, S3ObjectStore};
pub use task::{object_key, ObjectAcl, UploadTask};
pub use uploader::{ArtifactUploader, PhaseTimings, UploadReport, DEFAULT_BATCH_SIZE};
