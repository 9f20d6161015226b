//! Request and response bodies

pub mod agents;
pub mod conversations;

use domain_claims::StorageTarget;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where a stage should persist its claim draft
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StorageTargetDto {
    #[validate(length(min = 3, max = 63))]
    pub bucket: String,
    #[validate(length(min = 1, max = 1024))]
    pub key: Option<String>,
}

impl From<StorageTargetDto> for StorageTarget {
    fn from(dto: StorageTargetDto) -> Self {
        let target = StorageTarget::new(dto.bucket);
        match dto.key {
            Some(key) => target.with_key(key),
            None => target,
        }
    }
}
