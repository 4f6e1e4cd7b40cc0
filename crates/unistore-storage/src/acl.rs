//! Translation between [`Visibility`] and the canned ACL / grant vocabulary of
//! S3-compatible object stores.

use crate::traits::{StorageError, StorageResult};
use crate::Visibility;

/// Grantee URI of the anonymous "everyone" group
pub const ALL_USERS_GROUP_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";

/// Canned ACL applied when writing an object or its ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
}

impl CannedAcl {
    /// Wire value of the `x-amz-acl` header
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
        }
    }
}

/// One entry of an object's access control list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Group URI for group grantees, `None` for canonical users
    pub grantee_uri: Option<String>,
    /// Permission name as returned by the store, e.g. `READ` or `FULL_CONTROL`
    pub permission: String,
}

impl Grant {
    pub fn all_users(permission: &str) -> Self {
        Self {
            grantee_uri: Some(ALL_USERS_GROUP_URI.to_string()),
            permission: permission.to_string(),
        }
    }

    pub fn owner(permission: &str) -> Self {
        Self {
            grantee_uri: None,
            permission: permission.to_string(),
        }
    }
}

pub fn to_canned_acl(visibility: Visibility) -> CannedAcl {
    match visibility {
        Visibility::Private => CannedAcl::Private,
        Visibility::PublicRead => CannedAcl::PublicRead,
        Visibility::PublicReadWrite => CannedAcl::PublicReadWrite,
    }
}

/// Derive the visibility from the grants given to the anonymous group.
///
/// No anonymous grant means private. Anonymous write access without read
/// access matches no visibility and is rejected.
pub fn visibility_from_grants(grants: &[Grant]) -> StorageResult<Visibility> {
    let mut has_read = false;
    let mut has_write = false;

    for grant in grants
        .iter()
        .filter(|g| g.grantee_uri.as_deref() == Some(ALL_USERS_GROUP_URI))
    {
        match grant.permission.as_str() {
            "READ" => has_read = true,
            "WRITE" => has_write = true,
            "FULL_CONTROL" => {
                has_read = true;
                has_write = true;
            }
            _ => {}
        }
    }

    match (has_read, has_write) {
        (true, true) => Ok(Visibility::PublicReadWrite),
        (true, false) => Ok(Visibility::PublicRead),
        (false, false) => Ok(Visibility::Private),
        (false, true) => Err(StorageError::InvalidVisibility(
            "anonymous WRITE grant without READ does not map to a visibility".to_string(),
        )),
    }
}
