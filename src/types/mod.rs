//! Data model types for the osapi client.
//!
//! Operation inputs are explicit option structs; each can be built from a
//! plain string, which fills its primary field.

/// Implement `From<&str>` and `From<String>` for an options struct by
/// filling one field and defaulting the rest.
macro_rules! shorthand {
    ($ty:ty, Some($field:ident)) => {
        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self {
                    $field: Some(value),
                    ..Default::default()
                }
            }
        }
    };
    ($ty:ty, $field:ident) => {
        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self {
                    $field: value,
                    ..Default::default()
                }
            }
        }
    };
}

pub(crate) use shorthand;

pub mod buckets;
pub mod metadata;
pub mod objects;

// Re-exports
pub use buckets::{BucketEntry, BucketInfo, BucketOptions, CreateBucketOptions, FindBucketsOptions};
pub use metadata::{BucketStats, ResponseMetadata};
pub use objects::{
    CreateObjectOptions, FindObjectsOptions, ListItem, MetaFlag, ObjectData, ObjectEntry,
    ObjectOptions, ObjectRef, SignedUrlOptions, DEFAULT_SIGNED_URL_TTL_SECS,
};
