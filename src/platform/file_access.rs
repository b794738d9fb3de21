use std::fs;

use rule_model::MediaRecord;
use tracing::trace;

use crate::collaborators::{AccessHandle, FileAccess};
use crate::error::ApplyError;

/// Plain filesystem access: the media location must exist and be a readable
/// regular file. Nothing needs releasing afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathAccess;

impl FileAccess for PathAccess {
    fn begin_access(&self, media: &MediaRecord) -> Result<AccessHandle, ApplyError> {
        let path = &media.location;
        let denied = |reason: String| ApplyError::AccessDenied {
            path: path.display().to_string(),
            reason,
        };
        let metadata = fs::metadata(path).map_err(|err| denied(err.to_string()))?;
        if !metadata.is_file() {
            return Err(denied("not a regular file".to_string()));
        }
        fs::File::open(path).map_err(|err| denied(err.to_string()))?;
        trace!(media = %media.id, path = %path.display(), "media file accessible");
        Ok(AccessHandle::unscoped(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule_model::MediaKind;

    #[test]
    fn existing_file_is_accessible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.jpg");
        fs::write(&path, b"jpeg").unwrap();
        let media = MediaRecord::new("forest", MediaKind::Image, &path);
        let handle = PathAccess.begin_access(&media).unwrap();
        assert_eq!(handle.path(), path.as_path());
    }

    #[test]
    fn missing_file_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaRecord::new("gone", MediaKind::Video, dir.path().join("gone.mp4"));
        let err = PathAccess.begin_access(&media).unwrap_err();
        assert_eq!(err.kind(), "access-denied");
    }

    #[test]
    fn directory_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaRecord::new("dir", MediaKind::Image, dir.path());
        assert!(PathAccess.begin_access(&media).is_err());
    }
}
