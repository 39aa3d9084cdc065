use mms_core::error::MmsError;
use mms_core::host::{ContentAccess, ContentLocator};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Maps content locators onto filesystem paths, either plain paths or
/// `file://` URLs. Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsContent {
    root: Option<PathBuf>,
}

impl FsContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    pub fn path_for(&self, locator: &ContentLocator) -> PathBuf {
        let raw = locator.as_str();
        let path = Path::new(raw.strip_prefix(FILE_SCHEME).unwrap_or(raw));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ContentAccess for FsContent {
    fn read_pdu(&self, locator: &ContentLocator, max_size: usize) -> Result<Vec<u8>, MmsError> {
        let path = self.path_for(locator);
        let file = File::open(&path)
            .map_err(|err| MmsError::Io(format!("open {}: {err}", path.display())))?;
        let mut pdu = Vec::new();
        let limit = u64::try_from(max_size).unwrap_or(u64::MAX).saturating_add(1);
        file.take(limit)
            .read_to_end(&mut pdu)
            .map_err(|err| MmsError::Io(format!("read {}: {err}", path.display())))?;
        if pdu.len() > max_size {
            return Err(MmsError::Io(format!(
                "{} exceeds the {max_size} byte message limit",
                path.display()
            )));
        }
        Ok(pdu)
    }

    fn write_pdu(&self, locator: &ContentLocator, pdu: &[u8]) -> Result<(), MmsError> {
        let path = self.path_for(locator);
        fs::write(&path, pdu).map_err(|err| MmsError::Io(format!("write {}: {err}", path.display())))
    }

    fn revoke_access(&self, locator: &ContentLocator) {
        log::trace!("content: nothing to revoke for {locator}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_and_relative_paths_resolve_under_root() {
        let content = FsContent::rooted("/var/spool/mms");
        assert_eq!(
            content.path_for(&ContentLocator::new("file:///tmp/a.pdu")),
            PathBuf::from("/tmp/a.pdu")
        );
        assert_eq!(
            content.path_for(&ContentLocator::new("out/b.pdu")),
            PathBuf::from("/var/spool/mms/out/b.pdu")
        );
    }

    #[test]
    fn oversized_reads_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.pdu");
        fs::write(&path, vec![0u8; 64]).expect("write");
        let content = FsContent::new();
        let locator = ContentLocator::new(path.display().to_string());

        assert_eq!(content.read_pdu(&locator, 64).expect("fits").len(), 64);
        assert!(matches!(content.read_pdu(&locator, 63), Err(MmsError::Io(_))));
    }
}
