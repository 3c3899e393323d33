//!
//! src/sink.rs
//!
//! Archives fetched chart pages as zstd compressed html so a chart can be
//! re-extracted later without hitting the site again
//!

use std::{fs, io::Write, path::{Path, PathBuf}};

use crate::errors::CrawlerError;

pub struct RawPageSink {
    root: PathBuf,
    level: i32
}

impl RawPageSink {
    pub fn new(root: impl AsRef<Path>, level: i32) -> Self {
        Self { root: root.as_ref().to_path_buf(), level: level.clamp(0, 21)}
    }

    pub fn write_page(&self, key: &str, html: &str) -> Result<PathBuf, CrawlerError> {
        let path = self.root.join(Self::rel_path(&Self::sanitize_key(key)));
        let parent = path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent).map_err(|e|
            CrawlerError::Io(std::io::Error::new(
                e.kind(), format!("create dir {}: {e}", parent.display())
            )))?;

        let temp = tempfile::NamedTempFile::new_in(&parent)?;

        {
            let mut enc = zstd::stream::write::Encoder::new(temp.as_file(), self.level)?;
            enc.write_all(html.as_bytes())?;
            enc.finish()?;
        }

        temp.persist(&path).map_err(|e|
            CrawlerError::Io(std::io::Error::new(
                e.error.kind(), format!("persist {}: {}", path.display(), e.error)
            )))?;

        Ok(path)
    }

    /// Reads an archived page back
    #[cfg(test)]
    pub fn read_page(&self, key: &str) -> Result<String, CrawlerError> {
        let path = self.root.join(Self::rel_path(&Self::sanitize_key(key)));
        let bytes = zstd::stream::decode_all(fs::File::open(&path)?)?;
        String::from_utf8(bytes)
            .map_err(|e| CrawlerError::Parse(format!("archived page {}: {e}", path.display())))
    }

    fn rel_path(sanitized_key: &str) -> PathBuf {
        PathBuf::from("charts").join(format!("{sanitized_key}.html.zst"))
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_round_trips_through_archive() -> Result<(), CrawlerError> {
        let dir = tempfile::tempdir()?;
        let sink = RawPageSink::new(dir.path(), 3);

        let page = "<html><body><div class=\"TableRow\">row</div></body></html>";
        let path = sink.write_page("Weekend Picks 2026 Week 2", page)?;

        assert_eq!(
            path,
            dir.path().join("charts").join("Weekend_Picks_2026_Week_2.html.zst")
        );
        assert_eq!(sink.read_page("Weekend Picks 2026 Week 2")?, page);
        Ok(())
    }

    #[test]
    fn keys_cannot_escape_the_root() {
        assert_eq!(RawPageSink::sanitize_key("../../etc/passwd"), "______etc_passwd");
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(RawPageSink::new("x", 99).level, 21);
        assert_eq!(RawPageSink::new("x", -4).level, 0);
    }
}
