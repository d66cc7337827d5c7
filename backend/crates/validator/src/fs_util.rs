//! Atomic file writes for the data directory

use std::fs;
use std::io::Write;
use std::path::Path;

/// Write via a sibling temp file and rename, so readers never see a
/// partial file
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}
