use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` via a temp file in the same directory, fsync,
/// then rename over the target. Readers only ever see a complete file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}
