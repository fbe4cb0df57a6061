//! On-demand download of recognition model files into the user cache.

use crate::error::ExtractError;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "lab-report-extract";

/// Cache directory for engine assets, created on demand
pub fn cache_dir(subdir: &str) -> Result<PathBuf, ExtractError> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
        .join(subdir);

    std::fs::create_dir_all(&dir).map_err(|e| {
        ExtractError::InitializationError(format!(
            "Failed to create cache directory {}: {e}",
            dir.display()
        ))
    })?;
    Ok(dir)
}

/// Path of `filename` inside `dir`, downloading it from `url` first if absent
pub fn ensure_file(dir: &Path, filename: &str, url: &str) -> Result<PathBuf, ExtractError> {
    let path = dir.join(filename);
    if path.exists() {
        tracing::debug!(path = %path.display(), "Using cached model file");
        return Ok(path);
    }

    tracing::info!(filename, url, "Downloading model file (first run only)");
    download(url, &path)?;
    tracing::info!(path = %path.display(), "Model file downloaded");
    Ok(path)
}

/// Download to a temporary sibling and rename, so an interrupted download
/// never leaves a truncated model behind
fn download(url: &str, path: &Path) -> Result<(), ExtractError> {
    let response = ureq::get(url).call().map_err(|e| {
        ExtractError::InitializationError(format!("Failed to download {url}: {e}"))
    })?;
    let body = response.into_body().read_to_vec().map_err(|e| {
        ExtractError::InitializationError(format!("Failed to read download body: {e}"))
    })?;

    let partial = path.with_extension("part");
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&partial)?;
        file.write_all(&body)?;
        file.sync_all()?;
        std::fs::rename(&partial, path)
    };
    write().map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        ExtractError::InitializationError(format!("Failed to store {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_file_is_not_downloaded() {
        let dir = std::env::temp_dir()
            .join(format!("lab-report-extract-models-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.rten"), b"cached").unwrap();

        // An unroutable URL proves no request is made
        let path = ensure_file(&dir, "model.rten", "http://127.0.0.1:9/never").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"cached");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
