use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 when the server sends no Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds a model by name, downloading it into the cache as a last resort.
///
/// Lookup order: the user cache directory, then each of `search_dirs`.
pub fn resolve(
    name: &str,
    url: &str,
    search_dirs: &[PathBuf],
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, url, search_dirs, progress)
}

fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: &str,
    search_dirs: &[PathBuf],
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.is_file() {
        return Ok(cached_path);
    }
    if let Some(found) = locate(name, search_dirs) {
        return Ok(found);
    }

    log::info!("Downloading {name} from {url}");
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// First `dir/name` that exists as a regular file, in `search_dirs` order.
/// Never touches the network.
pub fn locate(name: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facewatch/models/`
/// - Linux: `$XDG_CACHE_HOME/Facewatch/models/` or `~/.cache/Facewatch/models/`
/// - Windows: `%LOCALAPPDATA%/Facewatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(cb) = progress.as_ref() {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE: &str = "http://invalid.nonexistent.example.com/model.bin";

    #[test]
    fn test_cached_model_wins() {
        let cache = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        fs::write(cache.path().join("face.bin"), b"cached").unwrap();
        fs::write(other.path().join("face.bin"), b"local").unwrap();

        let found = resolve_in(
            cache.path(),
            "face.bin",
            UNREACHABLE,
            &[other.path().to_path_buf()],
            None,
        )
        .unwrap();
        assert_eq!(found, cache.path().join("face.bin"));
    }

    #[test]
    fn test_search_dir_used_when_cache_is_empty() {
        let cache = TempDir::new().unwrap();
        let models = TempDir::new().unwrap();
        fs::write(models.path().join("face.bin"), b"local").unwrap();

        let found = resolve_in(
            cache.path(),
            "face.bin",
            UNREACHABLE,
            &[models.path().to_path_buf()],
            None,
        )
        .unwrap();
        assert_eq!(found, models.path().join("face.bin"));
    }

    #[test]
    fn test_missing_everywhere_fails_without_partial_file() {
        let cache = TempDir::new().unwrap();
        let err = resolve_in(cache.path(), "face.bin", UNREACHABLE, &[], None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Download { .. }));
        assert!(!cache.path().join("face.bin").exists());
        assert!(!cache.path().join("face.part").exists());
    }

    #[test]
    fn test_locate_respects_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("custom_model.bin"), b"b").unwrap();
        fs::write(first.path().join("custom_model.bin"), b"a").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            locate("custom_model.bin", &dirs),
            Some(first.path().join("custom_model.bin"))
        );
    }

    #[test]
    fn test_locate_skips_directories_and_missing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("custom_model.bin")).unwrap();
        let dirs = vec![dir.path().to_path_buf(), PathBuf::from("/nonexistent")];
        assert!(locate("custom_model.bin", &dirs).is_none());
    }

    #[test]
    fn test_model_cache_dir_is_app_specific() {
        let path = model_cache_dir().unwrap();
        assert!(path.ends_with(Path::new("Facewatch").join("models")));
    }

    #[test]
    fn test_download_invalid_url_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.bin");
        assert!(download(UNREACHABLE, &dest, None).is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
