use std::path::{Path, PathBuf};

use crate::config::PlayerConfig;

const TRANSCODER_ENV: &str = "JUKEBOX_FFMPEG";
const EXTRACTOR_ENV: &str = "JUKEBOX_YTDLP";

/// Helper binaries the resolver shells out to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
    /// yt-dlp executable
    pub extractor: Option<PathBuf>,
    /// Directory holding ffmpeg, passed as `--ffmpeg-location`
    pub transcoder_dir: Option<PathBuf>,
}

impl ToolPaths {
    pub fn discover(config: &PlayerConfig) -> Self {
        let tools = Self {
            extractor: locate_extractor(config.extractor_path.as_deref()),
            transcoder_dir: locate_transcoder(config.transcoder_path.as_deref()),
        };

        match &tools.extractor {
            Some(path) => log::info!("Using yt-dlp at {}", path.display()),
            None => log::warn!("yt-dlp not found; YouTube links will fail to resolve"),
        }
        match &tools.transcoder_dir {
            Some(dir) => log::info!("Using ffmpeg from {}", dir.display()),
            None => log::debug!("No ffmpeg location found; yt-dlp will search on its own"),
        }

        tools
    }
}

fn extractor_binary_names() -> &'static [&'static str] {
    &["yt-dlp.exe", "yt-dlp"]
}

fn transcoder_binary_names() -> &'static [&'static str] {
    &["ffmpeg.exe", "ffmpeg"]
}

/// Conventional ffmpeg install locations checked before PATH
fn transcoder_install_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/opt/homebrew/bin"),
        PathBuf::from("/usr/bin"),
    ];
    #[cfg(windows)]
    {
        dirs.insert(0, PathBuf::from(r"C:\ffmpeg\bin"));
        dirs.insert(1, PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
    }
    dirs
}

/// Find the first directory on `PATH` containing one of `names`
pub fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| find_in_dir(&dir, names))
}

fn find_in_dir(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Resolve the yt-dlp executable: configured path, `JUKEBOX_YTDLP`, then PATH.
pub fn locate_extractor(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        log::warn!("Configured extractor {} does not exist", path.display());
    }

    if let Some(path) = std::env::var_os(EXTRACTOR_ENV).map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
    }

    find_on_path(extractor_binary_names())
}

/// Resolve the directory containing ffmpeg.
///
/// Checks the configured path and `JUKEBOX_FFMPEG` (either may name the binary
/// or its directory), then conventional install dirs, then PATH.
pub fn locate_transcoder(configured: Option<&Path>) -> Option<PathBuf> {
    let explicit = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::env::var_os(TRANSCODER_ENV).map(PathBuf::from));

    for candidate in explicit {
        if let Some(dir) = transcoder_dir_for(&candidate) {
            return Some(dir);
        }
    }

    transcoder_install_dirs()
        .into_iter()
        .find(|dir| find_in_dir(dir, transcoder_binary_names()).is_some())
        .or_else(|| find_on_path(transcoder_binary_names()).and_then(|bin| bin.parent().map(Path::to_path_buf)))
}

fn transcoder_dir_for(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_dir() {
        return find_in_dir(candidate, transcoder_binary_names()).map(|_| candidate.to_path_buf());
    }
    if candidate.is_file() {
        return candidate.parent().map(Path::to_path_buf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_configured_extractor_wins() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("yt-dlp");
        fs::write(&bin, b"#!/bin/sh\n").unwrap();

        assert_eq!(locate_extractor(Some(&bin)), Some(bin));
    }

    #[test]
    fn test_transcoder_binary_path_maps_to_directory() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join("ffmpeg");
        fs::write(&bin, b"").unwrap();

        assert_eq!(locate_transcoder(Some(&bin)), Some(temp_dir.path().to_path_buf()));
    }

    #[test]
    fn test_transcoder_directory_accepted_when_it_holds_ffmpeg() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("ffmpeg"), b"").unwrap();

        assert_eq!(
            transcoder_dir_for(temp_dir.path()),
            Some(temp_dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_empty_directory_is_not_a_transcoder_location() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(transcoder_dir_for(temp_dir.path()), None);
        assert_eq!(transcoder_dir_for(&temp_dir.path().join("missing")), None);
    }

    #[test]
    fn test_find_in_dir_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("yt-dlp")).unwrap();
        assert_eq!(find_in_dir(temp_dir.path(), &["yt-dlp"]), None);
    }
}
