//! # pdfium-auto
//!
//! Find the [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! wherever a deployment put it, and bind `pdfium-render` to it.
//!
//! ## Search order
//!
//! 1. `PDFIUM_LIB_PATH`: a file, or a directory containing the platform
//!    library.
//! 2. Lambda layer locations: `/opt/lib`, `/opt`, then `$LAMBDA_TASK_ROOT/lib`
//!    and `$LAMBDA_TASK_ROOT`.
//! 3. The cache directory: `/tmp/pdfium-{VERSION}` inside Lambda (the only
//!    writable path there), otherwise the user cache dir, overridable with
//!    `PDFIUM_AUTO_CACHE_DIR`.
//! 4. Only when [`SearchPaths::allow_download`] is set: download the release
//!    archive from bblanchon/pdfium-binaries into the cache directory.
//!
//! ```rust,no_run
//! use pdfium_auto::{bind_pdfium, SearchPaths};
//!
//! let pdfium = bind_pdfium(&SearchPaths::from_env()).expect("PDFium unavailable");
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// The pdfium-binaries release tag used for downloads and cache naming.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Lambda layers are unpacked under `/opt`.
const LAYER_DIRS: &[&str] = &["/opt/lib", "/opt"];

/// Errors returned while locating or binding PDFium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    /// The current OS/architecture combination has no published binary.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// No candidate location held the library and downloading is disabled.
    #[error("PDFium library '{lib_name}' not found (searched: {})", fmt_paths(.searched))]
    NotFound {
        lib_name: &'static str,
        searched: Vec<PathBuf>,
    },

    /// Could not create the cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

fn fmt_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// Release asset and library file names for one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Asset filename in the GitHub release, e.g. `pdfium-linux-x64.tgz`.
    pub archive_name: &'static str,
    /// Relative path inside the archive.
    pub lib_path_in_archive: &'static str,
    /// Filename on disk, e.g. `libpdfium.so`.
    pub lib_name: &'static str,
}

/// Platform info for the running process.
pub fn detect_platform() -> Result<PlatformInfo, PdfiumAutoError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_for(os: &str, arch: &str) -> Result<PlatformInfo, PdfiumAutoError> {
    match (os, arch) {
        ("linux", "x86_64") => Ok(PlatformInfo {
            archive_name: "pdfium-linux-x64.tgz",
            lib_path_in_archive: "lib/libpdfium.so",
            lib_name: "libpdfium.so",
        }),
        ("linux", "aarch64") => Ok(PlatformInfo {
            archive_name: "pdfium-linux-arm64.tgz",
            lib_path_in_archive: "lib/libpdfium.so",
            lib_name: "libpdfium.so",
        }),
        ("macos", "aarch64") => Ok(PlatformInfo {
            archive_name: "pdfium-mac-arm64.tgz",
            lib_path_in_archive: "lib/libpdfium.dylib",
            lib_name: "libpdfium.dylib",
        }),
        ("macos", "x86_64") => Ok(PlatformInfo {
            archive_name: "pdfium-mac-x64.tgz",
            lib_path_in_archive: "lib/libpdfium.dylib",
            lib_name: "libpdfium.dylib",
        }),
        (os, arch) => Err(PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

// ── Search configuration ─────────────────────────────────────────────────────

/// Where to look for the library, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    /// Explicit file or directory (`PDFIUM_LIB_PATH`).
    pub explicit: Option<PathBuf>,
    /// Directories searched after the explicit path.
    pub directories: Vec<PathBuf>,
    /// Writable cache directory; also the download target.
    pub cache_dir: PathBuf,
    /// Fetch the release archive when nothing is found locally.
    pub allow_download: bool,
}

impl SearchPaths {
    /// Build the search list from the process environment.
    pub fn from_env() -> Self {
        let mut directories: Vec<PathBuf> = LAYER_DIRS.iter().map(PathBuf::from).collect();
        if let Ok(root) = std::env::var("LAMBDA_TASK_ROOT") {
            let root = PathBuf::from(root);
            directories.push(root.join("lib"));
            directories.push(root);
        }

        Self {
            explicit: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
            directories,
            cache_dir: pdfium_cache_dir(),
            allow_download: false,
        }
    }

    /// Override the explicit library location.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    pub fn with_download(mut self, allow: bool) -> Self {
        self.allow_download = allow;
        self
    }

    /// Every concrete file path that would be checked for `lib_name`.
    pub fn candidates(&self, lib_name: &str) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(self.directories.len() + 2);
        if let Some(ref explicit) = self.explicit {
            if explicit.is_dir() {
                out.push(explicit.join(lib_name));
            } else {
                out.push(explicit.clone());
            }
        }
        out.extend(self.directories.iter().map(|d| d.join(lib_name)));
        out.push(self.cache_dir.join(lib_name));
        out
    }
}

/// Returns the per-version cache directory for the PDFium library.
///
/// Inside Lambda (`AWS_LAMBDA_FUNCTION_NAME` set) this is under `/tmp`;
/// elsewhere under the user cache dir. `PDFIUM_AUTO_CACHE_DIR` overrides both.
pub fn pdfium_cache_dir() -> PathBuf {
    let versioned = format!("pdfium-{PDFIUM_VERSION}");

    if let Ok(override_dir) = std::env::var("PDFIUM_AUTO_CACHE_DIR") {
        return PathBuf::from(override_dir).join(versioned);
    }
    if std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some() {
        return std::env::temp_dir().join(versioned);
    }

    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("ocr-lambda")
        .join(versioned)
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Successful resolutions, keyed by the search list that produced them.
static RESOLVED: Mutex<Vec<(SearchPaths, PathBuf)>> = Mutex::new(Vec::new());

fn resolved() -> MutexGuard<'static, Vec<(SearchPaths, PathBuf)>> {
    RESOLVED.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Locate the library, downloading it only when `paths.allow_download` is set.
///
/// Each successful resolution is remembered for the lifetime of the process
/// under its `paths`, so warm Lambda invocations never touch the filesystem
/// again. A different search list is resolved afresh.
pub fn resolve_library(paths: &SearchPaths) -> Result<PathBuf, PdfiumAutoError> {
    if let Some((_, path)) = resolved().iter().find(|(key, _)| key == paths) {
        return Ok(path.clone());
    }

    let info = detect_platform()?;
    let path = match find_existing(paths, info.lib_name) {
        Some(found) => found,
        None if paths.allow_download => download_to_cache(&paths.cache_dir, &info)?,
        None => {
            return Err(PdfiumAutoError::NotFound {
                lib_name: info.lib_name,
                searched: paths.candidates(info.lib_name),
            })
        }
    };

    resolved().push((paths.clone(), path.clone()));
    Ok(path)
}

/// First candidate that exists on disk.
pub fn find_existing(paths: &SearchPaths, lib_name: &str) -> Option<PathBuf> {
    paths.candidates(lib_name).into_iter().find(|p| p.is_file())
}

/// Resolve and bind in one step.
pub fn bind_pdfium(paths: &SearchPaths) -> Result<Pdfium, PdfiumAutoError> {
    let lib_path = resolve_library(paths)?;
    bind_pdfium_from_path(&lib_path)
}

/// Binds to a PDFium library at an explicit `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

// ── Download ─────────────────────────────────────────────────────────────────

fn download_to_cache(cache_dir: &Path, info: &PlatformInfo) -> Result<PathBuf, PdfiumAutoError> {
    let url = format!(
        "{}/chromium%2F{}/{}",
        BASE_URL, PDFIUM_VERSION, info.archive_name
    );

    std::fs::create_dir_all(cache_dir).map_err(PdfiumAutoError::CacheDir)?;

    let archive_bytes = download_bytes(&url)?;
    let lib_path = cache_dir.join(info.lib_name);
    extract_library(&archive_bytes, info.lib_path_in_archive, &lib_path)?;
    Ok(lib_path)
}

fn download_bytes(url: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| PdfiumAutoError::Download(format!("Read error: {e}")))
}

/// Extracts a single file from a gzipped tar archive into `dest_path`.
fn extract_library(
    archive_bytes: &[u8],
    lib_path_in_archive: &str,
    dest_path: &Path,
) -> Result<(), PdfiumAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(archive_bytes));

    for entry in archive
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let matches = entry
            .path()
            .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?
            .to_string_lossy()
            == lib_path_in_archive;

        if matches {
            entry
                .unpack(dest_path)
                .map_err(|e| PdfiumAutoError::Extract(format!("Unpack failed: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "Library '{}' not found in archive",
        lib_path_in_archive
    )))
}
