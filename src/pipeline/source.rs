use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;

use super::error::{ImageDecodeError, SourceError};

// ---------------------------------------------------------------------------
// ImageHandle – decoded pixels owned by the session
// ---------------------------------------------------------------------------

/// Where an image came from. Only used for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    FilePicker,
    Camera,
    Gallery,
}

impl std::fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageOrigin::FilePicker => write!(f, "file"),
            ImageOrigin::Camera => write!(f, "camera"),
            ImageOrigin::Gallery => write!(f, "gallery"),
        }
    }
}

/// Decoded 8-bit RGB pixels. Cloning shares the pixel buffer.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pixels: Arc<RgbImage>,
    origin: ImageOrigin,
}

impl ImageHandle {
    /// Wrap already decoded pixels. Alpha has to be dropped by the caller.
    pub fn from_rgb(pixels: RgbImage, origin: ImageOrigin) -> Result<Self, ImageDecodeError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ImageDecodeError::Empty);
        }
        Ok(Self {
            pixels: Arc::new(pixels),
            origin,
        })
    }

    /// Decode an encoded image (PNG, JPEG) into RGB pixels.
    pub fn decode(bytes: &[u8], origin: ImageOrigin) -> Result<Self, ImageDecodeError> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgb(decoded.to_rgb8(), origin)
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn origin(&self) -> ImageOrigin {
        self.origin
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Whether both handles refer to the same decoded buffer.
    pub fn same_pixels(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

// ---------------------------------------------------------------------------
// Payloads returned by acquisition collaborators
// ---------------------------------------------------------------------------

/// Raw image as handed over by a picker or capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    /// `data:<mime>;base64,<data>`
    DataUrl(String),
}

impl ImagePayload {
    /// Decode the payload into an [`ImageHandle`].
    pub fn decode(&self, origin: ImageOrigin) -> Result<ImageHandle, ImageDecodeError> {
        match self {
            ImagePayload::Bytes(bytes) => ImageHandle::decode(bytes, origin),
            ImagePayload::DataUrl(url) => {
                let bytes = decode_data_url(url)?;
                ImageHandle::decode(&bytes, origin)
            }
        }
    }

    /// Classify raw device output: text starting with `data:` is a data URL.
    fn from_device_output(output: Vec<u8>) -> Self {
        if output.starts_with(b"data:") {
            match String::from_utf8(output) {
                Ok(text) => ImagePayload::DataUrl(text.trim().to_string()),
                Err(e) => ImagePayload::Bytes(e.into_bytes()),
            }
        } else {
            ImagePayload::Bytes(output)
        }
    }
}

/// Extract the bytes of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ImageDecodeError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageDecodeError::DataUrl("missing `data:` scheme".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ImageDecodeError::DataUrl("missing `,` separator".into()))?;
    if !header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(ImageDecodeError::DataUrl(
            "only base64 encoded data URLs are supported".into(),
        ));
    }
    Ok(general_purpose::STANDARD.decode(data.trim())?)
}

/// Outcome of one acquisition attempt. Cancelling is not an error.
#[derive(Debug, Clone)]
pub enum Acquisition {
    Captured(ImageHandle),
    Cancelled,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// An external capability that produces a photo or is backed out of.
pub trait CaptureDevice {
    /// Block until the device returns a payload. `Ok(None)` means the
    /// user cancelled.
    fn capture(&self) -> Result<Option<ImagePayload>, SourceError>;
}

/// Decode bytes chosen through the file picker.
pub fn from_file_picker(bytes: &[u8]) -> Result<ImageHandle, ImageDecodeError> {
    ImageHandle::decode(bytes, ImageOrigin::FilePicker)
}

pub fn from_camera(device: &dyn CaptureDevice) -> Result<Acquisition, SourceError> {
    acquire(device, ImageOrigin::Camera)
}

pub fn from_gallery(device: &dyn CaptureDevice) -> Result<Acquisition, SourceError> {
    acquire(device, ImageOrigin::Gallery)
}

fn acquire(device: &dyn CaptureDevice, origin: ImageOrigin) -> Result<Acquisition, SourceError> {
    match device.capture()? {
        Some(payload) => {
            let handle = payload.decode(origin)?;
            log::info!(
                "Acquired {}x{} image from {origin}",
                handle.dimensions().0,
                handle.dimensions().1
            );
            Ok(Acquisition::Captured(handle))
        }
        None => {
            log::debug!("Acquisition from {origin} cancelled");
            Ok(Acquisition::Cancelled)
        }
    }
}

// ---------------------------------------------------------------------------
// Desktop collaborators
// ---------------------------------------------------------------------------

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Show the native open dialog and decode the chosen file.
pub fn pick_file() -> Result<Acquisition, SourceError> {
    let file = rfd::FileDialog::new()
        .set_title("Open leaf photo")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file();

    let Some(path) = file else {
        return Ok(Acquisition::Cancelled);
    };
    let bytes = read_file(&path)?;
    let handle = from_file_picker(&bytes)?;
    log::info!("Loaded {} ({}x{})", path.display(), handle.dimensions().0, handle.dimensions().1);
    Ok(Acquisition::Captured(handle))
}

fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Photo picker rooted at the user's pictures folder.
pub struct GalleryDialog {
    start_dir: Option<PathBuf>,
}

impl Default for GalleryDialog {
    fn default() -> Self {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
        let start_dir = home
            .map(|h| PathBuf::from(h).join("Pictures"))
            .filter(|p| p.is_dir());
        Self { start_dir }
    }
}

impl CaptureDevice for GalleryDialog {
    fn capture(&self) -> Result<Option<ImagePayload>, SourceError> {
        let mut dialog = rfd::FileDialog::new()
            .set_title("Choose from gallery")
            .add_filter("Photos", IMAGE_EXTENSIONS);
        if let Some(dir) = &self.start_dir {
            dialog = dialog.set_directory(dir);
        }
        match dialog.pick_file() {
            Some(path) => Ok(Some(ImagePayload::Bytes(read_file(&path)?))),
            None => Ok(None),
        }
    }
}

/// Runs an external capture program that writes one encoded image (or a
/// data URL) to stdout. Empty output means the user cancelled.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    argv: Vec<String>,
}

impl CommandCamera {
    /// `None` when no program is given.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }
}

impl CaptureDevice for CommandCamera {
    fn capture(&self) -> Result<Option<ImagePayload>, SourceError> {
        let output = Command::new(self.program())
            .args(&self.argv[1..])
            .output()
            .map_err(|e| SourceError::Device(format!("failed to run `{}`: {e}", self.program())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Device(format!(
                "`{}` exited with {}: {}",
                self.program(),
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(ImagePayload::from_device_output(output.stdout)))
    }
}
