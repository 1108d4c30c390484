pub mod panels;
pub mod result;

/// A user request raised while rendering, handled by the app after the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PickFile,
    OpenGallery,
    Capture,
    Detect,
    Reset,
    RetryModel,
    DismissNotice,
}
