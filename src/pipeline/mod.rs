/// Detection pipeline: acquisition, preprocessing, inference, lookup.
///
/// Architecture:
/// ```text
///  file picker / gallery / camera
///        │
///        ▼
///   ┌──────────┐
///   │  source   │  payload → ImageHandle (RGB8)
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess  │  nearest 256x256, /255 → [1,256,256,3]
///   └────────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ inference  │  Classifier::predict → arg-max
///   └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ disease   │  class index → DetectionResult
///   └──────────┘
/// ```

pub mod disease;
pub mod error;
pub mod inference;
pub mod model;
pub mod preprocess;
pub mod source;
