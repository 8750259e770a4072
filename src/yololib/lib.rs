pub mod annotations;
pub mod cfg;
pub mod editor;
pub mod events;
pub mod file_util;
pub mod image_source;
pub mod image_util;
pub mod persistence;
pub mod render;
pub mod result;
#[doc(hidden)]
pub mod test_helpers;
pub mod tracing_setup;
pub mod util;
pub mod view;
pub mod yolo_io;
pub use annotations::{Annotation, AnnotationSet, Statistics};
pub use cfg::{read_cfg, EditorCfg};
pub use easyyolo_domain::{yoloerr, BbF, PtF, ShapeF, ShapeI, YoloError, YoloResult};
pub use editor::{
    AnnotationEditor, LabelProvider, Mode, MousePhase, Suggestion, SuggestionProvider, TouchPhase,
};
pub use events::{EditorInput, KeyCode, MouseInput, PointerEvent, TouchInput};
pub use image_source::{DecodeWorker, DecodedImage, ImageData, ImageDescriptor, ImageSource};
pub use image_util::ImageSurface;
pub use persistence::{FileStore, KeyValueStore, MemoryStore};
pub use render::RenderSurface;
pub use result::{Notification, NotificationLevel};
pub use view::Viewport;
