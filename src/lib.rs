//! Annotation format converter
//!
//! This library converts custom JSON object annotations (rectangles and polygons)
//! to and from Pascal VOC XML, YOLO text labels and COCO JSON, validates label
//! sets before batch exports, and partitions YOLO corpora into train/val/test.

pub mod batch;
pub mod class_table;
pub mod coco;
pub mod config;
pub mod dataset;
pub mod error;
pub mod io;
pub mod polygon;
pub mod rectangle;
pub mod types;
pub mod utils;
pub mod validator;
pub mod voc;
pub mod yolo;

// Re-export commonly used types and functions
pub use batch::{run, Converter};
pub use class_table::ClassTable;
pub use config::{Args, Mode, Task};
pub use error::{ConvertError, ErrorKind, Result};
pub use io::{ImageCrateProbe, ImageSizeProbe};
pub use polygon::PolygonConverter;
pub use rectangle::RectangleConverter;
pub use types::{AnnotationRecord, Shape, ShapeType};
pub use validator::{ConflictCatalog, ConflictGroup, LabelCheck};
