use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Version tag written into records this crate creates.
pub const SCHEMA_VERSION: &str = env!("CARGO_PKG_VERSION");

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Whether the path carries one of the supported image extensions (case-insensitive).
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// Opaque flag mapping, passed through untouched.
pub type Flags = serde_json::Map<String, serde_json::Value>;

// `null` and a missing key both mean "no flags"
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Polygon,
}

// The Shape struct representing annotated shapes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Shape {
    pub label: String,
    #[serde(default)]
    pub text: Option<String>,
    pub points: Vec<(f64, f64)>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub shape_type: ShapeType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Flags,
}

impl Shape {
    /// A rectangle from two opposite corners, kept in the given order.
    pub fn rectangle(
        label: impl Into<String>,
        text: Option<String>,
        first: (f64, f64),
        second: (f64, f64),
    ) -> Self {
        Self {
            label: label.into(),
            text,
            points: vec![first, second],
            group_id: None,
            shape_type: ShapeType::Rectangle,
            flags: Flags::new(),
        }
    }

    pub fn polygon(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            text: None,
            points,
            group_id: None,
            shape_type: ShapeType::Polygon,
            flags: Flags::new(),
        }
    }

    /// The two stored corner points, in stored order. Extra points are ignored.
    pub fn corners(&self) -> Option<((f64, f64), (f64, f64))> {
        match self.points.as_slice() {
            [first, second, ..] => Some((*first, *second)),
            _ => None,
        }
    }
}

// The AnnotationRecord struct representing the annotation information of an image
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: Flags,
    pub shapes: Vec<Shape>,
    pub image_path: String,
    #[serde(default)]
    pub image_data: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

impl AnnotationRecord {
    /// An empty record for the given image, tagged with [`SCHEMA_VERSION`].
    pub fn new(image_path: impl Into<String>, image_width: u32, image_height: u32) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            flags: Flags::new(),
            shapes: Vec::new(),
            image_path: image_path.into(),
            image_data: None,
            image_height,
            image_width,
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        self.shapes.iter().map(|shape| shape.label.as_str()).collect()
    }
}

// Struct to hold conversion statistics for one directory pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    pub files_converted: usize,
    pub shapes_converted: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&mut self, shapes: usize) {
        self.files_converted += 1;
        self.shapes_converted += shapes;
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Files converted: {}", self.files_converted);
        log::info!("Shapes converted: {}", self.shapes_converted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parses_labelme_style_json() {
        let json = r#"{
            "version": "2.3.0",
            "flags": null,
            "shapes": [
                {"label": "car", "text": "", "points": [[1, 2], [3.5, 4]],
                 "group_id": null, "shape_type": "rectangle", "flags": {"occluded": true}}
            ],
            "imagePath": "a.jpg",
            "imageData": null,
            "imageHeight": 480,
            "imageWidth": 640
        }"#;
        let record: AnnotationRecord = serde_json::from_str(json).unwrap();
        assert!(record.flags.is_empty());
        assert_eq!(record.shapes[0].points, vec![(1.0, 2.0), (3.5, 4.0)]);
        assert_eq!(record.shapes[0].flags["occluded"], serde_json::Value::Bool(true));
        assert_eq!(record.labels(), vec!["car"]);
    }

    #[test]
    fn test_record_requires_image_size() {
        let json = r#"{"version": "1", "shapes": [], "imagePath": "a.jpg", "imageWidth": 10}"#;
        let err = serde_json::from_str::<AnnotationRecord>(json).unwrap_err();
        assert!(err.to_string().contains("imageHeight"));
    }

    #[test]
    fn test_record_serializes_field_names() {
        let record = AnnotationRecord::new("a.jpg", 640, 480);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["imagePath"], "a.jpg");
        assert_eq!(value["imageWidth"], 640);
        assert!(value["imageData"].is_null());
        assert_eq!(value["version"], SCHEMA_VERSION);
    }

    #[test]
    fn test_corners_need_two_points() {
        let shape = Shape::polygon("a", vec![(1.0, 1.0)]);
        assert!(shape.corners().is_none());
        let shape = Shape::rectangle("a", None, (5.0, 6.0), (1.0, 2.0));
        assert_eq!(shape.corners(), Some(((5.0, 6.0), (1.0, 2.0))));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(std::path::Path::new("a/b.JPG")));
        assert!(is_image_file(std::path::Path::new("b.png")));
        assert!(!is_image_file(std::path::Path::new("b.json")));
    }
}
