//! Pascal VOC XML documents.
//!
//! ```xml
//! <annotation>
//!   <folder>out</folder>
//!   <filename>image1.jpg</filename>
//!   <size>
//!     <width>640</width>
//!     <height>480</height>
//!     <depth>3</depth>
//!   </size>
//!   <object>
//!     <name>person</name>
//!     <pose>Unspecified</pose>
//!     <truncated>0</truncated>
//!     <difficult>0</difficult>
//!     <bndbox>
//!       <xmin>100</xmin>
//!       <ymin>100</ymin>
//!       <xmax>200</xmax>
//!       <ymax>200</ymax>
//!     </bndbox>
//!   </object>
//! </annotation>
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::{AnnotationRecord, Shape};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "annotation")]
pub struct VocDocument {
    #[serde(default)]
    pub folder: String,
    pub filename: String,
    pub size: VocSize,
    #[serde(rename = "object", default)]
    pub objects: Vec<VocObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocSize {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_depth")]
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocObject {
    pub name: String,
    #[serde(default = "default_pose")]
    pub pose: String,
    #[serde(default)]
    pub truncated: u32,
    #[serde(default)]
    pub difficult: u32,
    pub bndbox: VocBndbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocBndbox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

fn default_pose() -> String {
    "Unspecified".to_string()
}

fn default_depth() -> u32 {
    3
}

impl VocDocument {
    /// Build a document from a record. Each shape's first point becomes
    /// (xmin, ymin) and its second point (xmax, ymax), without reordering.
    pub fn from_record(record: &AnnotationRecord, folder: &str, source: &Path) -> Result<Self> {
        let objects = record
            .shapes
            .iter()
            .map(|shape| {
                let ((x0, y0), (x1, y1)) = shape.corners().ok_or_else(|| {
                    ConvertError::schema(
                        source,
                        format!("shape '{}' needs two corner points", shape.label),
                    )
                })?;
                Ok(VocObject {
                    name: shape.label.clone(),
                    pose: default_pose(),
                    truncated: 0,
                    difficult: 0,
                    bndbox: VocBndbox {
                        xmin: x0,
                        ymin: y0,
                        xmax: x1,
                        ymax: y1,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let filename = Path::new(&record.image_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.image_path.clone());

        Ok(Self {
            folder: folder.to_string(),
            filename,
            size: VocSize {
                width: record.image_width,
                height: record.image_height,
                depth: default_depth(),
            },
            objects,
        })
    }

    /// The inverse of [`VocDocument::from_record`]: one rectangle per object with
    /// points `[[xmin, ymin], [xmax, ymax]]`.
    pub fn to_record(&self) -> AnnotationRecord {
        let mut record =
            AnnotationRecord::new(self.filename.clone(), self.size.width, self.size.height);
        record.shapes = self
            .objects
            .iter()
            .map(|object| {
                let bbox = object.bndbox;
                Shape::rectangle(
                    object.name.clone(),
                    Some(String::new()),
                    (bbox.xmin, bbox.ymin),
                    (bbox.xmax, bbox.ymax),
                )
            })
            .collect();
        record
    }

    /// Serialize with an XML declaration and 2-space indentation.
    pub fn to_pretty_xml(&self) -> std::result::Result<String, quick_xml::DeError> {
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut body);
        serializer.indent(' ', 2);
        self.serialize(serializer)?;

        let mut xml = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
        xml.push_str(XML_DECLARATION);
        xml.push_str(&body);
        xml.push('\n');
        Ok(xml)
    }

    pub fn from_xml(content: &str) -> std::result::Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(content)
    }
}
