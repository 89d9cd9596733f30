//! COCO format data structures and id bookkeeping
//!
//! The aggregate export builds one [`CocoFile`] for a whole directory. Image and
//! annotation ids are handed out by a [`CocoAccumulator`] threaded through the pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::class_table::ClassTable;

/// COCO dataset information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub year: u32,
    pub version: String,
    pub description: String,
    pub contributor: String,
    pub url: String,
    pub date_created: String,
}

impl Default for Info {
    fn default() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            year: chrono::Datelike::year(&today) as u32,
            version: crate::types::SCHEMA_VERSION.to_string(),
            description: "COCO Label Conversion".to_string(),
            contributor: "label-converter".to_string(),
            url: String::new(),
            date_created: today.to_string(),
        }
    }
}

/// COCO license information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Default for License {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Unknown".to_string(),
            url: String::new(),
        }
    }
}

/// COCO category information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

impl Category {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: String::new(),
        }
    }
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u32,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub license: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flickr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub coco_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub date_captured: Option<String>,
}

impl Image {
    pub fn new(id: u32, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name,
            width,
            height,
            license: 1,
            flickr_url: None,
            coco_url: None,
            date_captured: None,
        }
    }
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    pub bbox: [f64; 4], // [x, y, width, height]
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub iscrowd: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub segmentation: Option<serde_json::Value>,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoFile {
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub licenses: Vec<License>,
    pub categories: Vec<Category>,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
}

/// One category per class, `id = class index + 1`.
pub fn categories_from_table(classes: &ClassTable) -> Vec<Category> {
    classes
        .names()
        .iter()
        .enumerate()
        .map(|(index, name)| Category::new((index + 1) as u32, name.clone()))
        .collect()
}

/// Category name by category id. The first category wins on a repeated id.
pub fn category_names(categories: &[Category]) -> HashMap<u32, &str> {
    let mut names = HashMap::with_capacity(categories.len());
    for category in categories {
        if names.contains_key(&category.id) {
            log::warn!("Duplicate COCO category id {}, keeping the first", category.id);
            continue;
        }
        names.insert(category.id, category.name.as_str());
    }
    names
}

/// Order-sensitive accumulator for one aggregate export pass.
///
/// Image ids start at 1 and advance once per image. Annotation ids start at 1 and
/// advance once per annotation across all images of the pass.
#[derive(Debug)]
pub struct CocoAccumulator {
    next_image_id: u32,
    next_annotation_id: u32,
    images: Vec<Image>,
    annotations: Vec<Annotation>,
}

impl Default for CocoAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CocoAccumulator {
    pub fn new() -> Self {
        Self {
            next_image_id: 1,
            next_annotation_id: 1,
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Add an image and return its id
    pub fn add_image(&mut self, file_name: String, width: u32, height: u32) -> u32 {
        let image_id = self.next_image_id;
        self.next_image_id += 1;
        self.images.push(Image::new(image_id, file_name, width, height));
        image_id
    }

    /// Add a bounding box annotation and return its id. `area` is `w * h`.
    pub fn add_annotation(&mut self, image_id: u32, category_id: u32, bbox: [f64; 4]) -> u32 {
        let annotation_id = self.next_annotation_id;
        self.next_annotation_id += 1;
        self.annotations.push(Annotation {
            id: annotation_id,
            image_id,
            category_id,
            bbox,
            area: bbox[2] * bbox[3],
            iscrowd: 0,
            segmentation: None,
        });
        annotation_id
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// Build the complete COCO dataset structure
    pub fn finish(self, categories: Vec<Category>) -> CocoFile {
        CocoFile {
            info: Info::default(),
            licenses: vec![License::default()],
            categories,
            images: self.images,
            annotations: self.annotations,
        }
    }
}

/// Axis-aligned `[x_min, y_min, width, height]` spanned by two corners.
pub fn bbox_from_corners(first: (f64, f64), second: (f64, f64)) -> [f64; 4] {
    let x_min = first.0.min(second.0);
    let y_min = first.1.min(second.1);
    let x_max = first.0.max(second.0);
    let y_max = first.1.max(second.1);
    [x_min, y_min, x_max - x_min, y_max - y_min]
}
