//! Axis-aligned box conversions between the custom schema and VOC, YOLO and COCO.

use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::class_table::ClassTable;
use crate::coco::{
    bbox_from_corners, categories_from_table, category_names, CocoAccumulator, CocoFile,
};
use crate::error::{ConvertError, Result};
use crate::io::{list_files_with_extension, ImageCrateProbe, ImageIndex, ImageSizeProbe};
use crate::types::{AnnotationRecord, Shape};
use crate::utils::{read_json, read_record, write_json_pretty, write_record};
use crate::voc::VocDocument;
use crate::yolo::{render_lines, YoloLine};

/// File name of the aggregate COCO export.
pub const COCO_OUTPUT_FILE: &str = "coco_annotations.json";

pub struct RectangleConverter {
    classes: ClassTable,
    probe: Box<dyn ImageSizeProbe>,
}

impl RectangleConverter {
    pub fn new(classes: ClassTable) -> Self {
        Self::with_probe(classes, Box::new(ImageCrateProbe))
    }

    pub fn with_probe(classes: ClassTable, probe: Box<dyn ImageSizeProbe>) -> Self {
        Self { classes, probe }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Convert one custom JSON file to a VOC XML file. Returns the object count.
    pub fn custom_to_voc(&self, input_file: &Path, output_file: &Path) -> Result<usize> {
        let record = read_record(input_file)?;
        let folder = output_file
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        let document = VocDocument::from_record(&record, &folder, input_file)?;
        let xml = document
            .to_pretty_xml()
            .map_err(|source| ConvertError::Xml {
                path: output_file.to_path_buf(),
                source,
            })?;
        fs::write(output_file, xml)?;
        debug!("{:?} -> {:?}", input_file, output_file);
        Ok(document.objects.len())
    }

    /// Convert one VOC XML file to a custom JSON file. Returns the shape count.
    pub fn voc_to_custom(&self, input_file: &Path, output_file: &Path) -> Result<usize> {
        let content = fs::read_to_string(input_file)?;
        let document = VocDocument::from_xml(&content).map_err(|source| ConvertError::Xml {
            path: input_file.to_path_buf(),
            source,
        })?;
        let record = document.to_record();
        write_record(output_file, &record)?;
        debug!("{:?} -> {:?}", input_file, output_file);
        Ok(record.shapes.len())
    }

    /// Box lines for every shape of a record, in shape order.
    pub fn record_to_yolo(
        &self,
        record: &AnnotationRecord,
        source: &Path,
    ) -> Result<Vec<YoloLine>> {
        let width = record.image_width as f64;
        let height = record.image_height as f64;
        record
            .shapes
            .iter()
            .map(|shape| {
                let class_index = self.classes.index_of(&shape.label)?;
                let ((x0, y0), (x1, y1)) = corners(shape, source)?;
                Ok(YoloLine::Rect {
                    class_index,
                    x_center: (x0 + x1) / (2.0 * width),
                    y_center: (y0 + y1) / (2.0 * height),
                    width: (x1 - x0).abs() / width,
                    height: (y1 - y0).abs() / height,
                })
            })
            .collect()
    }

    /// Convert one custom JSON file to a YOLO box label file.
    pub fn custom_to_yolo(&self, input_file: &Path, output_file: &Path) -> Result<usize> {
        let record = read_record(input_file)?;
        let lines = self.record_to_yolo(&record, input_file)?;
        fs::write(output_file, render_lines(&lines))?;
        Ok(lines.len())
    }

    /// Rebuild pixel corners from box lines. Corners are truncated toward zero.
    pub fn yolo_to_record(
        &self,
        lines: &[YoloLine],
        image_name: &str,
        (width, height): (u32, u32),
    ) -> Result<AnnotationRecord> {
        let w = width as f64;
        let h = height as f64;
        let mut record = AnnotationRecord::new(image_name, width, height);
        for line in lines {
            let YoloLine::Rect {
                class_index,
                x_center,
                y_center,
                width: box_w,
                height: box_h,
            } = *line
            else {
                continue;
            };
            let label = self.classes.label_of(class_index)?;
            let x_min = ((x_center - box_w / 2.0) * w).trunc();
            let y_min = ((y_center - box_h / 2.0) * h).trunc();
            let x_max = ((x_center + box_w / 2.0) * w).trunc();
            let y_max = ((y_center + box_h / 2.0) * h).trunc();
            record
                .shapes
                .push(Shape::rectangle(label, None, (x_min, y_min), (x_max, y_max)));
        }
        Ok(record)
    }

    /// Convert one YOLO box label file to custom JSON. The image size comes from
    /// the probe since the label file does not carry it.
    pub fn yolo_to_custom(
        &self,
        input_file: &Path,
        output_file: &Path,
        image_file: &Path,
    ) -> Result<usize> {
        let lines = read_yolo_file(input_file, YoloLine::parse_rect)?;
        let size = self.probe.dimensions(image_file)?;
        let record = self.yolo_to_record(&lines, &file_name_of(image_file), size)?;
        write_record(output_file, &record)?;
        Ok(record.shapes.len())
    }

    /// Aggregate every `*.json` record of `input_dir` into one COCO dataset.
    ///
    /// Files are visited in sorted order; image ids follow that order from 1 and
    /// annotation ids run across all files. Boxes are min/max normalized.
    pub fn build_coco(&self, input_dir: &Path) -> Result<CocoFile> {
        let mut acc = CocoAccumulator::new();
        for input_file in list_files_with_extension(input_dir, "json")? {
            let record = read_record(&input_file)?;
            let image_id = acc.add_image(
                file_name_of(Path::new(&record.image_path)),
                record.image_width,
                record.image_height,
            );
            for shape in &record.shapes {
                let class_index = self.classes.index_of(&shape.label)?;
                let (first, second) = corners(shape, &input_file)?;
                acc.add_annotation(
                    image_id,
                    (class_index + 1) as u32,
                    bbox_from_corners(first, second),
                );
            }
        }
        info!(
            "Collected {} images and {} annotations",
            acc.image_count(),
            acc.annotation_count()
        );
        Ok(acc.finish(categories_from_table(&self.classes)))
    }

    /// Write the aggregate COCO file for `input_dir` to
    /// `output_dir/`[`COCO_OUTPUT_FILE`] and return the written dataset.
    pub fn custom_to_coco(&self, input_dir: &Path, output_dir: &Path) -> Result<CocoFile> {
        let coco = self.build_coco(input_dir)?;
        let output_file = output_dir.join(COCO_OUTPUT_FILE);
        write_json_pretty(&output_file, &coco)?;
        info!("Wrote {}", output_file.display());
        Ok(coco)
    }

    /// Split a COCO dataset into one record per image.
    ///
    /// With a class table, `category_id - 1` is the class index. Without one the
    /// label is the name of the COCO category carrying that id, so sparse ids
    /// resolve correctly. Every COCO `file_name` must resolve against the listing
    /// of `image_dir`.
    pub fn coco_to_records(
        &self,
        coco: &CocoFile,
        image_dir: &Path,
    ) -> Result<Vec<AnnotationRecord>> {
        let derived = if self.classes.is_empty() {
            Some(category_names(&coco.categories))
        } else {
            None
        };
        let index = ImageIndex::scan(image_dir)?;

        let mut records = Vec::with_capacity(coco.images.len());
        let mut by_image_id = HashMap::with_capacity(coco.images.len());
        for image in &coco.images {
            let resolved = index.resolve_name(&image.file_name)?;
            by_image_id.insert(image.id, records.len());
            records.push(AnnotationRecord::new(resolved, image.width, image.height));
        }

        for annotation in &coco.annotations {
            let slot = *by_image_id.get(&annotation.image_id).ok_or(
                ConvertError::UnknownImageId {
                    annotation_id: annotation.id,
                    image_id: annotation.image_id,
                },
            )?;
            let label = match &derived {
                Some(names) => names.get(&annotation.category_id).copied().ok_or(
                    ConvertError::UnknownCategoryId {
                        annotation_id: annotation.id,
                        category_id: annotation.category_id,
                    },
                )?,
                None => {
                    let class_index = annotation.category_id.checked_sub(1).ok_or(
                        ConvertError::ClassIndexOutOfRange {
                            index: -1,
                            len: self.classes.len(),
                        },
                    )?;
                    self.classes.label_of(class_index as usize)?
                }
            };
            let [x, y, w, h] = annotation.bbox;
            records[slot]
                .shapes
                .push(Shape::rectangle(label, None, (x, y), (x + w, y + h)));
        }
        Ok(records)
    }

    /// Convert a COCO file into per-image custom JSON files in `output_dir`,
    /// named after the resolved image file. Returns the written records.
    pub fn coco_to_custom(
        &self,
        input_file: &Path,
        output_dir: &Path,
        image_dir: &Path,
    ) -> Result<Vec<AnnotationRecord>> {
        let coco: CocoFile = read_json(input_file)?;
        let records = self.coco_to_records(&coco, image_dir)?;
        for record in &records {
            let stem = Path::new(&record.image_path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| record.image_path.clone());
            let output_file = output_dir.join(format!("{}.json", stem));
            write_record(&output_file, record)?;
        }
        Ok(records)
    }
}

fn corners(shape: &Shape, source: &Path) -> Result<((f64, f64), (f64, f64))> {
    shape.corners().ok_or_else(|| {
        ConvertError::schema(
            source,
            format!("shape '{}' needs two corner points", shape.label),
        )
    })
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Parse every non-blank line of a YOLO label file with `parse`.
pub(crate) fn read_yolo_file(
    path: &Path,
    parse: fn(&str) -> std::result::Result<Option<YoloLine>, String>,
) -> Result<Vec<YoloLine>> {
    let content = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for (index, line) in content.lines().enumerate() {
        match parse(line) {
            Ok(Some(parsed)) => lines.push(parsed),
            Ok(None) => {}
            Err(message) => {
                return Err(ConvertError::YoloLine {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message,
                })
            }
        }
    }
    Ok(lines)
}
