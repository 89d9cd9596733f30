//! Polygon conversions between the custom schema and YOLO segmentation lines.

use std::fs;
use std::path::Path;

use crate::class_table::ClassTable;
use crate::error::{ConvertError, Result};
use crate::io::{ImageCrateProbe, ImageSizeProbe};
use crate::rectangle::{file_name_of, read_yolo_file};
use crate::types::{AnnotationRecord, Shape, ShapeType};
use crate::utils::{read_record, write_record};
use crate::yolo::{render_lines, YoloLine};

pub struct PolygonConverter {
    classes: ClassTable,
    probe: Box<dyn ImageSizeProbe>,
    imported_shape_type: ShapeType,
}

impl PolygonConverter {
    pub fn new(classes: ClassTable) -> Self {
        Self::with_probe(classes, Box::new(ImageCrateProbe))
    }

    pub fn with_probe(classes: ClassTable, probe: Box<dyn ImageSizeProbe>) -> Self {
        Self {
            classes,
            probe,
            imported_shape_type: ShapeType::Polygon,
        }
    }

    /// Tag imported polygons as `rectangle`, as older exports of this tool did.
    pub fn legacy_shape_type(mut self, enabled: bool) -> Self {
        self.imported_shape_type = if enabled {
            ShapeType::Rectangle
        } else {
            ShapeType::Polygon
        };
        self
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// One polygon line per shape, each vertex divided by the image size.
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
                if shape.points.is_empty() {
                    return Err(ConvertError::schema(
                        source,
                        format!("shape '{}' has no points", shape.label),
                    ));
                }
                Ok(YoloLine::Polygon {
                    class_index,
                    points: normalize_points(&shape.points, width, height),
                })
            })
            .collect()
    }

    pub fn custom_to_yolo(&self, input_file: &Path, output_file: &Path) -> Result<usize> {
        let record = read_record(input_file)?;
        let lines = self.record_to_yolo(&record, input_file)?;
        fs::write(output_file, render_lines(&lines))?;
        Ok(lines.len())
    }

    /// Rescale polygon lines back to pixel space. Vertices stay floating point.
    pub fn yolo_to_record(
        &self,
        lines: &[YoloLine],
        image_name: &str,
        (width, height): (u32, u32),
    ) -> Result<AnnotationRecord> {
        let mut record = AnnotationRecord::new(image_name, width, height);
        for line in lines {
            let YoloLine::Polygon {
                class_index,
                points,
            } = line
            else {
                continue;
            };
            let label = self.classes.label_of(*class_index)?;
            let mut shape = Shape::polygon(
                label,
                denormalize_points(points, width as f64, height as f64),
            );
            shape.shape_type = self.imported_shape_type;
            record.shapes.push(shape);
        }
        Ok(record)
    }

    pub fn yolo_to_custom(
        &self,
        input_file: &Path,
        output_file: &Path,
        image_file: &Path,
    ) -> Result<usize> {
        let lines = read_yolo_file(input_file, YoloLine::parse_polygon)?;
        let size = self.probe.dimensions(image_file)?;
        let record = self.yolo_to_record(&lines, &file_name_of(image_file), size)?;
        write_record(output_file, &record)?;
        Ok(record.shapes.len())
    }
}

pub fn normalize_points(points: &[(f64, f64)], width: f64, height: f64) -> Vec<(f64, f64)> {
    points.iter().map(|&(x, y)| (x / width, y / height)).collect()
}

pub fn denormalize_points(points: &[(f64, f64)], width: f64, height: f64) -> Vec<(f64, f64)> {
    points.iter().map(|&(x, y)| (x * width, y * height)).collect()
}
