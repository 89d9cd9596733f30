//! Directory-level conversion passes for every task and mode.

use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::class_table::ClassTable;
use crate::config::{Args, Mode, Task};
use crate::dataset::{partition_dataset, Sample, DATASET_DIR};
use crate::error::{ConvertError, Result};
use crate::io::{list_files_with_extension, ImageIndex};
use crate::polygon::PolygonConverter;
use crate::rectangle::RectangleConverter;
use crate::types::ConversionStats;
use crate::utils::{create_progress_bar, ensure_directory};
use crate::validator::{ensure_valid_dir, ConflictCatalog};

/// A converter bound to one class table, selected by task.
pub enum Converter {
    Rectangle(RectangleConverter),
    Polygon(PolygonConverter),
}

impl Converter {
    pub fn classes(&self) -> &ClassTable {
        match self {
            Converter::Rectangle(conv) => conv.classes(),
            Converter::Polygon(conv) => conv.classes(),
        }
    }

    pub fn custom_to_yolo(&self, input_file: &Path, output_file: &Path) -> Result<usize> {
        match self {
            Converter::Rectangle(conv) => conv.custom_to_yolo(input_file, output_file),
            Converter::Polygon(conv) => conv.custom_to_yolo(input_file, output_file),
        }
    }

    pub fn yolo_to_custom(
        &self,
        input_file: &Path,
        output_file: &Path,
        image_file: &Path,
    ) -> Result<usize> {
        match self {
            Converter::Rectangle(conv) => conv.yolo_to_custom(input_file, output_file, image_file),
            Converter::Polygon(conv) => conv.yolo_to_custom(input_file, output_file, image_file),
        }
    }

    fn rectangle(&self, mode: Mode) -> Result<&RectangleConverter> {
        match self {
            Converter::Rectangle(conv) => Ok(conv),
            Converter::Polygon(_) => Err(ConvertError::InvalidConfig(format!(
                "{} is only available for the rectangle task",
                mode
            ))),
        }
    }
}

/// Options of a custom2yolo pass.
#[derive(Debug, Clone)]
pub struct YoloExportOptions {
    pub validate: bool,
    pub split: Option<SplitOptions>,
}

#[derive(Debug, Clone, Copy)]
pub struct SplitOptions {
    pub train_size: f64,
    pub val_size: f64,
    pub seed: u64,
}

/// Run `convert` over `items` in parallel, stopping at the first error.
fn convert_in_parallel<T, F>(
    items: &[T],
    label: &str,
    path_of: fn(&T) -> &Path,
    convert: F,
) -> Result<ConversionStats>
where
    T: Sync,
    F: Fn(&T) -> Result<usize> + Sync,
{
    let pb: ProgressBar = create_progress_bar(items.len() as u64, label);
    let counts = items
        .par_iter()
        .map(|item| {
            let result = convert(item);
            pb.inc(1);
            result.map_err(|e| {
                error!("Failed to convert {}: {}", path_of(item).display(), e);
                e
            })
        })
        .collect::<Result<Vec<usize>>>();
    pb.finish_with_message(format!("{} complete", label));

    let mut stats = ConversionStats::new();
    for shapes in counts? {
        stats.record_file(shapes);
    }
    Ok(stats)
}

fn convert_files_in_parallel<F>(
    files: &[PathBuf],
    label: &str,
    convert: F,
) -> Result<ConversionStats>
where
    F: Fn(&Path) -> Result<usize> + Sync,
{
    convert_in_parallel(files, label, PathBuf::as_path, |file| convert(file))
}

/// `dir/<stem>.<extension>`. Only the input's last extension is replaced, so
/// `frame.001.json` maps to `frame.001.txt`.
pub fn output_path(dir: &Path, input_file: &Path, extension: &str) -> PathBuf {
    let stem = input_file.file_stem().unwrap_or_default();
    dir.join(format!("{}.{}", stem.to_string_lossy(), extension))
}

/// custom2voc: every `*.json` in `src_dir` to `<stem>.xml` in `dst_dir`.
pub fn export_voc_dir(
    conv: &RectangleConverter,
    src_dir: &Path,
    dst_dir: &Path,
) -> Result<ConversionStats> {
    let files = list_files_with_extension(src_dir, "json")?;
    ensure_directory(dst_dir)?;
    convert_files_in_parallel(&files, "custom2voc", |file| {
        conv.custom_to_voc(file, &output_path(dst_dir, file, "xml"))
    })
}

/// voc2custom: every `*.xml` in `src_dir` to `<stem>.json` in `dst_dir`.
pub fn import_voc_dir(
    conv: &RectangleConverter,
    src_dir: &Path,
    dst_dir: &Path,
) -> Result<ConversionStats> {
    let files = list_files_with_extension(src_dir, "xml")?;
    ensure_directory(dst_dir)?;
    convert_files_in_parallel(&files, "voc2custom", |file| {
        conv.voc_to_custom(file, &output_path(dst_dir, file, "json"))
    })
}

/// custom2yolo: validate the whole batch, convert every record, then optionally
/// partition the result under `dst_dir/YoloDatasets`.
///
/// Nothing is written when validation fails.
pub fn export_yolo_dir(
    conv: &Converter,
    src_dir: &Path,
    dst_dir: &Path,
    catalog: &ConflictCatalog,
    options: &YoloExportOptions,
) -> Result<ConversionStats> {
    if options.validate {
        ensure_valid_dir(src_dir, catalog)?;
    } else {
        warn!("Label validation skipped");
    }

    let files = list_files_with_extension(src_dir, "json")?;
    ensure_directory(dst_dir)?;
    let stats = convert_files_in_parallel(&files, "custom2yolo", |file| {
        conv.custom_to_yolo(file, &output_path(dst_dir, file, "txt"))
    })?;

    if let Some(split) = options.split {
        let images = ImageIndex::scan(src_dir)?;
        let samples = files
            .iter()
            .map(|file| {
                let stem = file.file_stem().unwrap_or_default().to_string_lossy();
                Ok(Sample {
                    image: images.find_by_stem(&stem)?,
                    label: output_path(dst_dir, file, "txt"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        partition_dataset(
            &samples,
            conv.classes().names(),
            &dst_dir.join(DATASET_DIR),
            split.train_size,
            split.val_size,
            split.seed,
        )?;
    }
    Ok(stats)
}

/// yolo2custom: every `*.txt` in `src_dir`, paired with the image of the same
/// stem in `img_dir`, to `<stem>.json` in `dst_dir`.
pub fn import_yolo_dir(
    conv: &Converter,
    src_dir: &Path,
    img_dir: &Path,
    dst_dir: &Path,
) -> Result<ConversionStats> {
    let images = ImageIndex::scan(img_dir)?;
    let files = list_files_with_extension(src_dir, "txt")?;
    let pairs = files
        .iter()
        .map(|file| {
            let stem = file.file_stem().unwrap_or_default().to_string_lossy();
            Ok((file.clone(), images.find_by_stem(&stem)?))
        })
        .collect::<Result<Vec<_>>>()?;
    ensure_directory(dst_dir)?;

    convert_in_parallel(
        &pairs,
        "yolo2custom",
        |(label_file, _)| label_file.as_path(),
        |(label_file, image_file)| {
            let output_file = output_path(dst_dir, label_file, "json");
            conv.yolo_to_custom(label_file, &output_file, image_file)
        },
    )
}

/// Load the class table from `--classes`, or an empty table when absent.
pub fn load_classes(path: Option<&Path>) -> Result<ClassTable> {
    match path {
        Some(path) => ClassTable::from_file(path),
        None => Ok(ClassTable::default()),
    }
}

pub fn build_converter(args: &Args, classes: ClassTable) -> Converter {
    match args.task {
        Task::Rectangle => Converter::Rectangle(RectangleConverter::new(classes)),
        Task::Polygon => Converter::Polygon(
            PolygonConverter::new(classes).legacy_shape_type(args.legacy_polygon_type),
        ),
    }
}

/// Main conversion pipeline for one invocation.
pub fn run(args: &Args) -> Result<ConversionStats> {
    args.validate()?;
    let classes = load_classes(args.classes.as_deref())?;
    info!("Import classes: {:?}", classes.names());
    let converter = build_converter(args, classes);

    let stats = match args.mode {
        Mode::CustomToVoc => export_voc_dir(
            converter.rectangle(args.mode)?,
            &args.src_path,
            args.require_dst()?,
        )?,
        Mode::VocToCustom => import_voc_dir(
            converter.rectangle(args.mode)?,
            &args.src_path,
            args.output_dir()?,
        )?,
        Mode::CustomToYolo => {
            let options = YoloExportOptions {
                validate: !args.skip_validation,
                split: (!args.no_split).then_some(SplitOptions {
                    train_size: args.train_size,
                    val_size: args.val_size,
                    seed: args.seed,
                }),
            };
            export_yolo_dir(
                &converter,
                &args.src_path,
                args.require_dst()?,
                &ConflictCatalog::default(),
                &options,
            )?
        }
        Mode::YoloToCustom => import_yolo_dir(
            &converter,
            &args.src_path,
            args.require_img()?,
            args.output_dir()?,
        )?,
        Mode::CustomToCoco => {
            let dst = args.require_dst()?;
            ensure_directory(dst)?;
            let coco = converter
                .rectangle(args.mode)?
                .custom_to_coco(&args.src_path, dst)?;
            ConversionStats {
                files_converted: coco.images.len(),
                shapes_converted: coco.annotations.len(),
            }
        }
        Mode::CocoToCustom => {
            let dst = args.require_dst()?;
            ensure_directory(dst)?;
            let records = converter.rectangle(args.mode)?.coco_to_custom(
                &args.src_path,
                dst,
                args.require_img()?,
            )?;
            ConversionStats {
                files_converted: records.len(),
                shapes_converted: records.iter().map(|record| record.shapes.len()).sum(),
            }
        }
    };
    stats.print_summary();
    Ok(stats)
}
