use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConvertError, Result};

/// Command-line arguments for converting between custom JSON, VOC, YOLO and COCO.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Type of shapes to convert
    #[arg(long = "task", value_enum, default_value = "rectangle")]
    pub task: Task,

    /// Conversion direction
    #[arg(long = "mode", value_enum)]
    pub mode: Mode,

    /// Input directory (or input COCO file for coco2custom)
    #[arg(long = "src_path")]
    pub src_path: PathBuf,

    /// Output directory
    #[arg(long = "dst_path")]
    pub dst_path: Option<PathBuf>,

    /// Image directory, used by yolo2custom and coco2custom
    #[arg(long = "img_path")]
    pub img_path: Option<PathBuf>,

    /// Classes file with one label per line
    #[arg(long = "classes")]
    pub classes: Option<PathBuf>,

    /// Proportion of the dataset to use for training
    #[arg(long = "train_size", default_value_t = 0.9, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of the dataset to use for validation (and testing)
    #[arg(long = "val_size", default_value_t = 0.1, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Skip the label validation that gates custom2yolo
    #[arg(long = "skip_validation")]
    pub skip_validation: bool,

    /// Do not build the train/val/test dataset after custom2yolo
    #[arg(long = "no_split")]
    pub no_split: bool,

    /// Tag shapes read back from YOLO polygons as `rectangle`
    #[arg(long = "legacy_polygon_type")]
    pub legacy_polygon_type: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Task {
    Rectangle,
    Polygon,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Mode {
    #[value(name = "custom2voc")]
    CustomToVoc,
    #[value(name = "voc2custom")]
    VocToCustom,
    #[value(name = "custom2yolo")]
    CustomToYolo,
    #[value(name = "yolo2custom")]
    YoloToCustom,
    #[value(name = "custom2coco")]
    CustomToCoco,
    #[value(name = "coco2custom")]
    CocoToCustom,
}

impl Task {
    pub fn supports(self, mode: Mode) -> bool {
        match self {
            Task::Rectangle => true,
            Task::Polygon => matches!(mode, Mode::CustomToYolo | Mode::YoloToCustom),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

impl Args {
    /// Check the task/mode combination and the paths the mode needs.
    pub fn validate(&self) -> Result<()> {
        if !self.task.supports(self.mode) {
            return Err(ConvertError::InvalidConfig(format!(
                "polygon tasks only support custom2yolo and yolo2custom, got {}",
                self.mode
            )));
        }
        match self.mode {
            Mode::CustomToVoc | Mode::CustomToYolo | Mode::CustomToCoco => {
                self.require_dst()?;
            }
            Mode::VocToCustom => {
                self.output_dir()?;
            }
            Mode::YoloToCustom => {
                self.require_img()?;
            }
            Mode::CocoToCustom => {
                self.require_dst()?;
                self.require_img()?;
            }
        }
        Ok(())
    }

    pub fn require_dst(&self) -> Result<&Path> {
        self.dst_path.as_deref().ok_or_else(|| {
            ConvertError::InvalidConfig(format!("{} requires --dst_path", self.mode))
        })
    }

    pub fn require_img(&self) -> Result<&Path> {
        self.img_path.as_deref().ok_or_else(|| {
            ConvertError::InvalidConfig(format!("{} requires --img_path", self.mode))
        })
    }

    /// Destination for per-image custom JSON: `--dst_path`, else `--img_path`.
    pub fn output_dir(&self) -> Result<&Path> {
        self.dst_path
            .as_deref()
            .or(self.img_path.as_deref())
            .ok_or_else(|| {
                ConvertError::InvalidConfig(format!(
                    "{} requires --dst_path or --img_path",
                    self.mode
                ))
            })
    }
}

// Validate that the size lies strictly between 0.0 and 1.0
pub fn validate_size(s: &str) -> std::result::Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val < 1.0 => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0 (exclusive)".to_string()),
    }
}
