use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use label_converter::batch::{
    export_voc_dir, export_yolo_dir, import_voc_dir, import_yolo_dir, SplitOptions,
    YoloExportOptions,
};
use label_converter::coco::CocoFile;
use label_converter::dataset::{partition_dataset, Sample, DATASET_DIR, MANIFEST_FILE};
use label_converter::rectangle::COCO_OUTPUT_FILE;
use label_converter::utils::{read_json, read_record, write_record};
use label_converter::validator::validate_batch;
use label_converter::{
    AnnotationRecord, ClassTable, ConflictCatalog, Converter, ErrorKind, ImageSizeProbe,
    PolygonConverter, RectangleConverter, Result, Shape, ShapeType,
};

struct FixedImageSize(u32, u32);

impl ImageSizeProbe for FixedImageSize {
    fn dimensions(&self, _path: &Path) -> Result<(u32, u32)> {
        Ok((self.0, self.1))
    }
}

fn classes() -> ClassTable {
    ClassTable::new(["car", "person", "dog"]).unwrap()
}

fn record(image: &str, width: u32, height: u32, shapes: Vec<Shape>) -> AnnotationRecord {
    let mut record = AnnotationRecord::new(image, width, height);
    record.shapes = shapes;
    record
}

fn rect(label: &str, first: (f64, f64), second: (f64, f64)) -> Shape {
    Shape::rectangle(label, None, first, second)
}

fn write_json(dir: &Path, name: &str, record: &AnnotationRecord) -> PathBuf {
    let path = dir.join(name);
    write_record(&path, record).unwrap();
    path
}

#[test]
fn test_custom_voc_custom_preserves_boxes() {
    let dir = tempfile::tempdir().unwrap();
    let source = record(
        "photos/street.jpg",
        640,
        480,
        vec![
            rect("car", (10.0, 20.0), (110.0, 220.0)),
            rect("person", (300.0, 40.0), (350.0, 200.0)),
        ],
    );
    let input = write_json(dir.path(), "street.json", &source);
    let conv = RectangleConverter::new(classes());

    let xml_path = dir.path().join("street.xml");
    assert_eq!(conv.custom_to_voc(&input, &xml_path).unwrap(), 2);
    let xml = fs::read_to_string(&xml_path).unwrap();
    assert!(xml.contains("<filename>street.jpg</filename>"));
    assert!(xml.contains("<name>car</name>"), "{}", xml);

    let back_path = dir.path().join("back.json");
    conv.voc_to_custom(&xml_path, &back_path).unwrap();
    let back = read_record(&back_path).unwrap();
    assert_eq!(back.image_path, "street.jpg");
    assert_eq!((back.image_width, back.image_height), (640, 480));
    assert_eq!(back.shapes.len(), 2);
    for (a, b) in source.shapes.iter().zip(&back.shapes) {
        assert_eq!(a.label, b.label);
        assert_eq!(a.points, b.points);
        assert_eq!(b.shape_type, ShapeType::Rectangle);
        assert!(b.flags.is_empty());
    }
}

#[test]
fn test_voc_directory_import_only_reads_xml() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("voc");
    fs::create_dir(&src).unwrap();
    fs::write(
        src.join("a.xml"),
        "<annotation><filename>a.jpg</filename><size><width>4</width><height>3</height><depth>3</depth></size></annotation>",
    )
    .unwrap();
    fs::write(src.join("notes.txt"), "not xml").unwrap();

    let out = dir.path().join("out");
    let stats = import_voc_dir(&RectangleConverter::new(classes()), &src, &out).unwrap();
    assert_eq!(stats.files_converted, 1);
    assert!(read_record(&out.join("a.json")).unwrap().shapes.is_empty());
}

#[test]
fn test_voc_directory_export_keeps_dotted_stems() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    fs::create_dir(&src).unwrap();
    for name in ["frame.001", "frame.002"] {
        let shapes = vec![rect("car", (1.0, 2.0), (3.0, 4.0))];
        let image = format!("{}.jpg", name);
        write_json(&src, &format!("{}.json", name), &record(&image, 8, 8, shapes));
    }
    fs::write(src.join("frame.003.txt"), "not json").unwrap();

    let out = dir.path().join("voc");
    let stats = export_voc_dir(&RectangleConverter::new(classes()), &src, &out).unwrap();
    assert_eq!(stats.files_converted, 2);
    let mut written: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["frame.001.xml", "frame.002.xml"]);
    let xml = fs::read_to_string(out.join("frame.002.xml")).unwrap();
    assert!(xml.contains("<filename>frame.002.jpg</filename>"));
}

#[test]
fn test_custom_yolo_custom_within_one_pixel() {
    let dir = tempfile::tempdir().unwrap();
    let source = record(
        "a.jpg",
        637,
        471,
        vec![
            rect("dog", (12.7, 33.2), (201.9, 240.4)),
            rect("car", (0.0, 0.0), (636.0, 470.0)),
            rect("person", (555.5, 100.25), (600.75, 440.0)),
        ],
    );
    let input = write_json(dir.path(), "a.json", &source);
    let conv = RectangleConverter::with_probe(classes(), Box::new(FixedImageSize(637, 471)));

    let txt = dir.path().join("a.txt");
    conv.custom_to_yolo(&input, &txt).unwrap();
    let content = fs::read_to_string(&txt).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.starts_with("2 "));

    let back_path = dir.path().join("back.json");
    conv.yolo_to_custom(&txt, &back_path, Path::new("a.jpg")).unwrap();
    let back = read_record(&back_path).unwrap();
    assert_eq!(back.image_path, "a.jpg");
    for (a, b) in source.shapes.iter().zip(&back.shapes) {
        assert_eq!(a.label, b.label);
        for (p, q) in a.points.iter().zip(&b.points) {
            assert!((p.0 - q.0).abs() <= 1.0 && (p.1 - q.1).abs() <= 1.0, "{:?} vs {:?}", p, q);
            assert_eq!(q.0.fract(), 0.0);
        }
    }
}

#[test]
fn test_custom_yolo_unknown_label_is_lookup_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_json(
        dir.path(),
        "a.json",
        &record("a.jpg", 10, 10, vec![rect("cat", (0.0, 0.0), (1.0, 1.0))]),
    );
    let err = RectangleConverter::new(classes())
        .custom_to_yolo(&input, &dir.path().join("a.txt"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn test_malformed_yolo_line_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let txt = dir.path().join("a.txt");
    fs::write(&txt, "0 0.5 0.5 0.1 0.1\n0 0.5\n").unwrap();
    let conv = RectangleConverter::with_probe(classes(), Box::new(FixedImageSize(10, 10)));
    let err = conv
        .yolo_to_custom(&txt, &dir.path().join("a.json"), Path::new("a.jpg"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.to_string().contains("line 2"));
}

#[test]
fn test_custom_to_coco_counts_and_ids() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    fs::create_dir(&src).unwrap();
    write_json(
        &src,
        "b.json",
        &record(
            "b.png",
            200,
            100,
            vec![
                rect("person", (50.0, 60.0), (10.0, 20.0)),
                rect("dog", (1.0, 1.0), (3.0, 4.0)),
            ],
        ),
    );
    write_json(
        &src,
        "a.json",
        &record("imgs/a.jpg", 64, 48, vec![rect("car", (1.0, 2.0), (11.0, 7.0))]),
    );
    write_json(&src, "c.json", &record("c.jpg", 8, 8, vec![]));
    fs::write(src.join("readme.md"), "ignored").unwrap();

    let out = dir.path().join("coco");
    fs::create_dir(&out).unwrap();
    let conv = RectangleConverter::new(classes());
    let coco = conv.custom_to_coco(&src, &out).unwrap();
    let on_disk: CocoFile = read_json(&out.join(COCO_OUTPUT_FILE)).unwrap();
    assert_eq!(coco, on_disk);

    assert_eq!(coco.images.len(), 3);
    assert_eq!(coco.annotations.len(), 3);
    let names: Vec<_> = coco.images.iter().map(|i| (i.id, i.file_name.as_str())).collect();
    assert_eq!(names, vec![(1, "a.jpg"), (2, "b.png"), (3, "c.jpg")]);
    let ids: Vec<_> = coco.annotations.iter().map(|a| (a.id, a.image_id)).collect();
    assert_eq!(ids, vec![(1, 1), (2, 2), (3, 2)]);

    let labels = ["car", "person", "dog"];
    for (annotation, label) in coco.annotations.iter().zip(labels) {
        assert_eq!(
            annotation.category_id as usize - 1,
            classes().index_of(label).unwrap()
        );
        assert_eq!(annotation.area, annotation.bbox[2] * annotation.bbox[3]);
        assert_eq!(annotation.iscrowd, 0);
    }
    // min/max normalized even when the corners are stored inverted
    assert_eq!(coco.annotations[1].bbox, [10.0, 20.0, 40.0, 40.0]);
    assert_eq!(coco.categories.len(), 3);
    assert_eq!(coco.categories[0].id, 1);
}

#[test]
fn test_coco_to_custom_writes_one_file_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    fs::create_dir(&images).unwrap();
    fs::write(images.join("a.jpg"), "").unwrap();
    fs::write(images.join("b.png"), "").unwrap();

    let coco_path = dir.path().join("coco.json");
    fs::write(
        &coco_path,
        r#"{
            "info": {"description": "x"},
            "licenses": [],
            "categories": [{"id": 1, "name": "car"}, {"id": 2, "name": "person"}],
            "images": [
                {"id": 1, "file_name": "a.jpg", "width": 64, "height": 48},
                {"id": 2, "file_name": "b", "width": 20, "height": 10}
            ],
            "annotations": [
                {"id": 1, "image_id": 2, "category_id": 2, "bbox": [1, 2, 3, 4], "area": 12, "iscrowd": 0},
                {"id": 2, "image_id": 1, "category_id": 1, "bbox": [5, 5, 10, 10], "area": 100, "iscrowd": 0}
            ]
        }"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let conv = RectangleConverter::new(ClassTable::default());
    let records = conv.coco_to_custom(&coco_path, &out, &images).unwrap();
    assert_eq!(records.len(), 2);

    let a = read_record(&out.join("a.json")).unwrap();
    assert_eq!(a.shapes[0].label, "car");
    assert_eq!(a.shapes[0].points, vec![(5.0, 5.0), (15.0, 15.0)]);
    let b = read_record(&out.join("b.json")).unwrap();
    assert_eq!(b.image_path, "b.png");
    assert_eq!(b.shapes[0].label, "person");
    assert_eq!((b.image_width, b.image_height), (20, 10));
}

#[test]
fn test_coco_round_trip_through_image_directory() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    let images = dir.path().join("images");
    fs::create_dir(&src).unwrap();
    fs::create_dir(&images).unwrap();
    fs::write(images.join("a.jpg"), "").unwrap();
    let shapes = vec![rect("dog", (4.0, 6.0), (40.0, 60.0))];
    write_json(&src, "a.json", &record("a.jpg", 100, 100, shapes.clone()));

    let conv = RectangleConverter::new(classes());
    conv.custom_to_coco(&src, dir.path()).unwrap();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    conv.coco_to_custom(&dir.path().join(COCO_OUTPUT_FILE), &out, &images)
        .unwrap();
    let back = read_record(&out.join("a.json")).unwrap();
    assert_eq!(back.shapes[0].label, "dog");
    assert_eq!(back.shapes[0].points, shapes[0].points);
}

#[test]
fn test_polygon_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let vertices = vec![(12.5, 40.0), (300.25, 41.0), (280.0, 199.9), (15.0, 180.0)];
    let input = write_json(
        dir.path(),
        "a.json",
        &record("a.jpg", 320, 200, vec![Shape::polygon("person", vertices.clone())]),
    );
    let conv = PolygonConverter::with_probe(classes(), Box::new(FixedImageSize(320, 200)));
    let txt = dir.path().join("a.txt");
    conv.custom_to_yolo(&input, &txt).unwrap();
    let content = fs::read_to_string(&txt).unwrap();
    assert_eq!(content.split_whitespace().count(), 1 + vertices.len() * 2);

    let back_path = dir.path().join("back.json");
    conv.yolo_to_custom(&txt, &back_path, Path::new("a.jpg")).unwrap();
    let back = read_record(&back_path).unwrap();
    assert_eq!(back.shapes[0].shape_type, ShapeType::Polygon);
    for (p, q) in vertices.iter().zip(&back.shapes[0].points) {
        assert!((p.0 - q.0).abs() < 1e-9 && (p.1 - q.1).abs() < 1e-9);
    }
}

#[test]
fn test_validate_batch_collects_every_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        ("dup.json", ["Antenna", "Antenna"]),
        ("ok.json", ["Antenna", "Antenna-Cover"]),
        ("cross.json", ["Antenna", "placeholder-front"]),
        ("cover.json", ["Antenna-Cover", "1001-03A"]),
    ];
    let files: Vec<PathBuf> = cases
        .iter()
        .map(|(name, labels)| {
            let shapes = labels
                .iter()
                .map(|label| rect(label, (0.0, 0.0), (1.0, 1.0)))
                .collect();
            write_json(dir.path(), name, &record("a.jpg", 1, 1, shapes))
        })
        .collect();
    let failures = validate_batch(&files, &ConflictCatalog::default()).unwrap();
    let failed: Vec<_> = failures.iter().map(|f| f.path.clone()).collect();
    assert_eq!(failed, vec![files[0].clone(), files[2].clone(), files[3].clone()]);
}

#[test]
fn test_failed_validation_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    fs::create_dir(&src).unwrap();
    let shapes = vec![
        rect("Antenna", (0.0, 0.0), (1.0, 1.0)),
        rect("placeholder-front", (0.0, 0.0), (1.0, 1.0)),
    ];
    write_json(&src, "bad.json", &record("bad.jpg", 10, 10, shapes));
    write_json(&src, "fine.json", &record("fine.jpg", 10, 10, vec![]));

    let dst = dir.path().join("yolo");
    let conv = Converter::Rectangle(RectangleConverter::new(
        ClassTable::new(["Antenna", "placeholder-front"]).unwrap(),
    ));
    let options = YoloExportOptions {
        validate: true,
        split: None,
    };
    let err =
        export_yolo_dir(&conv, &src, &dst, &ConflictCatalog::default(), &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!dst.exists());
}

#[test]
fn test_export_yolo_dir_builds_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    fs::create_dir(&src).unwrap();
    for i in 0..10 {
        let name = format!("img{:02}", i);
        fs::write(src.join(format!("{}.JPG", name)), "jpeg").unwrap();
        write_json(
            &src,
            &format!("{}.json", name),
            &record(
                &format!("{}.JPG", name),
                100,
                100,
                vec![rect("car", (10.0, 10.0), (20.0, 30.0))],
            ),
        );
    }

    let dst = dir.path().join("yolo");
    let conv = Converter::Rectangle(RectangleConverter::new(classes()));
    let options = YoloExportOptions {
        validate: true,
        split: Some(SplitOptions {
            train_size: 0.9,
            val_size: 0.1,
            seed: 42,
        }),
    };
    let stats =
        export_yolo_dir(&conv, &src, &dst, &ConflictCatalog::default(), &options).unwrap();
    assert_eq!(stats.files_converted, 10);
    assert_eq!(stats.shapes_converted, 10);

    let root = dst.join(DATASET_DIR);
    let listing = |sub: &str| -> HashSet<String> {
        fs::read_dir(root.join(sub))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    };
    assert_eq!(listing("images/train").len(), 9);
    assert_eq!(listing("labels/train").len(), 9);
    assert_eq!(listing("images/val").len(), 1);
    assert_eq!(listing("images/test"), listing("images/val"));
    assert_eq!(listing("labels/test"), listing("labels/val"));
    assert!(listing("images/train").is_disjoint(&listing("images/val")));

    let manifest = fs::read_to_string(root.join(MANIFEST_FILE)).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();
    assert_eq!(yaml["nc"].as_u64(), Some(3));
    assert_eq!(yaml["names"][1].as_str(), Some("person"));
    assert!(yaml["test"].as_str().unwrap().ends_with("test"));
}

#[test]
fn test_export_yolo_dir_keeps_dotted_stems() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("json");
    fs::create_dir(&src).unwrap();
    for name in ["frame.001", "frame.002"] {
        let shapes = vec![rect("person", (1.0, 1.0), (5.0, 5.0))];
        let image = format!("{}.jpg", name);
        write_json(&src, &format!("{}.json", name), &record(&image, 10, 10, shapes));
    }

    let dst = dir.path().join("yolo");
    let conv = Converter::Rectangle(RectangleConverter::new(classes()));
    let options = YoloExportOptions {
        validate: true,
        split: None,
    };
    export_yolo_dir(&conv, &src, &dst, &ConflictCatalog::default(), &options).unwrap();
    let mut written: Vec<_> = fs::read_dir(&dst)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["frame.001.txt", "frame.002.txt"]);
    assert!(fs::read_to_string(dst.join("frame.001.txt")).unwrap().starts_with("1 "));
}

#[test]
fn test_partition_rejects_oversized_split() {
    let dir = tempfile::tempdir().unwrap();
    let samples: Vec<Sample> = (0..3)
        .map(|i| Sample {
            image: dir.path().join(format!("{}.jpg", i)),
            label: dir.path().join(format!("{}.txt", i)),
        })
        .collect();
    let err = partition_dataset(&samples, &[], &dir.path().join("ds"), 0.9, 0.5, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_import_yolo_dir_requires_matching_image() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels");
    let images = dir.path().join("images");
    fs::create_dir(&labels).unwrap();
    fs::create_dir(&images).unwrap();
    fs::write(labels.join("a.txt"), "0 0.5 0.5 0.5 0.5\n").unwrap();
    fs::write(labels.join("b.txt"), "1 0.5 0.5 0.2 0.2\n").unwrap();
    image::RgbImage::new(50, 40).save(images.join("a.png")).unwrap();

    let conv = Converter::Polygon(PolygonConverter::new(classes()));
    let err = import_yolo_dir(&conv, &labels, &images, &images).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lookup);

    image::RgbImage::new(50, 40).save(images.join("b.png")).unwrap();
    let conv = Converter::Rectangle(RectangleConverter::new(classes()));
    let stats = import_yolo_dir(&conv, &labels, &images, &images).unwrap();
    assert_eq!(stats.files_converted, 2);
    let a = read_record(&images.join("a.json")).unwrap();
    assert_eq!((a.image_width, a.image_height), (50, 40));
    assert_eq!(a.shapes[0].points, vec![(12.0, 10.0), (37.0, 30.0)]);
}
