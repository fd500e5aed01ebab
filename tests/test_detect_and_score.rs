use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;

use umbra::models::{EclipseRecord, append_record};
use umbra::params::ParameterSet;
use umbra::{detection, scoring};

/// End-to-end: a synthetic eclipse disk goes through detection, the output
/// record file round-trips through the scorer, and scoring a run against
/// itself is a perfect zero.
#[test]
fn detect_writes_scoreable_records() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_dir = dir.path().join("images");
    std::fs::create_dir(&image_dir)?;

    let mut disk = GrayImage::from_pixel(200, 200, Luma([0]));
    draw_filled_circle_mut(&mut disk, (100, 100), 40, Luma([220]));
    disk.save(image_dir.join("disk.png"))?;

    let list = dir.path().join("images.txt");
    std::fs::write(&list, "disk.png\n")?;

    // Image is already at the size bound, so no rescaling error creeps in.
    let params = ParameterSet::parse("200_0_g_0_0_0_0_g_3_0_1_30_60_20_10_80")?;
    let out_path = detection::run_detection(&params, &list, &image_dir, dir.path())?;
    assert_eq!(
        out_path.file_name().unwrap().to_str().unwrap(),
        "output_run-200_0_g_0_0_0_0_g_3_0_1_30_60_20_10_80"
    );

    let detected = scoring::read_record_file(&out_path)?;
    assert_eq!(detected.len(), 1);
    let record = &detected["disk.png"];
    assert_eq!(record.image_type, "NC");

    let first = record.solar.expect("disk not detected");
    assert!((first.cx - 100.0).abs() <= 6.0, "cx = {}", first.cx);
    assert!((first.cy - 100.0).abs() <= 6.0, "cy = {}", first.cy);
    assert!((first.r - 40.0).abs() <= 6.0, "r = {}", first.r);

    // A run scored against itself has zero loss everywhere.
    let samples = scoring::score_datasets(&detected, &detected, false);
    let report = scoring::aggregate(&samples)?;
    assert_eq!(report.total, 0.0);
    assert_eq!(report.min, 0.0);
    assert_eq!(report.max, 0.0);

    Ok(())
}

/// Unreadable or missing images are skipped, not fatal for the run.
#[test]
fn missing_images_are_skipped() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_dir = dir.path().join("images");
    std::fs::create_dir(&image_dir)?;

    let list = dir.path().join("images.txt");
    std::fs::write(&list, "nonexistent.png\n")?;

    let params = ParameterSet::parse("200_0_g_0_0_0_0_g_3_0_1_30_60_20_10_80")?;
    let out_path = detection::run_detection(&params, &list, &image_dir, dir.path())?;
    let detected = scoring::read_record_file(&out_path)?;
    assert!(detected.is_empty());

    Ok(())
}

/// Ground-truth persistence appends one line per record and stays readable
/// by the scorer.
#[test]
fn appended_ground_truth_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("ground_truth.txt");

    let first = EclipseRecord {
        name: "a.jpg".to_string(),
        image_type: "partial".to_string(),
        solar: Some(umbra::Circle::new(644.0, 482.0, 85.0)),
        lunar: Some(umbra::Circle::new(600.0, 470.0, 83.0)),
    };
    let second = EclipseRecord {
        name: "b.jpg".to_string(),
        image_type: "total".to_string(),
        solar: Some(umbra::Circle::new(320.0, 240.0, 60.0)),
        lunar: None,
    };
    append_record(&path, &first)?;
    append_record(&path, &second)?;

    let records = scoring::read_record_file(&path)?;
    assert_eq!(records.len(), 2);
    assert_eq!(records["a.jpg"], first);
    assert_eq!(records["b.jpg"], second);

    Ok(())
}
