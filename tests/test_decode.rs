mod common;

use approx::assert_relative_eq;
use common::*;
use zonedetect::detection::decode::{
    DecodeStrategy, DirectRegressionDecoder, GridAnchorDecoder, MultiScaleGridDecoder,
};

fn ssd_decoder() -> DirectRegressionDecoder {
    DirectRegressionDecoder {
        class_offset: 2,
        class_count: 80,
    }
}

#[test]
fn test_direct_regression_scales_to_input() -> anyhow::Result<()> {
    let raw = ssd_output(&[[0.1, 0.2, 0.5, 0.6]], &[0.9], &[2.0], 1);
    let candidates = ssd_decoder().decode(&raw, InputSize::new(300, 300))?;

    assert_eq!(candidates.len(), 1);
    let c = candidates[0];
    let (left, top, right, bottom) = c.bbox.corners();
    assert_relative_eq!(left, 60.0, epsilon = 1e-4);
    assert_relative_eq!(top, 30.0, epsilon = 1e-4);
    assert_relative_eq!(right, 180.0, epsilon = 1e-4);
    assert_relative_eq!(bottom, 150.0, epsilon = 1e-4);
    assert_eq!(c.class_id, 0);
    assert_relative_eq!(c.score, 0.9);
    Ok(())
}

#[test]
fn test_direct_regression_respects_valid_count() -> anyhow::Result<()> {
    let raw = ssd_output(
        &[[0.0, 0.0, 0.5, 0.5], [0.5, 0.5, 1.0, 1.0], [0.2, 0.2, 0.3, 0.3]],
        &[0.8, 0.7, 0.6],
        &[3.0, 4.0, 500.0],
        2,
    );
    let candidates = ssd_decoder().decode(&raw, InputSize::new(100, 200))?;

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[1].class_id, 2);
    // rows scale by height, columns by width
    assert_relative_eq!(candidates[1].bbox.left, 50.0, epsilon = 1e-4);
    assert_relative_eq!(candidates[1].bbox.top, 100.0, epsilon = 1e-4);
    Ok(())
}

#[test]
fn test_direct_regression_rejects_bad_output() {
    let input = InputSize::new(300, 300);

    let too_few = RawOutput::new(vec![tensor(&[1, 4], vec![0.0; 4])]);
    assert!(matches!(
        ssd_decoder().decode(&too_few, input),
        Err(DetectError::DecodeError(_))
    ));

    let count_too_large = ssd_output(&[[0.1, 0.1, 0.2, 0.2]], &[0.9], &[2.0], 3);
    assert!(matches!(
        ssd_decoder().decode(&count_too_large, input),
        Err(DetectError::DecodeError(_))
    ));

    let mismatched = RawOutput::new(vec![
        tensor(&[2, 4], vec![0.0; 8]),
        tensor(&[1], vec![0.5]),
        tensor(&[2], vec![2.0, 2.0]),
        tensor(&[1], vec![1.0]),
    ]);
    assert!(matches!(
        ssd_decoder().decode(&mismatched, input),
        Err(DetectError::DecodeError(_))
    ));
}

#[test]
fn test_direct_regression_skips_unknown_classes() -> anyhow::Result<()> {
    // index 1 is below the offset and 90 is past the table; only the middle box has a label
    let raw = ssd_output(
        &[[0.1, 0.1, 0.2, 0.2], [0.3, 0.3, 0.4, 0.4], [0.5, 0.5, 0.6, 0.6]],
        &[0.9, 0.8, 0.7],
        &[1.0, 3.0, 90.0],
        3,
    );
    let candidates = ssd_decoder().decode(&raw, InputSize::new(100, 100))?;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].class_id, 1);
    assert_relative_eq!(candidates[0].score, 0.8);
    Ok(())
}

/// 2x2 grid, one anchor of one cell, two classes. Only cell (row 0, col 1)
/// is confident.
fn single_head() -> RawOutput {
    let mut data = vec![0.0f32; 2 * 2 * 7];
    let cell = 7;
    data[cell + 4] = 10.0;
    data[cell + 6] = 5.0;
    RawOutput::new(vec![tensor(&[2, 2, 1, 7], data)])
}

fn single_decoder() -> GridAnchorDecoder {
    GridAnchorDecoder {
        anchors: vec![[1.0, 1.0]],
        class_count: 2,
    }
}

#[test]
fn test_grid_anchor_decodes_every_cell() -> anyhow::Result<()> {
    let candidates = single_decoder().decode(&single_head(), InputSize::new(416, 416))?;
    assert_eq!(candidates.len(), 4);

    let hit = candidates[1];
    assert_eq!(hit.class_id, 1);
    assert!(hit.score > 0.99);
    let (left, top, right, bottom) = hit.bbox.corners();
    assert_relative_eq!(left, 208.0, epsilon = 1e-3);
    assert_relative_eq!(top, 0.0, epsilon = 1e-3);
    assert_relative_eq!(right, 416.0, epsilon = 1e-3);
    assert_relative_eq!(bottom, 208.0, epsilon = 1e-3);

    // flat logits: objectness 0.5, class tie goes to class 0 at 0.5
    let quiet = candidates[0];
    assert_eq!(quiet.class_id, 0);
    assert_relative_eq!(quiet.score, 0.25, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_grid_anchor_huge_size_logits_stay_finite() -> anyhow::Result<()> {
    let mut data = vec![0.0f32; 7];
    data[2] = 100.0;
    data[3] = 100.0;
    data[4] = 10.0;
    data[5] = 5.0;
    let raw = RawOutput::new(vec![tensor(&[1, 1, 1, 7], data)]);

    let candidates = single_decoder().decode(&raw, InputSize::new(32, 32))?;
    assert_eq!(candidates.len(), 1);
    let (left, top, right, bottom) = candidates[0].bbox.corners();
    assert!([left, top, right, bottom].iter().all(|v| v.is_finite()));
    assert!(left < 0.0 && right > 32.0);

    // past f64 range the box has no usable position and is dropped
    let mut data = vec![0.0f32; 7];
    data[2] = 1000.0;
    data[4] = 10.0;
    let raw = RawOutput::new(vec![tensor(&[1, 1, 1, 7], data)]);
    assert!(single_decoder().decode(&raw, InputSize::new(32, 32))?.is_empty());
    Ok(())
}

#[test]
fn test_grid_anchor_accepts_flat_and_batched_layouts() -> anyhow::Result<()> {
    let expected = single_decoder().decode(&single_head(), InputSize::new(416, 416))?;
    let data: Vec<f32> = single_head().tensors[0].iter().copied().collect();

    let flat = RawOutput::new(vec![tensor(&[2, 2, 7], data.clone())]);
    assert_eq!(
        single_decoder().decode(&flat, InputSize::new(416, 416))?,
        expected
    );

    let batched = RawOutput::new(vec![tensor(&[1, 2, 2, 1, 7], data)]);
    assert_eq!(
        single_decoder().decode(&batched, InputSize::new(416, 416))?,
        expected
    );
    Ok(())
}

#[test]
fn test_grid_anchor_rejects_wrong_depth() {
    let raw = RawOutput::new(vec![tensor(&[2, 2, 1, 6], vec![0.0; 24])]);
    assert!(matches!(
        single_decoder().decode(&raw, InputSize::new(416, 416)),
        Err(DetectError::DecodeError(_))
    ));

    assert!(matches!(
        single_decoder().decode(&RawOutput::default(), InputSize::new(416, 416)),
        Err(DetectError::DecodeError(_))
    ));
}

#[test]
fn test_multi_scale_sizes_relative_to_input() -> anyhow::Result<()> {
    let decoder = MultiScaleGridDecoder {
        heads: vec![vec![[208.0, 104.0]], vec![[10.0, 10.0]]],
        class_count: 1,
    };
    let raw = RawOutput::new(vec![
        tensor(&[1, 1, 1, 6], vec![0.0; 6]),
        tensor(&[2, 2, 1, 6], vec![0.0; 24]),
    ]);

    let candidates = decoder.decode(&raw, InputSize::new(416, 416))?;
    assert_eq!(candidates.len(), 1 + 4);

    let first = candidates[0];
    let (left, top, right, bottom) = first.bbox.corners();
    assert_relative_eq!(left, 104.0, epsilon = 1e-3);
    assert_relative_eq!(top, 156.0, epsilon = 1e-3);
    assert_relative_eq!(right, 312.0, epsilon = 1e-3);
    assert_relative_eq!(bottom, 260.0, epsilon = 1e-3);
    // sigmoid objectness times sigmoid class confidence
    assert_relative_eq!(first.score, 0.25, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_multi_scale_head_count_must_match() {
    let decoder = MultiScaleGridDecoder {
        heads: vec![vec![[10.0, 10.0]], vec![[20.0, 20.0]]],
        class_count: 1,
    };
    let raw = RawOutput::new(vec![tensor(&[1, 1, 1, 6], vec![0.0; 6])]);
    assert!(matches!(
        decoder.decode(&raw, InputSize::new(416, 416)),
        Err(DetectError::DecodeError(_))
    ));
}

#[test]
fn test_presets_choose_matching_strategy() {
    assert_eq!(
        DetectorConfig::yolo2_coco().strategy().name(),
        "Grid Anchor"
    );
    assert_eq!(
        DetectorConfig::yolo3_f18().strategy().name(),
        "Multi-Scale Grid Anchor"
    );
    assert_eq!(
        DetectorConfig::ssd_coco().strategy().name(),
        "Direct Regression"
    );
}
