mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use common::*;
use zonedetect::{ModelSlot, SessionError, ViewingSession};

fn detection(left: f64, top: f64, class_id: usize, score: f32) -> Detection {
    Detection {
        bbox: Rect::new(left, top, 40.0, 20.0),
        class_id,
        score,
    }
}

#[test]
fn test_drag_sets_zone_in_image_pixels() -> anyhow::Result<()> {
    let mut session = ViewingSession::new(500.0);
    session.load_image(test_image(1000, 500))?;

    session.begin_selection(Point::new(100.0, 50.0))?;
    let live = session.update_selection(Point::new(50.0, 150.0));
    assert_eq!(live, Some(Rect::new(100.0, 50.0, -50.0, 100.0)));

    let zone = session.finish_selection(Point::new(50.0, 150.0))?;
    assert_eq!(zone, Rect::new(100.0, 100.0, 100.0, 200.0));
    assert_eq!(session.zone(), Some(zone));
    assert_eq!(session.update_selection(Point::new(0.0, 0.0)), None);
    Ok(())
}

#[test]
fn test_finish_without_drag_fails() -> anyhow::Result<()> {
    let mut session = ViewingSession::default();
    session.load_image(test_image(100, 100))?;
    assert_eq!(
        session.finish_selection(Point::new(1.0, 1.0)).unwrap_err(),
        ViewError::NoSelection
    );
    Ok(())
}

#[test]
fn test_overlay_follows_zoom_and_visibility() -> anyhow::Result<()> {
    let mut session = ViewingSession::new(500.0);
    session.load_image(test_image(1000, 500))?;
    session.set_detections(vec![
        detection(100.0, 100.0, 2, 0.9),
        detection(300.0, 100.0, 0, 0.8),
        detection(500.0, 100.0, 2, 0.7),
    ]);

    let groups = session.visible_overlay()?;
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].class_id, 0);
    assert_eq!(groups[1].class_id, 2);
    assert_eq!(groups[1].boxes.len(), 2);
    assert_eq!(groups[1].boxes[0].rect, Rect::new(50.0, 50.0, 20.0, 10.0));

    session.zoom_at(true, Point::new(0.0, 0.0))?;
    let zoomed = session.visible_overlay()?;
    assert_relative_eq!(zoomed[1].boxes[0].rect.width, 20.0 / 0.95, epsilon = 1e-9);

    assert!(!session.toggle_class(2));
    let groups = session.visible_overlay()?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].class_id, 0);
    assert_eq!(session.visible_overlay_in_image()[0].boxes[0].rect, Rect::new(300.0, 100.0, 40.0, 20.0));

    session.set_class_visible(2, true);
    assert!(session.is_class_visible(2));
    assert_eq!(session.detected_classes(), vec![0, 2]);
    Ok(())
}

#[test]
fn test_new_image_or_zone_clears_detections() -> anyhow::Result<()> {
    let mut session = ViewingSession::default();
    session.load_image(test_image(100, 100))?;
    session.set_zone(Rect::new(0.0, 0.0, 50.0, 50.0));
    session.set_detections(vec![detection(0.0, 0.0, 0, 0.9)]);

    session.set_zone(Rect::new(60.0, 60.0, -20.0, -20.0));
    assert!(session.detections().is_empty());
    assert_eq!(session.zone(), Some(Rect::new(40.0, 40.0, 20.0, 20.0)));

    session.set_detections(vec![detection(0.0, 0.0, 0, 0.9)]);
    session.load_image(test_image(200, 100))?;
    assert!(session.detections().is_empty());
    assert_eq!(session.zone(), None);
    Ok(())
}

#[tokio::test]
async fn test_session_detect_caches_results() -> anyhow::Result<()> {
    let raw = ssd_output(&[[0.1, 0.2, 0.5, 0.6]], &[0.9], &[2.0], 1);
    let (model, _backend) = fake_model(DetectorConfig::ssd_coco(), FakeBackend::returning(raw));
    model.load().await?;

    let mut session = ViewingSession::default();
    let pipeline = DetectionPipeline::new();
    assert!(matches!(
        session.detect(&pipeline, &model).await,
        Err(SessionError::View(ViewError::NoImage))
    ));

    session.load_image(test_image(300, 300))?;
    assert!(matches!(
        session.detect(&pipeline, &model).await,
        Err(SessionError::NoZone)
    ));

    session.set_zone(Rect::new(0.0, 0.0, 300.0, 300.0));
    let found = session.detect(&pipeline, &model).await?.len();
    assert_eq!(found, 1);
    assert_eq!(session.detections().len(), 1);

    session.clear_detections();
    assert!(session.detections().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_model_slot_switches_models() -> anyhow::Result<()> {
    let (first, first_backend) = fake_model(DetectorConfig::yolo2_coco(), FakeBackend::default());
    let (second, second_backend) = fake_model(DetectorConfig::ssd_coco(), FakeBackend::default());
    let (first, second) = (Arc::new(first), Arc::new(second));

    let mut slot = ModelSlot::new();
    assert!(matches!(slot.require(), Err(SessionError::NoModel)));

    slot.select(first.clone()).await?;
    slot.select(first.clone()).await?;
    assert_eq!(first_backend.loads(), 1);
    assert_eq!(first_backend.unloads(), 0);

    slot.select(second.clone()).await?;
    assert!(!first.is_loaded().await);
    assert!(second.is_loaded().await);
    assert_eq!(slot.require()?.title(), "Ssd-Coco");

    slot.release().await?;
    assert!(!second.is_loaded().await);
    assert_eq!(second_backend.unloads(), 1);
    assert!(slot.active().is_none());
    Ok(())
}
