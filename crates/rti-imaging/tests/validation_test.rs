//! End-to-end validation of the RTI pipeline against hand-checkable results

use approx::assert_abs_diff_eq;
use ndarray::{array, Array1};
use rti_imaging::{
    build_projection, image_peak, Calibrator, Frame, FrameOutcome, ImagingParams, PixelGrid,
    Point2, RenderConfig, RenderFrame, RtiConfig, RtiError, SensorLayout, StreamConfig,
    StreamPhase, StreamState, WeightMatrix,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn square(side: f64) -> SensorLayout {
    SensorLayout::from_xy(&[(0.0, 0.0), (0.0, side), (side, 0.0), (side, side)]).unwrap()
}

/// Large ellipses cover every pixel, so each link weights all pixels equally
#[test]
fn validate_uniform_weights_for_covering_ellipse() {
    let layout = square(1.0);
    let grid = PixelGrid::from_layout(&layout, 0.5).unwrap();
    assert_eq!(grid.len(), 4);

    let weights = WeightMatrix::build(&grid, &layout, 100.0).unwrap();
    assert_eq!(weights.matrix().dim(), (12, 4));
    for &w in weights.matrix().iter() {
        assert_abs_diff_eq!(w, 0.25, epsilon = 1e-12);
    }
}

/// Rows with a non-empty ellipse sum to one, empty rows to zero
#[test]
fn validate_weight_rows_normalized() {
    let layout = SensorLayout::from_xy(&[(0.0, 0.0), (0.3, 2.5), (2.0, 0.4), (2.2, 2.1), (1.1, 0.0)])
        .unwrap();
    let grid = PixelGrid::from_layout(&layout, 0.25).unwrap();
    let weights = WeightMatrix::build(&grid, &layout, 0.05).unwrap();

    for (link, row) in weights.matrix().rows().into_iter().enumerate() {
        let sum = row.sum();
        if weights.pixels_in()[link] > 0 {
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        } else {
            assert_eq!(sum, 0.0);
        }
    }
}

/// Four sensors on one channel need 12 readings; 11 is rejected untouched
#[test]
fn validate_frame_length_mismatch() {
    init_tracing();
    let layout = square(1.0);
    let recon = build_projection(&layout, &ImagingParams { pixel_spacing: 0.5, ..Default::default() })
        .unwrap();
    let mut state = StreamState::new(layout.len(), StreamConfig::default()).unwrap();
    assert_eq!(state.frame_len(), 12);

    let err = state
        .estimate_frame(&recon, &Frame::new(vec![-50.0; 11], 0))
        .unwrap_err();
    assert!(matches!(err, RtiError::ConfigMismatch { expected: 12, actual: 11 }));
    assert!(!err.is_setup_error());
    assert_eq!(state.statistics().frames_seen, 0);
    assert_eq!(state.phase(), StreamPhase::Warmup);
}

/// With one of two channels kept, the stronger mean becomes the baseline
#[test]
fn validate_top_channel_selection() {
    let mut cal = Calibrator::new(2, 1, -10.0);
    cal.accumulate(&[-40.0, -55.0]).unwrap();
    let calibration = cal.finish(1).unwrap();
    assert_eq!(calibration.baseline(), &array![-40.0]);
}

/// Ties go to the pixel met first in row-major order
#[test]
fn validate_peak_tie_break() {
    let image = array![[1.0, 5.0], [5.0, 0.0]];
    let (peak, value) = image_peak(&image, &[0.0, 0.5], &[0.0, 0.5]).unwrap();
    assert_eq!(peak, Point2::new(0.5, 0.0));
    assert_eq!(value, 5.0);
}

/// A quiet network images to exactly zero
#[test]
fn validate_zero_scores_give_zero_image() {
    let recon = build_projection(&square(2.0), &ImagingParams::default()).unwrap();
    let image = recon.image(Array1::zeros(12).view()).unwrap();
    assert!(image.iter().all(|&v| v == 0.0));
}

/// Setup is deterministic
#[test]
fn validate_projection_is_repeatable() {
    let params = ImagingParams { pixel_spacing: 0.25, ..Default::default() };
    let a = build_projection(&square(1.5), &params).unwrap();
    let b = build_projection(&square(1.5), &params).unwrap();
    assert_eq!(a.operator(), b.operator());
    assert_eq!(a.grid(), b.grid());
}

/// Collinear sensors cannot span a 2-D grid
#[test]
fn validate_degenerate_layout_rejected() {
    let layout = SensorLayout::from_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]).unwrap();
    let err = build_projection(&layout, &ImagingParams::default()).unwrap_err();
    assert!(matches!(err, RtiError::DegenerateGeometry(_)));
    assert!(err.is_setup_error());
}

/// A person standing on the bottom edge shows up there, and a render record
/// is produced on the decimation schedule
#[test]
fn validate_person_on_bottom_edge() {
    init_tracing();
    let layout = square(2.0);
    let config = RtiConfig::builder()
        .pixel_spacing(0.5)
        .excess_path_len(0.3)
        .calibration_frames(10)
        .build();
    config.validate().unwrap();

    let recon = build_projection(&layout, &config.imaging).unwrap();
    let mut state = StreamState::new(layout.len(), config.stream.clone()).unwrap();

    // Empty room with a little jitter and the occasional dropped packet
    for i in 0..10u64 {
        let mut rss: Vec<f64> = (0..12).map(|l| -50.0 - ((i + l) % 3) as f64).collect();
        if i % 4 == 1 {
            rss[(i % 12) as usize] = 127.0;
        }
        let outcome = state.estimate_frame(&recon, &Frame::new(rss, i * 100)).unwrap();
        assert!(matches!(outcome, FrameOutcome::Calibrating { .. }));
    }
    assert_eq!(state.phase(), StreamPhase::Ready);
    assert!(state.statistics().substituted_samples > 0);

    let baseline = state.previous_frame().unwrap().to_vec();
    let mut rss = baseline;
    // links (0, 2) and (2, 0) run along y = 0
    rss[1] -= 12.0;
    rss[6] -= 12.0;
    let estimate = state
        .estimate_frame(&recon, &Frame::new(rss, 1000))
        .unwrap()
        .into_estimate()
        .unwrap();

    let peak = estimate.peak.unwrap();
    assert_eq!(peak.y, 0.0);
    assert!(estimate.occupied, "peak value {}", estimate.peak_value);

    let render = config.render.clone();
    assert!(render.should_render(estimate.frame_index));
    let record = RenderFrame::from_estimate(&recon, &estimate, &render);
    assert_eq!(record.time_ms, Some(1000));
    assert_eq!(record.peak, Some(peak));
    assert_eq!(record.extent.to_array(), [0.0, 2.0, 0.0, 2.0]);
    assert!(record.to_json().unwrap().contains("\"time_ms\":1000"));

    let variance = state.variance_image(&recon).unwrap().unwrap();
    assert_eq!(variance.dim(), estimate.image.dim());
    assert!(variance.iter().all(|v| v.is_finite()));
    let record = RenderFrame::new(&recon, variance.clone(), &RenderConfig::default());
    assert_eq!(record.image, variance);
    assert_eq!(record.time_ms, None);
}

/// A link that never reports stays out of the image, whatever placeholder it sends
#[test]
fn validate_dead_link_is_inert() {
    init_tracing();
    let layout = square(2.0);
    let params = ImagingParams {
        pixel_spacing: 0.5,
        excess_path_len: 0.3,
        ..Default::default()
    };
    let recon = build_projection(&layout, &params).unwrap();
    let config = StreamConfig {
        calibration_frames: 3,
        ..StreamConfig::default()
    };

    for dead in [f64::NAN, 127.0] {
        let mut state = StreamState::new(layout.len(), config.clone()).unwrap();
        let frame = |t: u64, drop: f64| {
            let mut rss = vec![-50.0; 12];
            rss[4] = dead;
            // links (0, 2) and (2, 0) run along y = 0
            rss[1] -= drop;
            rss[6] -= drop;
            Frame::new(rss, t)
        };

        for t in 0..3 {
            state.estimate_frame(&recon, &frame(t, 0.0)).unwrap();
        }
        assert_eq!(state.calibration(), None);

        let quiet = state
            .estimate_frame(&recon, &frame(3, 0.0))
            .unwrap()
            .into_estimate()
            .unwrap();
        assert_eq!(state.calibration().unwrap().inert_links(), &[4]);
        assert!(quiet.scores.iter().all(|&s| s == 0.0), "dead = {dead}");
        assert!(!quiet.occupied);

        let estimate = state
            .estimate_frame(&recon, &frame(4, 12.0))
            .unwrap()
            .into_estimate()
            .unwrap();
        assert_eq!(estimate.scores[4], 0.0);
        assert!(estimate.image.iter().all(|v| v.is_finite()));
        assert_eq!(estimate.peak, Some(Point2::new(1.0, 0.0)));
        assert!(estimate.occupied, "peak value {}", estimate.peak_value);

        let variance = state.variance_image(&recon).unwrap().unwrap();
        assert!(variance.iter().all(|v| v.is_finite()));
    }
}

/// A reading exactly at the floor is used as-is but never enters the baseline
#[test]
fn validate_reading_at_floor() {
    let layout = square(1.0);
    let recon = build_projection(&layout, &ImagingParams { pixel_spacing: 0.5, ..Default::default() })
        .unwrap();
    let config = StreamConfig {
        calibration_frames: 2,
        ..StreamConfig::default()
    };
    let mut state = StreamState::new(layout.len(), config).unwrap();

    let mut rss = vec![-50.0; 12];
    state.estimate_frame(&recon, &Frame::new(rss.clone(), 0)).unwrap();
    rss[0] = -10.0;
    state.estimate_frame(&recon, &Frame::new(rss.clone(), 1)).unwrap();
    assert_eq!(state.statistics().substituted_samples, 0);
    assert_eq!(state.previous_frame().unwrap()[0], -10.0);

    let estimate = state
        .estimate_frame(&recon, &Frame::new(rss, 2))
        .unwrap()
        .into_estimate()
        .unwrap();
    // baseline for link 0 is -50 from the single accumulated reading
    assert_eq!(estimate.scores[0], -40.0);
}

/// Multi-channel frames are reduced with the ranking frozen at calibration
#[test]
fn validate_multichannel_stream() {
    let layout = SensorLayout::from_xy(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.5)]).unwrap();
    let recon = build_projection(&layout, &ImagingParams { pixel_spacing: 0.25, ..Default::default() })
        .unwrap();
    let config = StreamConfig {
        channels: 2,
        top_channels: 1,
        calibration_frames: 2,
        ..StreamConfig::default()
    };
    let mut state = StreamState::new(layout.len(), config).unwrap();
    assert_eq!(state.frame_len(), 12);

    // channel 1 is stronger on every pair
    let calm: Vec<f64> = (0..12).map(|i| if i < 6 { -70.0 } else { -45.0 }).collect();
    for t in 0..2 {
        state.estimate_frame(&recon, &Frame::new(calm.clone(), t)).unwrap();
    }

    // Weak channel moves, strong channel holds: no change in scores
    let mut rss = calm.clone();
    rss[0] = -85.0;
    let estimate = state
        .estimate_frame(&recon, &Frame::new(rss, 2))
        .unwrap()
        .into_estimate()
        .unwrap();
    assert!(estimate.scores.iter().all(|&s| s == 0.0));

    let ranking = state.calibration().unwrap().ranking();
    assert_eq!(ranking.top(0, 1).collect::<Vec<_>>(), vec![1]);
}
