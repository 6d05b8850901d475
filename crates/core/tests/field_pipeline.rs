//! Regression checks of the point-source field on volumes and probes

use approx::{assert_abs_diff_eq, assert_relative_eq};
use emsim_core::export::{self, Provenance};
use emsim_core::{
    Aabb, Events, EventsLoader, FieldKernel, LfpParams, PointSourceKernel, SamplePoints, Scene,
    Vec3, Volume,
};
use std::f32::consts::PI;
use std::fs;
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_volume_regression() {
    let mut aabb = Aabb::empty();
    aabb.add(&Vec3::new(-1000.0, -1500.0, -1000.0), 10.0);
    aabb.add(&Vec3::new(1000.0, 1500.0, 1000.0), 10.0);
    let mut volume = Volume::new(
        Vec3::new(17.78125, 24.59375, 17.78125),
        Vec3::new(256.0, 128.0, 256.0),
        &aabb,
    )
    .unwrap();
    assert_eq!(volume.size().x, 128);
    assert_eq!(volume.size().y, 128);
    assert_eq!(volume.size().z, 128);

    let mut events = Events::new(2).unwrap();
    events.add_event(&Vec3::new(-500.0, 0.0, 0.0), 5.0).unwrap();
    events.add_event(&Vec3::new(500.0, 0.0, 0.0), 5.0).unwrap();
    events.powers_mut().copy_from_slice(&[10.0, 10.0]);

    PointSourceKernel::default().compute(&events, &mut volume);

    let data = volume.data();
    assert_relative_eq!(data[100], 0.002_697_402, max_relative = 1e-4);
    assert_relative_eq!(data[15_000], 0.002_949_759, max_relative = 1e-4);
    assert_relative_eq!(data[240_000], 0.003_833_621, max_relative = 1e-4);
    assert_relative_eq!(data[1_000_000], 0.003_614_033, max_relative = 1e-4);
}

#[test]
fn test_volume_matches_reference_grid() {
    // Same grid as above with the origin moved to z = -1574
    let mut aabb = Aabb::empty();
    aabb.add(&Vec3::new(-1000.0, -1500.0, -1436.0), 10.0);
    aabb.add(&Vec3::new(1000.0, 1500.0, 564.0), 10.0);
    let mut volume = Volume::new(
        Vec3::new(17.78125, 24.59375, 17.78125),
        Vec3::new(256.0, 128.0, 256.0),
        &aabb,
    )
    .unwrap();
    assert_eq!(volume.size().z, 128);
    assert_relative_eq!(volume.origin().x, -1138.0);
    assert_relative_eq!(volume.origin().y, -1574.0);
    assert_relative_eq!(volume.origin().z, -1574.0);

    let mut events = Events::new(2).unwrap();
    events.add_event(&Vec3::new(-500.0, 0.0, 0.0), 5.0).unwrap();
    events.add_event(&Vec3::new(500.0, 0.0, 0.0), 5.0).unwrap();
    events.powers_mut().copy_from_slice(&[10.0, 10.0]);

    PointSourceKernel::default().compute(&events, &mut volume);

    let data = volume.data();
    assert_relative_eq!(data[100], 0.002_389_415, max_relative = 1e-4);
    assert_relative_eq!(data[15_000], 0.002_556_937, max_relative = 1e-4);
    assert_relative_eq!(data[240_000], 0.003_130_926, max_relative = 1e-4);
    assert_relative_eq!(data[1_000_000], 0.003_449_99, max_relative = 1e-4);
}

#[test]
fn test_sample_points_regression() {
    let frames = 91;
    let mut events = Events::new(2).unwrap();
    events.add_event(&Vec3::new(-0.5, 0.0, 0.0), 0.25).unwrap();
    events.add_event(&Vec3::new(0.5, 0.0, 0.0), 0.25).unwrap();

    let positions = vec![
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(-0.5, 0.0, 0.0),
        Vec3::new(-0.6, 0.0, 0.0),
    ];
    let mut samples = SamplePoints::new(frames, positions).unwrap();

    for i in 0..frames {
        let power = (PI * i as f32 / 180.0).sin();
        events.powers_mut().copy_from_slice(&[-power, power]);
        samples.compute_next_frame(&events).unwrap();
    }

    let values = samples.values();
    assert_eq!(values.len(), 5 * 91);
    assert_abs_diff_eq!(values[2], 0.0, epsilon = 1e-4);
    assert_abs_diff_eq!(values[7], 0.0, epsilon = 1e-4);
    assert_abs_diff_eq!(values[202], 0.0, epsilon = 1e-4);
    assert_relative_eq!(values[8], -14.7492, max_relative = 1e-4);
    assert_relative_eq!(values[9], -15.1961, max_relative = 1e-4);
    assert_relative_eq!(values[31], 39.2614, max_relative = 1e-4);
    assert_relative_eq!(values[271], 303.871, max_relative = 1e-4);
    assert_relative_eq!(values[270], -303.871, max_relative = 1e-4);
    assert_relative_eq!(values[136], 170.521, max_relative = 1e-4);
}

const SCENE: &str = r#"{
    "circuit": {
        "cells": [
            { "gid": 10, "morphology": {
                "soma_centroid": [0.0, 0.0, 0.0], "soma_radius": 4.0,
                "sections": [[], [[0.0, 0.0, 0.0], [0.0, 50.0, 0.0]]] } }
        ]
    },
    "reports": {
        "currents": {
            "start_time": 0.0, "end_time": 1.0, "timestep": 0.5, "data_unit": "nA",
            "cells": [
                { "gid": 10, "compartment_counts": [1, 2],
                  "frames": [[2.0, -1.0, -1.0], [-4.0, 3.0, 1.0]] }
            ]
        }
    }
}"#;

#[test]
fn test_events_loader_drives_probes() {
    let scene = Scene::from_json_str(SCENE).unwrap();
    let params = LfpParams {
        sample_points: vec![Vec3::new(20.0, 0.0, 0.0)],
        ..LfpParams::default()
    };
    let report = scene.report(&params.report).unwrap();
    let mut loader = EventsLoader::new(&params, &scene.circuit, Box::new(report)).unwrap();

    assert_eq!(loader.frames_count(), 2);
    assert_eq!(loader.events().len(), 3);
    // soma plus two 25 µm compartments sampled at their midpoints
    assert_eq!(loader.events().position(1), Vec3::new(0.0, 12.5, 0.0));
    assert_eq!(loader.events().position(2), Vec3::new(0.0, 37.5, 0.0));
    assert_eq!(loader.events().radii(), &[4.0, 5.0, 5.0]);
    assert_relative_eq!(loader.circuit_bounds().max.y, 42.5);

    let timeline = *loader.timeline();
    let mut samples =
        SamplePoints::new(timeline.frames_count(), params.sample_points.clone()).unwrap();
    let kernel = PointSourceKernel::default();
    let mut expected = Vec::new();
    for _ in 0..timeline.frames_count() {
        let events = loader.load_next_frame().unwrap();
        samples.compute_next_frame(events).unwrap();
        expected.push(1000.0 * kernel.field_at(&params.sample_points[0], events));
    }
    for (frame, value) in expected.iter().enumerate() {
        assert_relative_eq!(samples.value(frame, 0), *value, max_relative = 1e-6);
    }
    assert!(samples.value(0, 0) != samples.value(1, 0));

    let dir = std::env::temp_dir().join(format!("emsim-lfp-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let provenance = Provenance {
        scene: "scene.json".to_string(),
        target: String::new(),
        report: "currents".to_string(),
    };
    let path =
        export::write_sample_points(&dir.join("run"), &samples, &timeline, &provenance).unwrap();
    let text = fs::read_to_string(path).unwrap();
    let rows: Vec<&str> = text.lines().filter(|line| !line.starts_with('#')).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("0.5 "));
}

#[test]
fn test_field_volume_over_loaded_events() {
    let scene = Scene::from_json_str(SCENE).unwrap();
    let params = LfpParams {
        voxel_size: Vec3::repeat(10.0),
        extent: Vec3::new(20.0, 20.0, 20.0),
        ..LfpParams::default()
    };
    let report = scene.report(&params.report).unwrap();
    let mut loader = EventsLoader::new(&params, &scene.circuit, Box::new(report)).unwrap();

    let mut volume =
        Volume::new(params.voxel_size, params.extent, loader.circuit_bounds()).unwrap();
    // bounds [-5, 5] x [-4, 42.5] x [-5, 5] padded by 20
    assert_eq!((volume.size().x, volume.size().y, volume.size().z), (3, 7, 3));
    assert_relative_eq!(volume.origin().y, -14.0);

    let kernel = PointSourceKernel::default();
    let events = loader.load_next_frame().unwrap();
    kernel.compute(events, &mut volume);
    let corner = volume.voxel_corner(2, 3, 1);
    assert_relative_eq!(
        volume.get(2, 3, 1).unwrap(),
        kernel.field_at(&corner, events),
        max_relative = 1e-6
    );
}
