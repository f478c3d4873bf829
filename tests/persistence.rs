//! Persisting a result bundle through the JSON sink.

use std::fs;

use tempfile::tempdir;

use pet_kinetics::domain::{BUNDLE_KEYS, FitPackage, RegionOutcome, ResultBundle};
use pet_kinetics::error::AppError;
use pet_kinetics::io::{JsonSink, ResultSink};
use pet_kinetics::sampler::PosteriorResult;

const LABELS: [&str; 2] = ["K1", "sigma"];

fn package(region: usize) -> FitPackage {
    let k1 = 0.01 * (region + 1) as f64;
    FitPackage {
        region,
        logz: -10.0 - region as f64,
        information: 3.5,
        qm: vec![k1, 0.02],
        ql: vec![k1 - 0.001, 0.01],
        qh: vec![k1 + 0.001, 0.03],
        rho_pred: vec![0.1, 0.5, 0.2],
        resid: 0.05,
        res: PosteriorResult::single(vec![0.2, 0.2], vec![k1, 0.02], -10.0),
    }
}

/// Regions 0 and 2 succeed; region 1 fails.
fn bundle() -> ResultBundle {
    let outcomes = vec![
        RegionOutcome {
            region: 2,
            result: Ok(package(2)),
        },
        RegionOutcome {
            region: 1,
            result: Err(AppError::Sampler("diverged".to_string())),
        },
        RegionOutcome {
            region: 0,
            result: Ok(package(0)),
        },
    ];
    ResultBundle::assemble(&LABELS, 3, outcomes)
}

#[test]
fn every_key_lands_on_disk() {
    let dir = tempdir().unwrap();
    let sink = JsonSink::new(dir.path().join("out"), "sub-01_trc-oo");
    sink.persist(&bundle(), "OneTissue").unwrap();

    for key in BUNDLE_KEYS {
        let path = sink.artifact_path("OneTissue", key);
        assert!(path.exists(), "missing {}", path.display());
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("sub-01_trc-oo-OneTissue-")
        );
    }
    assert!(sink.artifact_path("OneTissue", "quantiles.csv").exists());
}

#[test]
fn failed_region_serializes_as_null() {
    let dir = tempdir().unwrap();
    let sink = JsonSink::new(dir.path(), "run");
    sink.persist(&bundle(), "Boxcar").unwrap();

    let logz: Vec<Option<f64>> =
        serde_json::from_str(&fs::read_to_string(sink.artifact_path("Boxcar", "logz")).unwrap())
            .unwrap();
    assert_eq!(logz, vec![Some(-10.0), None, Some(-12.0)]);

    let qm: Vec<Vec<Option<f64>>> =
        serde_json::from_str(&fs::read_to_string(sink.artifact_path("Boxcar", "qm")).unwrap())
            .unwrap();
    assert_eq!(qm.len(), 3);
    assert_eq!(qm[0], vec![Some(0.01), Some(0.02)]);
    assert_eq!(qm[1], vec![None, None]);

    let rho: Vec<Vec<Option<f64>>> = serde_json::from_str(
        &fs::read_to_string(sink.artifact_path("Boxcar", "rho_pred")).unwrap(),
    )
    .unwrap();
    assert_eq!(rho[2], vec![Some(0.1), Some(0.5), Some(0.2)]);

    let res: Vec<Option<PosteriorResult>> =
        serde_json::from_str(&fs::read_to_string(sink.artifact_path("Boxcar", "res")).unwrap())
            .unwrap();
    assert!(res[1].is_none());
    assert_eq!(res[2].as_ref(), Some(&package(2).res));
}

#[test]
fn quantile_table_skips_failed_regions() {
    let dir = tempdir().unwrap();
    let sink = JsonSink::new(dir.path(), "run");
    sink.persist(&bundle(), "").unwrap();

    let csv = fs::read_to_string(sink.artifact_path("", "quantiles.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "region,label,qm,ql,qh,logz,information,resid");
    assert_eq!(lines.len(), 1 + 2 * LABELS.len());
    assert!(lines[1].starts_with("0,K1,"));
    assert!(lines[3].starts_with("2,K1,"));
    assert!(!csv.lines().any(|l| l.starts_with("1,")));
}
