use std::time::Duration;

use srvk_sr::worker::CancellationToken;
use srvk_sr::{BackendKind, EngineConfig, Image, PoolConfig, SrError, SuperResolution, TaskOptions, WorkerPool};

mod common;

fn pool(workers: usize) -> WorkerPool {
    let config = PoolConfig::new(env!("CARGO_BIN_EXE_srvk"))
        .with_args(["worker"])
        .with_workers(workers)
        .with_timeout(Duration::from_secs(30));
    WorkerPool::new(config).expect("start pool")
}

#[tokio::test]
async fn isolated_equals_direct() {
    let tmp = tempfile::tempdir().unwrap();
    let model = common::model_dir(tmp.path(), 4);
    let cfg = EngineConfig::new(model.to_string_lossy())
        .with_scale(4)
        .with_backend(BackendKind::Reference);
    let sr = SuperResolution::new(cfg).unwrap();

    let pool = pool(2);
    for (w, h, c) in [(1, 1, 3), (3, 2, 4), (7, 5, 3)] {
        let data = (0..w * h * c).map(|v| (v * 7 % 251) as u8).collect();
        let image = Image::new(w, h, c, data).unwrap();
        let direct = sr.process(&image).unwrap();
        let isolated = sr.process_isolated(&pool, image).await.unwrap();
        assert_eq!(isolated, direct, "{w}x{h}x{c}");
        assert_eq!(isolated.shape(), (4 * h as usize, 4 * w as usize, c as usize));
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn worker_reraises_missing_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let model = common::model_dir(tmp.path(), 4);
    let sr = SuperResolution::new(
        EngineConfig::new(model.to_string_lossy())
            .with_scale(4)
            .with_backend(BackendKind::Reference),
    )
    .unwrap();

    // The worker rebuilds from the recipe; remove a file so its load fails.
    let bin = model.join("x4.bin");
    std::fs::remove_file(&bin).unwrap();

    let err = sr
        .process_isolated(&pool(1), Image::zeroed(2, 2, 3).unwrap())
        .await
        .unwrap_err();
    match err {
        SrError::MissingArtifact { param, model } => {
            assert!(param.ends_with("x4.param"));
            assert_eq!(model, bin);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cancelled_task_reports_cancelled() {
    let tmp = tempfile::tempdir().unwrap();
    let model = common::model_dir(tmp.path(), 2);
    let sr = SuperResolution::new(
        EngineConfig::new(model.to_string_lossy()).with_backend(BackendKind::Reference),
    )
    .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = sr
        .process_isolated_with(
            &pool(1),
            Image::zeroed(2, 2, 3).unwrap(),
            TaskOptions::default().with_cancel(token),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SrError::Cancelled));
}
