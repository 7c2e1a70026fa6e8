//! Tests for the instrument session against a scripted in-memory reader

mod common;

use clario_lib::constants::{CMD_CLOSE, CMD_GET_DATA, CMD_INIT, CMD_OPEN, CMD_STATUS};
use common::*;
use std::time::Duration;

const ACK: &[u8] = &[0x01];

fn idle() -> Vec<u8> {
    status_payload(IDLE)
}

fn busy() -> Vec<u8> {
    status_payload(BUSY)
}

fn fluorescence_run() -> (RunCfg, FlCfg) {
    let fl = FlCfg {
        ex: 483,
        ex_bw: 14,
        dich: 5025,
        em: 530,
        em_bw: 30,
        gain: 3000,
        focal_height: 40,
        flashes: 200,
        ..Default::default()
    };
    (RunCfg::new(PlateCfg::sbs_96()), fl)
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_ready_skips_unchanged_busy_frames() {
    let (io, instrument) = spawn_instrument(vec![busy(), busy(), busy(), idle()]);
    let mut session = Clario::new(io);

    let started = tokio::time::Instant::now();
    let status = session.wait_for_ready().await.unwrap();
    assert!(!status.is_busy());
    assert_eq!(session.state(), SessionState::Ready);
    // one poll interval before every query
    assert!(started.elapsed() >= Duration::from_millis(400));

    let requests = instrument.await.unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|r| r.as_ref() == CMD_STATUS));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_ready_rejects_short_status() {
    let mut short = idle();
    short.pop();
    let (io, _instrument) = spawn_instrument(vec![short]);
    let mut session = Clario::new(io);

    let err = session.wait_for_ready().await.unwrap_err();
    assert!(matches!(
        err,
        ClarioError::Decode(DecodeError::MalformedLength {
            expected: 17,
            actual: 16,
            ..
        })
    ));
}

#[tokio::test]
async fn test_get_status_is_repeatable() {
    let (io, instrument) = spawn_instrument(vec![idle(), idle()]);
    let mut session = Clario::new(io);

    let first = session.get_status().await.unwrap();
    let second = session.get_status().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.flags.to_string(), "[VALID, INITIALIZED]");
    assert_eq!(instrument.await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_setup_sends_init_without_waiting() {
    let (io, instrument) = spawn_instrument(vec![ACK.to_vec()]);
    let mut session = Clario::new(io);
    assert_eq!(session.state(), SessionState::Disconnected);

    session.setup().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let requests = instrument.await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].as_ref(), CMD_INIT);
}

#[tokio::test(start_paused = true)]
async fn test_open_and_close_wait_for_ready() {
    let (io, instrument) = spawn_instrument(vec![ACK.to_vec(), busy(), idle(), ACK.to_vec(), idle()]);
    let mut session = Clario::new(io);

    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    let requests: Vec<Vec<u8>> = instrument.await.unwrap().iter().map(|r| r.to_vec()).collect();
    assert_eq!(
        requests,
        vec![
            CMD_OPEN.to_vec(),
            CMD_STATUS.to_vec(),
            CMD_STATUS.to_vec(),
            CMD_CLOSE.to_vec(),
            CMD_STATUS.to_vec(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fluorescence_run_sequence() {
    init_tracing();
    let (run, fl) = fluorescence_run();
    let values: Vec<u32> = (0..96).map(|i| 1000 + i).collect();
    let (io, instrument) = spawn_instrument(vec![
        ACK.to_vec(),
        idle(),
        ACK.to_vec(),
        busy(),
        idle(),
        fl_payload(96, 96, 250, &values),
    ]);
    let mut session = Clario::new(io);

    let data = session.run_fluorescence(&run, &fl).await.unwrap();
    assert_eq!(data.values, values);
    assert_eq!(data.wells, 96);
    assert_eq!(session.state(), SessionState::Ready);

    let requests = instrument.await.unwrap();
    let command = fl.encode(&run).unwrap();
    let expected: Vec<&[u8]> = vec![CMD_INIT, CMD_STATUS, &command[..], CMD_STATUS, CMD_STATUS, CMD_GET_DATA];
    assert_eq!(requests.len(), expected.len());
    for (i, (got, want)) in requests.iter().zip(expected).enumerate() {
        assert_eq!(got.as_ref(), want, "request {i}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_absorbance_run_returns_transmission() {
    let run = RunCfg::new(PlateCfg::sbs_96());
    let abs = DiscreteAbsCfg {
        wavelengths: vec![600],
        flashes: 22,
        settling_time: 0,
    };
    let readings = AbsReadings {
        total: 1,
        complete: 1,
        wavelengths: 1,
        wells: 1,
        samples: vec![2_000_000],
        references: vec![1_800_000],
        chromats: vec![(3_000_000, 1_000_000)],
        reference_channel: (2_000_000, 1_000_000),
        ..Default::default()
    };
    let (io, instrument) = spawn_instrument(vec![
        ACK.to_vec(),
        idle(),
        ACK.to_vec(),
        busy(),
        idle(),
        readings.payload(),
    ]);
    let mut session = Clario::new(io);

    let data = session.run_discrete_absorbance(&run, &abs).await.unwrap();
    assert!((data.transmission[0][0] - 62.5).abs() < 1e-9);

    let requests = instrument.await.unwrap();
    assert_eq!(requests[2], abs.encode(&run).unwrap());
    assert_eq!(requests[5].as_ref(), CMD_GET_DATA);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_io() {
    let (io, instrument) = spawn_instrument(vec![]);
    let mut session = Clario::new(io);
    let (mut run, fl) = fluorescence_run();
    run.plate.flying_mode = true;

    let err = session.run_fluorescence(&run, &fl).await.unwrap_err();
    assert!(matches!(
        err,
        ClarioError::Validation(ValidationError::OutOfRange { field: "flashes", .. })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(instrument.await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_aborts_on_wrong_data_schema() {
    let (run, fl) = fluorescence_run();
    let mut wrong = fl_payload(1, 1, 0, &[1]);
    wrong[6] = 0x29;
    let (io, instrument) = spawn_instrument(vec![ACK.to_vec(), idle(), ACK.to_vec(), busy(), idle(), wrong]);
    let mut session = Clario::new(io);

    let err = session.run_fluorescence(&run, &fl).await.unwrap_err();
    assert!(matches!(
        err,
        ClarioError::Decode(DecodeError::SchemaMismatch {
            expected: 0x21,
            actual: 0x29
        })
    ));
    assert_eq!(instrument.await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_lost_link_disconnects_session() {
    let (io, instrument) = spawn_instrument(vec![ACK.to_vec()]);
    let mut session = Clario::new(io);
    session.setup().await.unwrap();
    instrument.await.unwrap();

    let err = session.get_status().await.unwrap_err();
    assert!(matches!(err, ClarioError::Io(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_watch_status_reports_changes_and_survives_errors() {
    init_tracing();
    let (io, _instrument) = spawn_instrument(vec![idle(), idle(), busy(), vec![0x00; 3], idle()]);
    let mut session = Clario::new(io);

    let mut seen = Vec::new();
    let watch = session.watch_status(|status| seen.push(status.is_busy()));
    let outcome = tokio::time::timeout(Duration::from_secs(2), watch).await;

    assert!(outcome.is_err(), "watching only ends when cancelled");
    assert_eq!(seen, vec![false, true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_interval() {
    let (io, _instrument) = spawn_instrument(vec![idle()]);
    let config = SessionConfig::default().with_poll_interval(Duration::from_secs(1));
    let mut session = Clario::with_config(io, config);
    assert_eq!(session.config().poll_interval, Duration::from_secs(1));
    assert_eq!(session.config().read_timeout, Duration::from_secs(10));

    let started = tokio::time::Instant::now();
    session.wait_for_ready().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_transport_outlives_session() {
    let (io, instrument) = spawn_instrument(vec![ACK.to_vec(), idle()]);
    let mut session = Clario::new(io);
    session.setup().await.unwrap();

    // a fresh session on the same link starts over
    let mut session = Clario::new(session.into_inner());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.get_status().await.unwrap().is_busy());

    let requests = instrument.await.unwrap();
    assert_eq!(requests[0].as_ref(), CMD_INIT);
    assert_eq!(requests[1].as_ref(), CMD_STATUS);
}
