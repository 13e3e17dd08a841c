use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use glyphline::core_modules::framing::{format_request_line, parse_request_line};
use glyphline::{ChannelConfig, ChannelError, InferenceChannel, PixelGrid, ProcessState};
use pretty_assertions::assert_eq;

const STUB: &str = env!("CARGO_BIN_EXE_engine_stub");

fn stub_config(args: &[&str]) -> ChannelConfig {
    ChannelConfig {
        args: args.iter().map(|a| a.to_string()).collect(),
        startup_grace: Duration::from_millis(100),
        startup_timeout: Duration::from_secs(5),
        ..ChannelConfig::new(STUB)
    }
}

fn uniform(value: f32) -> PixelGrid {
    PixelGrid::new(vec![value; 784], 28).unwrap()
}

#[tokio::test]
async fn answers_one_line_per_request() {
    let channel = InferenceChannel::spawn(stub_config(&["--mode", "counter"])).await.unwrap();
    assert_eq!(channel.state(), ProcessState::Ready);

    for expected in 0..5 {
        let label = channel.predict(&uniform(0.0)).await.unwrap();
        assert_eq!(label, expected.to_string());
    }

    channel.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_carries_all_784_values() {
    let channel = InferenceChannel::spawn(stub_config(&["--mode", "constant", "--label", "A", "--expect-len", "784"]))
        .await
        .unwrap();

    assert_eq!(channel.predict(&uniform(0.5)).await.unwrap(), "A");
    channel.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_callers_get_their_own_answers() {
    let channel = Arc::new(
        InferenceChannel::spawn(stub_config(&["--mode", "checksum"])).await.unwrap(),
    );

    let calls = (0..24).map(|i| {
        let channel = channel.clone();
        async move {
            let grid = uniform(i as f32 / 24.0);
            let sent = parse_request_line(&format_request_line(grid.pixels())).unwrap();
            let expected = format!("{:.3}", sent.iter().map(|&v| v as f64).sum::<f64>());
            let answer = channel.predict(&grid).await.unwrap();
            (expected, answer)
        }
    });

    for (expected, answer) in join_all(calls).await {
        assert_eq!(answer, expected);
    }
}

#[tokio::test]
async fn concurrent_counter_values_are_unique() {
    let channel = Arc::new(
        InferenceChannel::spawn(stub_config(&["--mode", "counter", "--delay-ms", "2"])).await.unwrap(),
    );

    let calls = (0..32).map(|_| {
        let channel = channel.clone();
        async move { channel.predict(&uniform(1.0)).await.unwrap() }
    });
    let answers: BTreeSet<u64> = join_all(calls)
        .await
        .into_iter()
        .map(|a| a.parse().unwrap())
        .collect();

    assert_eq!(answers, (0..32).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn cancelled_caller_does_not_strand_its_response() {
    let channel = InferenceChannel::spawn(stub_config(&["--mode", "counter", "--delay-ms", "300"]))
        .await
        .unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(50), channel.predict(&uniform(0.0))).await;
    assert!(abandoned.is_err());

    // The abandoned exchange still consumes answer 0.
    assert_eq!(channel.predict(&uniform(0.0)).await.unwrap(), "1");
}

#[tokio::test]
async fn exited_process_is_reported_without_io() {
    let channel = InferenceChannel::spawn(stub_config(&["--exit-after-ms", "200"])).await.unwrap();
    assert_eq!(channel.state(), ProcessState::Ready);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let err = channel.predict(&uniform(0.3)).await.unwrap_err();
    assert!(matches!(err, ChannelError::ProcessDied), "got {err:?}");
    assert_eq!(channel.state(), ProcessState::Dead);

    // Dead is permanent for this channel.
    let err = channel.predict(&uniform(0.3)).await.unwrap_err();
    assert!(matches!(err, ChannelError::ProcessDied), "got {err:?}");
}

#[tokio::test]
async fn early_exit_is_a_startup_error() {
    let err = InferenceChannel::spawn(stub_config(&["--exit-before-ack"])).await.err().unwrap();
    assert!(matches!(err, ChannelError::ExitedDuringStartup(_)), "got {err:?}");
    assert!(err.is_startup());
}

#[tokio::test]
async fn missing_acknowledgement_is_a_startup_error() {
    let config = ChannelConfig {
        startup_timeout: Duration::from_millis(300),
        ..stub_config(&["--silent"])
    };
    let err = InferenceChannel::spawn(config).await.err().unwrap();
    assert!(matches!(err, ChannelError::NoAcknowledgement(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_executable_is_a_spawn_error() {
    let config = ChannelConfig::new("/nonexistent/glyphline-engine");
    let err = InferenceChannel::spawn(config).await.err().unwrap();
    assert!(matches!(err, ChannelError::Spawn { .. }), "got {err:?}");
}

#[tokio::test]
async fn hung_engine_times_out_and_disables_channel() {
    let config = ChannelConfig {
        request_timeout: Some(Duration::from_millis(200)),
        ..stub_config(&["--hang"])
    };
    let channel = InferenceChannel::spawn(config).await.unwrap();

    let err = channel.predict(&uniform(0.1)).await.unwrap_err();
    assert!(matches!(err, ChannelError::Timeout(_)), "got {err:?}");
    assert_eq!(channel.state(), ProcessState::Dead);

    let err = channel.predict(&uniform(0.1)).await.unwrap_err();
    assert!(matches!(err, ChannelError::ProcessDied), "got {err:?}");
}

#[tokio::test]
async fn noisy_stderr_does_not_block_predictions() {
    // 256 KiB of diagnostics per request is several times a pipe buffer.
    let config = ChannelConfig {
        request_timeout: Some(Duration::from_secs(10)),
        ..stub_config(&["--mode", "counter", "--chatter", "262144"])
    };
    let channel = InferenceChannel::spawn(config).await.unwrap();

    for expected in 0..4 {
        assert_eq!(channel.predict(&uniform(0.7)).await.unwrap(), expected.to_string());
    }
    channel.shutdown().await.unwrap();
}
