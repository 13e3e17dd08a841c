// THEORY:
// The inference engine writes warnings and debug renderings of its input to
// stderr. Nobody on the request path reads that stream, and if nobody reads it
// at all the OS pipe buffer fills up and the engine blocks mid-write, which
// looks exactly like a hung prediction. The drain is a background task that
// owns the stream and forwards every line to a sink until end-of-stream.
//
// Read errors end the drain and are never propagated to the channel.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Log target for lines forwarded from the engine.
pub const ENGINE_LOG_TARGET: &str = "glyphline::engine";

/// Spawns a task that forwards each line of `reader` to `sink`.
/// The task resolves to the number of lines forwarded once the stream closes.
pub fn spawn_drain<R, S>(reader: R, mut sink: S) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: FnMut(&str) + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        let mut forwarded = 0;

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    sink(text.trim_end_matches(['\r', '\n']));
                    forwarded += 1;
                }
                Err(e) => {
                    log::debug!(target: ENGINE_LOG_TARGET, "diagnostic stream ended with error: {e}");
                    break;
                }
            }
        }

        forwarded
    })
}

/// The sink the channel uses: every engine line becomes an info record.
pub fn log_sink(line: &str) {
    log::info!(target: ENGINE_LOG_TARGET, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncWriteExt;

    fn collecting_sink() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&str) + Send + 'static) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        (lines, move |line: &str| sink_lines.lock().unwrap().push(line.to_string()))
    }

    #[tokio::test]
    async fn forwards_every_line_until_eof() {
        let (lines, sink) = collecting_sink();
        let input: &[u8] = b"Loading Model Weights\nModel Ready!\r\nno newline at end";

        let count = spawn_drain(input, sink).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            *lines.lock().unwrap(),
            vec!["Loading Model Weights", "Model Ready!", "no newline at end"]
        );
    }

    #[tokio::test]
    async fn invalid_utf8_is_forwarded_lossily() {
        let (lines, sink) = collecting_sink();
        let input: &[u8] = b"bad \xff byte\n";

        spawn_drain(input, sink).await.unwrap();

        assert_eq!(*lines.lock().unwrap(), vec!["bad \u{fffd} byte"]);
    }

    #[tokio::test]
    async fn keeps_reading_while_writer_is_alive() {
        let (lines, sink) = collecting_sink();
        let (mut writer, reader) = tokio::io::duplex(64);
        let drain = spawn_drain(reader, sink);

        // Far more than the duplex buffer: the writer only finishes if the drain keeps up.
        for i in 0..500 {
            writer.write_all(format!("warning {i}\n").as_bytes()).await.unwrap();
        }
        drop(writer);

        assert_eq!(drain.await.unwrap(), 500);
        assert_eq!(lines.lock().unwrap().last().map(String::as_str), Some("warning 499"));
    }
}
