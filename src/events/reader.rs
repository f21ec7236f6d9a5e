//! Newline-delimited JSON event intake.

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{events::error::DispatchError, models::ApplicationEvent};

/// Reads newline-delimited JSON events and forwards them to the dispatcher.
///
/// Blank lines are ignored. Lines that do not decode are logged and skipped.
/// Decoded events are forwarded as is; their fields are validated by the
/// handler. Returns the number of events forwarded once the input is
/// exhausted or the token fires.
pub async fn read_json_lines<R>(
    reader: R,
    sender: mpsc::Sender<ApplicationEvent>,
    cancellation_token: CancellationToken,
) -> Result<usize, DispatchError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0usize;
    let mut forwarded = 0usize;

    loop {
        let line = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        line_number += 1;

        let payload = line.trim();
        if payload.is_empty() {
            continue;
        }

        let event = match ApplicationEvent::from_json(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "Discarding undecodable event.");
                continue;
            }
        };

        sender.send(event).await.map_err(|_| DispatchError::ChannelClosed)?;
        forwarded += 1;
    }

    tracing::debug!(forwarded, lines = line_number, "Event input finished.");
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"type":"report_added_to_incident","incident_id":1,"application_id":2,"application_name":"Shop","report_timestamp":"2024-03-01T10:00:00Z"}"#;

    #[tokio::test]
    async fn test_forwards_valid_lines_and_skips_garbage() {
        let input = format!("{VALID}\n\nnot json\n{{\"type\":\"unknown\"}}\n{VALID}\n");
        let (tx, mut rx) = mpsc::channel(8);

        let forwarded =
            read_json_lines(input.as_bytes(), tx, CancellationToken::new()).await.unwrap();

        assert_eq!(forwarded, 2);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.application_id(), 2);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = read_json_lines(VALID.as_bytes(), tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(DispatchError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_cancelled_reader_forwards_nothing() {
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        token.cancel();

        // The select is unbiased, so only assert that the call returns.
        let result = read_json_lines(VALID.as_bytes(), tx, token).await;
        assert!(result.is_ok());
    }
}
