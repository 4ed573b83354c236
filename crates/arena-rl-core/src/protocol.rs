//! Wire protocol spoken with an external policy process
//!
//! Outbound, the agent sends length-prefixed JSON frames: a 4-byte
//! big-endian payload length followed by exactly that many UTF-8 bytes.
//! Inbound, the policy process answers each transition with a bare 4-byte
//! big-endian action id and nothing else. An optional handshake frame
//! (`{"ping": ..., "NumStates": "8", "NumActions": "5"}`) may precede the
//! stream; the peer replies with one framed JSON pong.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::state::STATE_FIELDS;
use crate::{Action, ArenaError, Transition};

/// Default policy process host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default policy process port
pub const DEFAULT_PORT: u16 = 5555;

/// Largest frame payload accepted from a peer
pub const MAX_FRAME_LEN: u32 = 1 << 20;

/// Length of the frame header and of an action id
pub const HEADER_LEN: usize = 4;

/// One outbound transition record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionMessage {
    /// Resulting state as an eight-element numeric vector
    pub state: [f32; STATE_FIELDS],
    /// Reward collected since the previous message
    pub reward: f32,
    /// Whether the episode ended
    pub done: bool,
}

impl TransitionMessage {
    /// Build the record describing where `transition` ended up
    #[must_use]
    pub fn from_transition(transition: &Transition) -> Self {
        Self {
            state: transition.next_state.to_vector(),
            reward: transition.reward,
            done: transition.done,
        }
    }
}

/// Handshake frame sent once after connecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Free-form greeting
    pub ping: String,
    /// State vector width, as a decimal string
    #[serde(rename = "NumStates")]
    pub num_states: String,
    /// Size of the action set, as a decimal string
    #[serde(rename = "NumActions")]
    pub num_actions: String,
}

impl Handshake {
    /// Handshake announcing this crate's state and action dimensions
    #[must_use]
    pub fn new(ping: impl Into<String>) -> Self {
        Self {
            ping: ping.into(),
            num_states: STATE_FIELDS.to_string(),
            num_actions: Action::COUNT.to_string(),
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new("Hello from arena agent")
    }
}

/// Prefix `payload` with its big-endian length
pub fn encode_frame(payload: &[u8]) -> crate::Result<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| ArenaError::Protocol(format!("frame of {} bytes is too large", payload.len())))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Serialize `value` to JSON and frame it
pub fn encode_json<T: Serialize>(value: &T) -> crate::Result<Vec<u8>> {
    encode_frame(&serde_json::to_vec(value)?)
}

/// Split one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` while `buf` holds less than a full frame so callers
/// can keep buffering partial reads.
pub fn decode_frame(buf: &[u8]) -> crate::Result<Option<(&[u8], usize)>> {
    let Some(header) = buf.get(..HEADER_LEN) else {
        return Ok(None);
    };
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if len > MAX_FRAME_LEN {
        return Err(ArenaError::Protocol(format!(
            "frame length {len} exceeds limit {MAX_FRAME_LEN}"
        )));
    }
    let end = HEADER_LEN + len as usize;
    Ok(buf.get(HEADER_LEN..end).map(|payload| (payload, end)))
}

/// Parse a framed transition payload
pub fn decode_transition(payload: &[u8]) -> crate::Result<TransitionMessage> {
    Ok(serde_json::from_slice(payload)?)
}

/// Write one framed payload
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed payload. A peer closing the stream maps to
/// [`ArenaError::Disconnected`].
pub async fn read_frame<R>(reader: &mut R) -> crate::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = read_u32(reader).await?;
    if len > MAX_FRAME_LEN {
        return Err(ArenaError::Protocol(format!(
            "frame length {len} exceeds limit {MAX_FRAME_LEN}"
        )));
    }
    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(map_eof)?;
    Ok(payload)
}

/// Read one raw action id without validating it
pub async fn read_action_id<R>(reader: &mut R) -> crate::Result<u32>
where
    R: AsyncRead + Unpin,
{
    read_u32(reader).await
}

/// Write one raw action id
pub async fn write_action_id<W>(writer: &mut W, id: u32) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32(id).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_u32<R>(reader: &mut R) -> crate::Result<u32>
where
    R: AsyncRead + Unpin,
{
    reader.read_u32().await.map_err(map_eof)
}

fn map_eof(err: std::io::Error) -> ArenaError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ArenaError::Disconnected
    } else {
        ArenaError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::State;

    fn sample_state() -> State {
        State {
            health_percent: 10,
            target_health_percent: 50,
            heals_left: 3,
            in_attack_range: true,
            target_attacking: false,
            target_guarding: false,
            target_dodging: false,
            was_hit_recently: true,
        }
    }

    #[test]
    fn transition_frame_round_trip() {
        let message = TransitionMessage {
            state: sample_state().to_vector(),
            reward: -0.9,
            done: false,
        };
        let frame = encode_json(&message).unwrap();

        let (payload, consumed) = decode_frame(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        let decoded = decode_transition(payload).unwrap();
        assert_eq!(decoded.state, [10.0, 50.0, 3.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(decoded.reward, -0.9);
        assert!(!decoded.done);
    }

    #[test]
    fn frame_header_is_big_endian_length() {
        let frame = encode_frame(b"abc").unwrap();
        assert_eq!(&frame[..4], &[0, 0, 0, 3]);
        assert_eq!(&frame[4..], b"abc");
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let frame = encode_frame(b"{\"done\":true}").unwrap();
        assert!(decode_frame(&frame[..2]).unwrap().is_none());
        assert!(decode_frame(&frame[..frame.len() - 1]).unwrap().is_none());
        assert!(decode_frame(&frame).unwrap().is_some());
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let header = (MAX_FRAME_LEN + 1).to_be_bytes();
        assert!(decode_frame(&header).is_err());
    }

    #[test]
    fn transition_json_field_order() {
        let message = TransitionMessage {
            state: [0.0; STATE_FIELDS],
            reward: 0.5,
            done: true,
        };
        let text = serde_json::to_string(&message).unwrap();
        assert!(text.starts_with("{\"state\":["));
        assert!(text.ends_with("\"reward\":0.5,\"done\":true}"));
    }

    #[test]
    fn handshake_field_names() {
        let value = serde_json::to_value(Handshake::new("hi")).unwrap();
        assert_eq!(value["ping"], "hi");
        assert_eq!(value["NumStates"], "8");
        assert_eq!(value["NumActions"], "5");
    }

    #[tokio::test]
    async fn async_frames_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(256);

        write_frame(&mut client, b"hello").await.unwrap();
        write_action_id(&mut client, 4).await.unwrap();

        assert_eq!(read_frame(&mut server).await.unwrap(), b"hello");
        assert_eq!(read_action_id(&mut server).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn frames_split_across_reads() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0, 0])
            .read(&[0, 2, b'o'])
            .read(b"k")
            .read(&[0, 0, 0, 1])
            .build();

        assert_eq!(read_frame(&mut stream).await.unwrap(), b"ok");
        assert_eq!(read_action_id(&mut stream).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn written_bytes_match_wire_layout() {
        let mut stream = tokio_test::io::Builder::new()
            .write(&[0, 0, 0, 2, b'h', b'i'])
            .write(&[0, 0, 0, 4])
            .build();

        write_frame(&mut stream, b"hi").await.unwrap();
        write_action_id(&mut stream, 4).await.unwrap();
    }

    #[tokio::test]
    async fn closed_stream_reports_disconnect() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(matches!(
            read_action_id(&mut server).await,
            Err(ArenaError::Disconnected)
        ));
    }
}
