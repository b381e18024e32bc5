//! Length-prefixed JSON framing

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Errors that can occur while reading or writing frames
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),

    #[error("failed to encode frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one frame body, or `None` when the peer closed the stream
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write `msg` as a length-prefixed JSON frame
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }
    let len = (body.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_ok, block_on};

    #[test]
    fn test_frame_round_trip() {
        block_on(async {
            let (mut a, mut b) = tokio::io::duplex(64);
            assert_ok!(write_frame(&mut a, &serde_json::json!({"k": "v"})).await);

            let body = assert_ok!(read_frame(&mut b).await).unwrap();
            assert_eq!(body, br#"{"k":"v"}"#);
        });
    }

    #[test]
    fn test_eof_is_clean_close() {
        block_on(async {
            let (a, mut b) = tokio::io::duplex(64);
            drop(a);
            assert!(assert_ok!(read_frame(&mut b).await).is_none());
        });
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&((MAX_FRAME_LEN as u32) + 1).to_le_bytes())
            .build();

        let result = block_on(read_frame(&mut reader));
        assert!(matches!(result, Err(FrameError::TooLarge(_))));
    }
}
