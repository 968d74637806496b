//! Framing between the pool and a worker process.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes.
//! A request is a MessagePack [`RequestHeader`] frame followed by a raw pixel
//! frame. A response is a MessagePack [`ResponseHeader`] frame, followed by a
//! raw pixel frame when the header is `Ok`.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Recipe;
use crate::error::{Result, SrError};
use crate::image::Image;

/// Largest frame the length prefix can describe.
pub const MAX_FRAME_LEN: usize = u32::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub recipe: Recipe,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseHeader {
    Ok { width: u32, height: u32, channels: u32 },
    Err(RemoteError),
}

/// An [`SrError`] in a form that survives the process boundary.
///
/// Variants the caller can act on keep their structure; everything else
/// travels as a kind tag plus the rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteError {
    MissingArtifact { param: PathBuf, model: PathBuf },
    UnsupportedModel(String),
    InvalidImage(String),
    InvalidConfig(String),
    Other { kind: String, message: String },
}

impl From<&SrError> for RemoteError {
    fn from(err: &SrError) -> Self {
        let kind = match err {
            SrError::MissingArtifact { param, model } => {
                return RemoteError::MissingArtifact {
                    param: param.clone(),
                    model: model.clone(),
                };
            }
            SrError::UnsupportedModel(m) => return RemoteError::UnsupportedModel(m.clone()),
            SrError::InvalidImage(m) => return RemoteError::InvalidImage(m.clone()),
            SrError::InvalidConfig(m) => return RemoteError::InvalidConfig(m.clone()),
            SrError::Remote { kind, message } => {
                return RemoteError::Other {
                    kind: kind.clone(),
                    message: message.clone(),
                };
            }
            SrError::Engine(_) => "engine",
            SrError::Io(_) => "io",
            SrError::Protocol(_) => "protocol",
            SrError::WorkerExited { .. } | SrError::Timeout(_) | SrError::Cancelled | SrError::PoolClosed => {
                "worker"
            }
        };
        RemoteError::Other {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<RemoteError> for SrError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::MissingArtifact { param, model } => SrError::MissingArtifact { param, model },
            RemoteError::UnsupportedModel(m) => SrError::UnsupportedModel(m),
            RemoteError::InvalidImage(m) => SrError::InvalidImage(m),
            RemoteError::InvalidConfig(m) => SrError::InvalidConfig(m),
            RemoteError::Other { kind, message } => SrError::Remote { kind, message },
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(SrError::Protocol(format!("frame of {} bytes exceeds limit", payload.len())));
    }
    w.write_u32(payload.len() as u32).await?;
    w.write_all(payload).await?;
    Ok(())
}

/// Reads one frame; `None` on a clean end of stream before the length prefix.
async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match r.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    // Grow with the bytes that actually arrive rather than the declared length.
    let mut buf = Vec::new();
    (&mut *r).take(len as u64).read_to_end(&mut buf).await?;
    if buf.len() < len {
        return Err(SrError::Protocol(format!(
            "frame truncated after {} of {len} bytes",
            buf.len()
        )));
    }
    Ok(Some(buf))
}

async fn expect_frame<R: AsyncRead + Unpin>(r: &mut R, what: &str) -> Result<Vec<u8>> {
    read_frame(r)
        .await?
        .ok_or_else(|| SrError::Protocol(format!("stream ended before {what}")))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| SrError::Protocol(format!("encode: {e}")))
}

fn decode<'a, T: Deserialize<'a>>(buf: &'a [u8]) -> Result<T> {
    rmp_serde::from_slice(buf).map_err(|e| SrError::Protocol(format!("decode: {e}")))
}

pub async fn write_request<W: AsyncWrite + Unpin>(w: &mut W, recipe: &Recipe, image: &Image) -> Result<()> {
    if image.len() > MAX_FRAME_LEN {
        return Err(oversized(image));
    }
    let header = RequestHeader {
        recipe: recipe.clone(),
        width: image.width(),
        height: image.height(),
        channels: image.channels(),
    };
    write_frame(w, &encode(&header)?).await?;
    write_frame(w, image.as_bytes()).await?;
    w.flush().await?;
    Ok(())
}

pub async fn read_request<R: AsyncRead + Unpin>(r: &mut R) -> Result<(Recipe, Image)> {
    let header: RequestHeader = decode(&expect_frame(r, "request header").await?)?;
    let pixels = expect_frame(r, "request pixels").await?;
    let image = Image::new(header.width, header.height, header.channels, pixels)?;
    Ok((header.recipe, image))
}

fn oversized(image: &Image) -> SrError {
    SrError::InvalidImage(format!(
        "{}x{}x{} image does not fit in one frame",
        image.width(),
        image.height(),
        image.channels()
    ))
}

pub async fn write_response<W: AsyncWrite + Unpin>(w: &mut W, result: &Result<Image>) -> Result<()> {
    write_response_within(w, result, MAX_FRAME_LEN).await
}

/// Writes a response, answering with an error when the pixels exceed `limit`.
/// The limit is checked before the header goes out.
async fn write_response_within<W: AsyncWrite + Unpin>(w: &mut W, result: &Result<Image>, limit: usize) -> Result<()> {
    match result {
        Ok(image) if image.len() > limit => {
            let header = ResponseHeader::Err(RemoteError::from(&oversized(image)));
            write_frame(w, &encode(&header)?).await?;
        }
        Ok(image) => {
            let header = ResponseHeader::Ok {
                width: image.width(),
                height: image.height(),
                channels: image.channels(),
            };
            write_frame(w, &encode(&header)?).await?;
            write_frame(w, image.as_bytes()).await?;
        }
        Err(err) => {
            let header = ResponseHeader::Err(RemoteError::from(err));
            write_frame(w, &encode(&header)?).await?;
        }
    }
    w.flush().await?;
    Ok(())
}

/// Reads a response. The outer `Option` is `None` when the worker closed its
/// output without answering; the inner result is the worker's outcome.
pub async fn read_response<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<Result<Image>>> {
    let Some(frame) = read_frame(r).await? else {
        return Ok(None);
    };
    match decode::<ResponseHeader>(&frame)? {
        ResponseHeader::Ok {
            width,
            height,
            channels,
        } => {
            let pixels = expect_frame(r, "response pixels").await?;
            Ok(Some(Image::new(width, height, channels, pixels)))
        }
        ResponseHeader::Err(err) => Ok(Some(Err(err.into()))),
    }
}

#[cfg(test)]
mod tests {
    use srvk_ncnn::BackendKind;

    use super::*;
    use crate::config::EngineConfig;

    fn recipe() -> Recipe {
        let cfg = EngineConfig::new("models-DF2K")
            .with_scale(4)
            .with_backend(BackendKind::Reference)
            .with_model_files("/m/x4.param", "/m/x4.bin");
        Recipe::from(&cfg)
    }

    #[tokio::test]
    async fn request_over_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let image = Image::new(2, 2, 3, (0..12).collect()).unwrap();
        write_request(&mut a, &recipe(), &image).await.unwrap();

        let (got_recipe, got_image) = read_request(&mut b).await.unwrap();
        assert_eq!(got_recipe, recipe());
        assert_eq!(got_image, image);
    }

    #[tokio::test]
    async fn missing_artifact_keeps_paths() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let err = SrError::MissingArtifact {
            param: "/m/x4.param".into(),
            model: "/m/x4.bin".into(),
        };
        write_response(&mut a, &Err(err)).await.unwrap();

        match read_response(&mut b).await.unwrap() {
            Some(Err(SrError::MissingArtifact { param, model })) => {
                assert_eq!(param, PathBuf::from("/m/x4.param"));
                assert_eq!(model, PathBuf::from("/m/x4.bin"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_errors_travel_as_remote() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let err = SrError::Engine(srvk_ncnn::EngineError::NotLoaded);
        write_response(&mut a, &Err(err)).await.unwrap();

        match read_response(&mut b).await.unwrap() {
            Some(Err(SrError::Remote { kind, message })) => {
                assert_eq!(kind, "engine");
                assert!(message.contains("not loaded"), "{message}");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_stream_is_no_response() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(read_response(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_response_is_protocol_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let header = encode(&ResponseHeader::Ok {
            width: 1,
            height: 1,
            channels: 3,
        })
        .unwrap();
        write_frame(&mut a, &header).await.unwrap();
        drop(a);

        assert!(matches!(read_response(&mut b).await, Err(SrError::Protocol(_))));
    }

    #[tokio::test]
    async fn oversized_result_is_answered_as_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let image = Image::zeroed(4, 4, 3).unwrap();
        write_response_within(&mut a, &Ok(image), 8).await.unwrap();
        drop(a);

        match read_response(&mut b).await.unwrap() {
            Some(Err(SrError::InvalidImage(message))) => {
                assert!(message.contains("4x4x3"), "{message}");
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn frame_cut_mid_body_is_protocol_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(10).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        match read_frame(&mut b).await {
            Err(SrError::Protocol(message)) => assert!(message.contains("3 of 10"), "{message}"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn huge_declared_length_fails_without_allocating() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(u32::MAX).await.unwrap();
        drop(a);
        assert!(matches!(read_frame(&mut b).await, Err(SrError::Protocol(_))));
    }
}
