//! The worker side: answer one request, then exit.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::config::Recipe;
use crate::error::{Result, SrError};
use crate::image::Image;
use crate::sr::SuperResolution;
use crate::worker::protocol::{read_request, write_response};

/// Reads one request from `reader`, rebuilds the binding from its recipe,
/// processes the image and writes the outcome to `writer`.
///
/// Failures of the request itself are answered, not returned; only a failure
/// to write the response is an `Err`.
pub async fn serve<R, W>(mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = match read_request(&mut reader).await {
        Ok((recipe, image)) => {
            debug!(
                model = %recipe.model,
                width = image.width(),
                height = image.height(),
                "worker request"
            );
            tokio::task::spawn_blocking(move || run(recipe, &image))
                .await
                .unwrap_or_else(|e| {
                    Err(SrError::Remote {
                        kind: "panic".into(),
                        message: e.to_string(),
                    })
                })
        }
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        warn!(error = %e, "worker request failed");
    }
    write_response(&mut writer, &result).await
}

/// [`serve`] over the process's stdin and stdout.
pub async fn serve_stdio() -> Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout()).await
}

fn run(recipe: Recipe, image: &Image) -> Result<Image> {
    let sr = SuperResolution::from_recipe(recipe)?;
    sr.process(image)
}
