//! Transient image artifacts: grayscale copies for OCR, and crops.
//!
//! Every artifact is a [`NamedTempFile`] in the scratch directory, so it is
//! deleted when dropped, whichever way the caller exits.

use image::{DynamicImage, ImageFormat, ImageReader};
use tempfile::NamedTempFile;

use crate::{
    async_utils::spawn_blocking_propagating_panics, errors::ExtractError, prelude::*,
    source::CropRegion,
};

/// Load an image, whatever its extension says.
fn load_image(path: &Path) -> Result<DynamicImage, ExtractError> {
    let decode_err = |err: &dyn std::fmt::Display| {
        ExtractError::OcrFailed(format!("cannot decode image {:?}: {}", path, err))
    };
    ImageReader::open(path)
        .map_err(|err| decode_err(&err))?
        .with_guessed_format()
        .map_err(|err| decode_err(&err))?
        .decode()
        .map_err(|err| decode_err(&err))
}

/// Save `img` as a new PNG artifact in `scratch_dir`.
fn save_png_artifact(
    img: &DynamicImage,
    scratch_dir: &Path,
    prefix: &str,
) -> Result<NamedTempFile, ExtractError> {
    let artifact = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".png")
        .tempfile_in(scratch_dir)?;
    img.save_with_format(artifact.path(), ImageFormat::Png)
        .map_err(|err| {
            ExtractError::OcrFailed(format!(
                "cannot write image {:?}: {}",
                artifact.path(),
                err
            ))
        })?;
    Ok(artifact)
}

/// Convert an image to 8-bit grayscale for OCR.
#[instrument(level = "debug", skip(scratch_dir), fields(path = %image_path.display()))]
pub async fn grayscale_artifact(
    image_path: &Path,
    scratch_dir: &Path,
) -> Result<NamedTempFile, ExtractError> {
    let image_path = image_path.to_owned();
    let scratch_dir = scratch_dir.to_owned();
    spawn_blocking_propagating_panics(move || {
        let img = load_image(&image_path)?;
        let gray = DynamicImage::ImageLuma8(img.to_luma8());
        save_png_artifact(&gray, &scratch_dir, "scrapey-gray-")
    })
    .await
}

/// Crop an image to `region`, clamped to the image bounds.
#[instrument(level = "debug", skip(scratch_dir), fields(path = %image_path.display()))]
pub async fn crop_artifact(
    image_path: &Path,
    region: CropRegion,
    scratch_dir: &Path,
) -> Result<NamedTempFile, ExtractError> {
    let image_path = image_path.to_owned();
    let scratch_dir = scratch_dir.to_owned();
    spawn_blocking_propagating_panics(move || {
        let img = load_image(&image_path)?;
        let cropped = img.crop_imm(region.x1, region.y1, region.width(), region.height());
        if cropped.width() == 0 || cropped.height() == 0 {
            return Err(ExtractError::OcrFailed(format!(
                "crop region {} lies outside the {}x{} image",
                region,
                img.width(),
                img.height()
            )));
        }
        save_png_artifact(&cropped, &scratch_dir, "scrapey-crop-")
    })
    .await
}

/// Delete an artifact now, logging rather than failing if that goes wrong.
pub fn discard_artifact(artifact: NamedTempFile) {
    let path = artifact.path().to_owned();
    if let Err(err) = artifact.close() {
        error!(
            path = ?path.display(),
            "failed to delete temporary file: {}",
            err
        );
    }
}
