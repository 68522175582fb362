//! CPU side texture helpers: cube face naming and mip chain generation.

use std::borrow::Cow;

use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Edge length of every cube map face, in texels.
pub const CUBE_FACE_SIZE: u32 = 2048;

/// Texel used for a 2D texture until its image arrives (opaque blue).
pub const PLACEHOLDER_TEXEL: [u8; 4] = [0, 0, 255, 255];

/// One face of a cube map, in layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face in a cube texture.
    pub fn layer(self) -> u32 {
        self as u32
    }

    /// File stem the face is stored under (`posx`, `negx`, ...).
    pub fn stem(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "posx",
            CubeFace::NegativeX => "negx",
            CubeFace::PositiveY => "posy",
            CubeFace::NegativeY => "negy",
            CubeFace::PositiveZ => "posz",
            CubeFace::NegativeZ => "negz",
        }
    }

    /// URL of this face's image under `base_dir`.
    pub fn url(self, base_dir: &str) -> String {
        format!("{}/{}.jpg", base_dir.trim_end_matches('/'), self.stem())
    }
}

/// Number of mip levels for a texture of the given size, down to 1×1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Builds the full mip chain of `image`, level 0 first.
pub fn mip_chain(image: &RgbaImage) -> Vec<RgbaImage> {
    let levels = mip_level_count(image.width(), image.height());
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());

    for _ in 1..levels {
        let previous = &chain[chain.len() - 1];
        let width = (previous.width() / 2).max(1);
        let height = (previous.height() / 2).max(1);
        let next = imageops::resize(previous, width, height, FilterType::Triangle);
        chain.push(next);
    }

    chain
}

/// Returns `image` scaled to `size`×`size` when it is not already that size.
pub fn fit_square(image: RgbaImage, size: u32) -> RgbaImage {
    if image.width() == size && image.height() == size {
        image
    } else {
        imageops::resize(&image, size, size, FilterType::Triangle)
    }
}

/// Borrowing form of [`fit_square`]: only allocates when `image` must be
/// scaled.
pub fn fit_square_ref(image: &RgbaImage, size: u32) -> Cow<'_, RgbaImage> {
    if image.width() == size && image.height() == size {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(imageops::resize(image, size, size, FilterType::Triangle))
    }
}

/// A `width`×`height` image where every texel is `fill`.
pub fn solid(width: u32, height: u32, fill: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, image::Rgba(fill))
}
