use std::fmt;

use crate::error::OcrError;

/// A cropped, normalized grayscale image ready for recognition.
///
/// Produced by the region sampler; tightly packed (stride == width).
#[derive(Clone, PartialEq, Eq)]
pub struct PreparedImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PreparedImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, OcrError> {
        let required = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| OcrError::InvalidImage {
                reason: "image dimensions overflowed".into(),
            })?;
        if data.len() != required {
            return Err(OcrError::InvalidImage {
                reason: format!(
                    "pixel buffer holds {} bytes, expected {} for {}x{}",
                    data.len(),
                    required,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the image as a binary PGM (P5), the lingua franca for
    /// piping frames into external recognizers.
    pub fn to_pgm(&self) -> Vec<u8> {
        let header = format!("P5\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.data.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

impl fmt::Debug for PreparedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_must_match_dimensions() {
        assert!(PreparedImage::new(4, 4, vec![0; 15]).is_err());
        let image = PreparedImage::new(4, 4, vec![0; 16]).unwrap();
        assert_eq!(image.data().len(), 16);
    }

    #[test]
    fn pgm_header_precedes_pixels() {
        let image = PreparedImage::new(2, 1, vec![10, 20]).unwrap();
        let pgm = image.to_pgm();
        assert!(pgm.starts_with(b"P5\n2 1\n255\n"));
        assert_eq!(&pgm[pgm.len() - 2..], &[10, 20]);
    }
}
