use crate::error::{PreviewError, Result};

/// Raw numeric image buffer handed across the invocation boundary.
///
/// The external pipeline supplies either float data in `[0, 1]` or data
/// already in byte range; shapes are `(H, W, 3)`, `(1, H, W, 3)`, or a
/// batch `(N, H, W, 3)`. The tensor is returned to the caller unmodified;
/// normalization always copies.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: Vec<usize>,
    data: TensorData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl ImageTensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        let actual = match &data {
            TensorData::F32(v) => v.len(),
            TensorData::U8(v) => v.len(),
        };
        if expected != actual || shape.is_empty() {
            return Err(PreviewError::Shape(format!(
                "shape {shape:?} does not describe {actual} elements"
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Split into per-frame views of `(height, width)` with 3 channels.
    ///
    /// A leading batch dimension (including size 1) is removed; any other
    /// dimensionality or a channel count other than 3 is a shape error.
    pub fn frames(&self) -> Result<Vec<FrameView<'_>>> {
        let (batch, h, w, c) = match self.shape.as_slice() {
            [h, w, c] => (1, *h, *w, *c),
            [n, h, w, c] => (*n, *h, *w, *c),
            other => {
                return Err(PreviewError::Shape(format!(
                    "expected (H,W,3) or (N,H,W,3), got {other:?}"
                )))
            }
        };
        if c != 3 {
            return Err(PreviewError::Shape(format!(
                "expected 3 channels, got {c} in shape {:?}",
                self.shape
            )));
        }
        if h == 0 || w == 0 || batch == 0 {
            return Err(PreviewError::Shape(format!(
                "degenerate dimensions in shape {:?}",
                self.shape
            )));
        }
        let stride = h * w * c;
        let mut out = Vec::with_capacity(batch);
        for i in 0..batch {
            let range = i * stride..(i + 1) * stride;
            let pixels = match &self.data {
                TensorData::F32(v) => FramePixels::F32(&v[range]),
                TensorData::U8(v) => FramePixels::U8(&v[range]),
            };
            out.push(FrameView {
                width: w as u32,
                height: h as u32,
                pixels,
            });
        }
        Ok(out)
    }
}

/// Borrowed single frame in row-major `(H, W, 3)` order.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: FramePixels<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum FramePixels<'a> {
    F32(&'a [f32]),
    U8(&'a [u8]),
}

impl FrameView<'_> {
    /// Interleaved RGB bytes; floats are treated as `[0, 1]` and scaled.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        match self.pixels {
            FramePixels::U8(src) => src.to_vec(),
            FramePixels::F32(src) => src
                .iter()
                .map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_batch_dim_is_removed() {
        let t = ImageTensor::new(vec![1, 2, 2, 3], TensorData::U8(vec![7; 12])).unwrap();
        let frames = t.frames().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].width, frames[0].height), (2, 2));
    }

    #[test]
    fn batch_splits_into_frames() {
        let t = ImageTensor::new(vec![3, 1, 1, 3], TensorData::F32(vec![1.0; 9])).unwrap();
        assert_eq!(t.frames().unwrap().len(), 3);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let t = ImageTensor::new(vec![2, 2, 4], TensorData::U8(vec![0; 16])).unwrap();
        assert!(matches!(t.frames(), Err(PreviewError::Shape(_))));
    }

    #[test]
    fn rejects_mismatched_data_length() {
        assert!(ImageTensor::new(vec![2, 2, 3], TensorData::U8(vec![0; 5])).is_err());
    }

    #[test]
    fn float_frames_scale_to_bytes() {
        let t = ImageTensor::new(vec![1, 1, 3], TensorData::F32(vec![0.0, 0.5, 1.0])).unwrap();
        let bytes = t.frames().unwrap()[0].to_rgb_bytes();
        assert_eq!(bytes, vec![0, 128, 255]);
    }
}
