use serde::{Deserialize, Serialize};

/// Default model input size (width, height) for the litter classifiers
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Memory layout expected by the model input tensor.
///
/// Models exported from Keras keep channels last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    #[default]
    Nhwc,
    Nchw,
}

/// Pixel scaling applied before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `value / 255`
    #[default]
    UnitRange,
    /// `(value / 255 - mean) / std` per channel
    Imagenet,
    /// Raw `0..=255` values as floats
    None,
}

impl Normalization {
    #[inline]
    pub fn apply(&self, value: u8, channel: usize) -> f32 {
        match self {
            Normalization::UnitRange => value as f32 / 255.0,
            Normalization::Imagenet => {
                (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
            Normalization::None => value as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_range_scales_to_zero_one() {
        assert_eq!(Normalization::UnitRange.apply(0, 0), 0.0);
        assert_eq!(Normalization::UnitRange.apply(255, 2), 1.0);
    }

    #[test]
    fn imagenet_uses_per_channel_statistics() {
        // Mid gray: (0.502 - mean) / std differs per channel
        let r = Normalization::Imagenet.apply(128, 0);
        let b = Normalization::Imagenet.apply(128, 2);
        assert!((r - 0.074).abs() < 0.01, "R should be ~0.074, got {r}");
        assert!((b - 0.427).abs() < 0.01, "B should be ~0.427, got {b}");
    }

    #[test]
    fn none_keeps_raw_values() {
        assert_eq!(Normalization::None.apply(42, 1), 42.0);
    }
}
