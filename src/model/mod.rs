pub mod aligner;

pub use aligner::{AlignerConfig, AlignerOutput, BatchNorm, ConvBn, FeatureMap, VideoAligner, hswish};
