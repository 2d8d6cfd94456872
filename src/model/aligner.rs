//! Evaluation-time temporal embedding of a video neck.
//!
//! Backbone features `[C][T][H][W]` are average pooled over a sliding
//! `spatial_size` window, mapped through two 1x1x1 conv layers with folded
//! batch norm and an h-swish in between, then L2 normalised over channels.
//! The features themselves pass through untouched.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

const NORM_EPS: f64 = 1e-12;

/// Dense `[channels][time][height][width]` feature volume.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
    channels: usize,
    time: usize,
    height: usize,
    width: usize,
    data: Vec<f64>,
}

impl FeatureMap {
    pub fn new(
        channels: usize,
        time: usize,
        height: usize,
        width: usize,
        data: Vec<f64>,
    ) -> Result<Self> {
        let expected = channels * time * height * width;
        if data.len() != expected {
            return Err(EvalError::shape(format!(
                "feature map {channels}x{time}x{height}x{width} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self {
            channels,
            time,
            height,
            width,
            data,
        })
    }

    pub fn zeros(channels: usize, time: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            time,
            height,
            width,
            data: vec![0.0; channels * time * height * width],
        }
    }

    /// `(channels, time, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.channels, self.time, self.height, self.width)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    fn offset(&self, c: usize, t: usize, h: usize, w: usize) -> usize {
        ((c * self.time + t) * self.height + h) * self.width + w
    }

    #[inline]
    pub fn get(&self, c: usize, t: usize, h: usize, w: usize) -> f64 {
        self.data[self.offset(c, t, h, w)]
    }

    #[inline]
    fn set(&mut self, c: usize, t: usize, h: usize, w: usize, value: f64) {
        let idx = self.offset(c, t, h, w);
        self.data[idx] = value;
    }

    /// Channel vector at one `(t, h, w)` position.
    pub fn channel_vector(&self, t: usize, h: usize, w: usize) -> Vec<f64> {
        (0..self.channels).map(|c| self.get(c, t, h, w)).collect()
    }
}

/// Inference-time batch norm statistics for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNorm {
    pub gamma: Vec<f64>,
    pub beta: Vec<f64>,
    pub running_mean: Vec<f64>,
    pub running_var: Vec<f64>,
    pub eps: f64,
}

/// 1x1x1 convolution with batch norm folded into weight and bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvBn {
    /// `out_channels x in_channels`.
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl ConvBn {
    pub fn new(weight: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self> {
        let layer = Self { weight, bias };
        layer.check()?;
        Ok(layer)
    }

    /// Folds `bn(conv(x))` into a single affine map. The conv carries no bias.
    pub fn from_batch_norm(weight: Vec<Vec<f64>>, bn: &BatchNorm) -> Result<Self> {
        let out = weight.len();
        if [bn.gamma.len(), bn.beta.len(), bn.running_mean.len(), bn.running_var.len()]
            .iter()
            .any(|&n| n != out)
        {
            return Err(EvalError::shape(format!(
                "batch norm statistics do not match {out} output channels"
            )));
        }
        if !(bn.eps > 0.0) {
            return Err(EvalError::invalid("batch norm eps must be positive"));
        }

        let mut folded = weight;
        let mut bias = Vec::with_capacity(out);
        for (o, row) in folded.iter_mut().enumerate() {
            let scale = bn.gamma[o] / (bn.running_var[o] + bn.eps).sqrt();
            for w in row.iter_mut() {
                *w *= scale;
            }
            bias.push(bn.beta[o] - bn.running_mean[o] * scale);
        }
        Self::new(folded, bias)
    }

    pub fn in_channels(&self) -> usize {
        self.weight.first().map_or(0, Vec::len)
    }

    pub fn out_channels(&self) -> usize {
        self.weight.len()
    }

    fn check(&self) -> Result<()> {
        let width = self.in_channels();
        if self.weight.iter().any(|row| row.len() != width) {
            return Err(EvalError::shape("conv weight rows differ in length"));
        }
        if self.bias.len() != self.weight.len() {
            return Err(EvalError::shape(format!(
                "conv bias has {} entries for {} output channels",
                self.bias.len(),
                self.weight.len()
            )));
        }
        Ok(())
    }

    fn apply(&self, input: &[f64]) -> Vec<f64> {
        self.weight
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// `x * relu6(x + 3) / 6`.
#[inline]
pub fn hswish(x: f64) -> f64 {
    x * (x + 3.0).clamp(0.0, 6.0) / 6.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignerConfig {
    pub in_channels: usize,
    /// Pooling window `(height, width)`.
    pub spatial_size: (usize, usize),
    pub temporal_size: usize,
    pub hidden_size: usize,
    pub embedding_size: usize,
}

impl AlignerConfig {
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            spatial_size: (7, 7),
            temporal_size: 1,
            hidden_size: 512,
            embedding_size: 256,
        }
    }

    fn validate(&self) -> Result<()> {
        let (sh, sw) = self.spatial_size;
        if self.in_channels == 0
            || sh == 0
            || sw == 0
            || self.temporal_size == 0
            || self.hidden_size == 0
            || self.embedding_size == 0
        {
            return Err(EvalError::config(format!(
                "aligner sizes must all be positive: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Result of `VideoAligner::forward`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerOutput<'a> {
    /// The input features, unchanged.
    pub features: &'a FeatureMap,
    /// `None` in training mode.
    pub temporal_embedding: Option<FeatureMap>,
}

#[derive(Debug, Clone)]
pub struct VideoAligner {
    config: AlignerConfig,
    project: ConvBn,
    embed: ConvBn,
}

impl VideoAligner {
    pub fn new(config: AlignerConfig, project: ConvBn, embed: ConvBn) -> Result<Self> {
        config.validate()?;
        project.check()?;
        embed.check()?;
        if project.in_channels() != config.in_channels
            || project.out_channels() != config.hidden_size
        {
            return Err(EvalError::shape(format!(
                "first mapper layer is {}x{}, expected {}x{}",
                project.out_channels(),
                project.in_channels(),
                config.hidden_size,
                config.in_channels
            )));
        }
        if embed.in_channels() != config.hidden_size
            || embed.out_channels() != config.embedding_size
        {
            return Err(EvalError::shape(format!(
                "second mapper layer is {}x{}, expected {}x{}",
                embed.out_channels(),
                embed.in_channels(),
                config.embedding_size,
                config.hidden_size
            )));
        }
        Ok(Self {
            config,
            project,
            embed,
        })
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Passes `features` through and, in eval mode, adds the temporal
    /// embedding `[E][T][H'][W']` with `H' = H - sh + 1` and `W' = W - sw + 1`.
    pub fn forward<'a>(&self, features: &'a FeatureMap, training: bool) -> Result<AlignerOutput<'a>> {
        let temporal_embedding = if training {
            None
        } else {
            Some(self.temporal_embedding(features)?)
        };
        Ok(AlignerOutput {
            features,
            temporal_embedding,
        })
    }

    fn temporal_embedding(&self, features: &FeatureMap) -> Result<FeatureMap> {
        let (channels, time, height, width) = features.shape();
        if channels != self.config.in_channels {
            return Err(EvalError::shape(format!(
                "aligner expects {} channels, got {channels}",
                self.config.in_channels
            )));
        }
        let (sh, sw) = self.config.spatial_size;
        if height < sh || width < sw {
            return Err(EvalError::shape(format!(
                "feature map {height}x{width} is smaller than the {sh}x{sw} pooling window"
            )));
        }

        let pooled = spatial_pool(features, sh, sw);
        let (_, _, out_h, out_w) = pooled.shape();
        let mut out = FeatureMap::zeros(self.config.embedding_size, time, out_h, out_w);
        for t in 0..time {
            for h in 0..out_h {
                for w in 0..out_w {
                    let hidden = self
                        .project
                        .apply(&pooled.channel_vector(t, h, w))
                        .into_iter()
                        .map(hswish)
                        .collect::<Vec<_>>();
                    let embedding = l2_normalize(self.embed.apply(&hidden));
                    for (c, v) in embedding.into_iter().enumerate() {
                        out.set(c, t, h, w, v);
                    }
                }
            }
        }
        tracing::debug!(
            "aligner embedding {}x{time}x{out_h}x{out_w}",
            self.config.embedding_size
        );
        Ok(out)
    }
}

fn spatial_pool(features: &FeatureMap, sh: usize, sw: usize) -> FeatureMap {
    let (channels, time, height, width) = features.shape();
    let out_h = height - sh + 1;
    let out_w = width - sw + 1;
    let area = (sh * sw) as f64;
    let mut out = FeatureMap::zeros(channels, time, out_h, out_w);
    for c in 0..channels {
        for t in 0..time {
            for h in 0..out_h {
                for w in 0..out_w {
                    let mut sum = 0.0f64;
                    for dh in 0..sh {
                        for dw in 0..sw {
                            sum += features.get(c, t, h + dh, w + dw);
                        }
                    }
                    out.set(c, t, h, w, sum / area);
                }
            }
        }
    }
    out
}

fn l2_normalize(mut v: Vec<f64>) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt().max(NORM_EPS);
    for x in v.iter_mut() {
        *x /= norm;
    }
    v
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/aligner.rs"]
mod tests;
