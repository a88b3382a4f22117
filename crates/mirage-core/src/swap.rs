//! Face swap seam and tuning parameters.
//!
//! The generative swap model is external; [`SwapEngine`] is the contract a
//! model backend implements. [`PassthroughSwap`] is the identity backend:
//! it validates the pair and reports what would be swapped without
//! transforming any pixels.

use crate::types::Face;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_QUALITY: u8 = 75;
const MAX_QUALITY: u8 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("swap engine not ready")]
    NotReady,
    #[error("cannot swap face {0} with itself")]
    SameFace(String),
}

/// User-facing swap tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    /// Swap intensity, 0–100.
    pub quality: u8,
    pub preserve_expression: bool,
    pub preserve_color: bool,
}

impl Default for SwapParams {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            preserve_expression: true,
            preserve_color: false,
        }
    }
}

/// Partial update of [`SwapParams`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapSettings {
    /// Requested quality; clamped to 0–100.
    pub quality: Option<i32>,
    pub preserve_expression: Option<bool>,
    pub preserve_color: Option<bool>,
}

impl SwapParams {
    /// Set quality, clamping to 0–100.
    pub fn set_quality(&mut self, quality: i32) {
        self.quality = quality.clamp(0, MAX_QUALITY as i32) as u8;
    }

    pub fn apply(&mut self, settings: SwapSettings) {
        if let Some(q) = settings.quality {
            self.set_quality(q);
        }
        if let Some(v) = settings.preserve_expression {
            self.preserve_expression = v;
        }
        if let Some(v) = settings.preserve_color {
            self.preserve_color = v;
        }
    }

    /// Quality as a blend weight in [0, 1].
    pub fn intensity(&self) -> f32 {
        self.quality as f32 / MAX_QUALITY as f32
    }
}

/// Result of one swap call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapOutcome {
    pub source_id: String,
    pub target_id: String,
    pub intensity: f32,
    pub preserve_expression: bool,
    pub preserve_color: bool,
}

/// A face swap backend.
pub trait SwapEngine {
    fn is_ready(&self) -> bool;

    /// Put `target`'s appearance onto `source`.
    fn swap(&mut self, source: &Face, target: &Face, params: &SwapParams)
        -> Result<SwapOutcome, SwapError>;
}

/// Identity swap backend.
#[derive(Debug, Default)]
pub struct PassthroughSwap {
    ready: bool,
    swaps: u64,
}

impl PassthroughSwap {
    /// A backend that is ready immediately.
    pub fn new() -> Self {
        Self { ready: true, swaps: 0 }
    }

    /// A backend that has not finished loading; every swap fails.
    pub fn unready() -> Self {
        Self::default()
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }
}

impl SwapEngine for PassthroughSwap {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn swap(
        &mut self,
        source: &Face,
        target: &Face,
        params: &SwapParams,
    ) -> Result<SwapOutcome, SwapError> {
        if !self.ready {
            return Err(SwapError::NotReady);
        }
        if source.id == target.id {
            return Err(SwapError::SameFace(source.id.clone()));
        }

        self.swaps += 1;
        tracing::trace!(
            source = %source.id,
            target = %target.id,
            quality = params.quality,
            preserve_expression = params.preserve_expression,
            preserve_color = params.preserve_color,
            "swap"
        );

        Ok(SwapOutcome {
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            intensity: params.intensity(),
            preserve_expression: params.preserve_expression,
            preserve_color: params.preserve_color,
        })
    }
}

/// Pair every face with the selected one: `(source, target)` where target is
/// the selected face. Empty when nothing is selected or the selected face is
/// not in `faces`.
pub fn swap_pairs<'a>(faces: &'a [Face], selected: Option<&str>) -> Vec<(&'a Face, &'a Face)> {
    let Some(selected) = selected else {
        return Vec::new();
    };
    let Some(target) = faces.iter().find(|f| f.id == selected) else {
        return Vec::new();
    };
    faces
        .iter()
        .filter(|f| f.id != target.id)
        .map(|f| (f, target))
        .collect()
}
