use crate::noise::NoiseSource;
use crate::saturate;

pub const ATTENTION_SPAN: f64 = 80.0;
pub const ENGAGEMENT_VARIATION: (f64, f64) = (-15.0, 20.0);
pub const ENGAGEMENT_BASELINE: (f64, f64) = (5.0, 15.0);
pub const MIN_ENGAGEMENT: f64 = 10.0;
pub const MAX_ENGAGEMENT: f64 = 95.0;

/// Engagement percentage from attention alone. The variation is drawn before
/// the baseline.
pub fn engagement_score(attention_score: f64, noise: &mut dyn NoiseSource) -> f64 {
    let attention = saturate(attention_score, 0.0, 1.0);
    let variation = noise.sample(ENGAGEMENT_VARIATION.0, ENGAGEMENT_VARIATION.1);
    let baseline = noise.sample(ENGAGEMENT_BASELINE.0, ENGAGEMENT_BASELINE.1);
    saturate(
        attention * ATTENTION_SPAN + variation + baseline,
        MIN_ENGAGEMENT,
        MAX_ENGAGEMENT,
    )
}
