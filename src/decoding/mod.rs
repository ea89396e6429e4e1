pub mod beam;
pub mod greedy;
pub mod log_probs;
pub mod ranking;
pub mod single_char;
pub mod vocab;

/// Log-probability treated as probability zero.
pub const LOG_ZERO: f32 = -1.0e30;

/// `ln(exp(a) + exp(b))` without leaving log space.
///
/// Any operand at or below [`LOG_ZERO`] is absorbed, so combining a value with
/// the sentinel returns that value unchanged and never produces NaN.
#[inline]
pub fn log_add_exp(a: f32, b: f32) -> f32 {
    if a <= LOG_ZERO {
        return b;
    }
    if b <= LOG_ZERO {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}
