//! NNUE network weights and the refresh / update / run primitives.

use super::accumulator::Accumulator;
use super::features::INPUTS;

/// Hidden-layer dimension per perspective.
pub const HIDDEN: usize = 128;

/// Number of output heads, selected by queen presence and piece count.
pub const NUM_VARIANTS: usize = 16;

/// First-layer quantization factor.
const QA: i32 = 255;

/// Output-layer quantization factor.
const QB: i32 = 64;

/// Evaluation scale (maps to centipawns).
const SCALE: i32 = 400;

/// Errors produced when assembling a [`Network`] from raw weight slices.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// A weight or bias slice has the wrong number of elements.
    #[error("{tensor}: expected {expected} values, found {found}")]
    DimensionMismatch {
        /// Name of the offending tensor.
        tensor: &'static str,
        /// Required element count.
        expected: usize,
        /// Element count supplied.
        found: usize,
    },
}

/// Quantized (736 -> 128)x2 -> 1 network with [`NUM_VARIANTS`] output heads.
///
/// Layout:
/// - `feature_weights`: one [`Accumulator`]-shaped row per input feature. Quantization: QA.
/// - `feature_bias`: HIDDEN values. Quantization: QA.
/// - `output_weights`: `NUM_VARIANTS x (2 * HIDDEN)`, variant-contiguous,
///   own perspective first. Quantization: QB.
/// - `output_bias`: one scalar per variant. Quantization: QA * QB.
#[derive(Clone)]
pub struct Network {
    feature_weights: Box<[Accumulator]>,
    feature_bias: Accumulator,
    output_weights: Box<[i16]>,
    output_bias: [i16; NUM_VARIANTS],
}

fn check_len(tensor: &'static str, expected: usize, found: usize) -> Result<(), NetworkError> {
    if expected == found {
        Ok(())
    } else {
        Err(NetworkError::DimensionMismatch {
            tensor,
            expected,
            found,
        })
    }
}

const fn xorshift64(state: u64) -> u64 {
    let mut x = state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// Deterministic weight stream for [`Network::seeded`].
struct WeightRng(u64);

impl WeightRng {
    fn new(seed: u64) -> Self {
        // xorshift has a fixed point at zero.
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    /// Uniform value in `-bound..=bound`.
    fn next(&mut self, bound: i16) -> i16 {
        self.0 = xorshift64(self.0);
        let span = 2 * u64::from(bound.unsigned_abs()) + 1;
        ((self.0 % span) as i64 - i64::from(bound)) as i16
    }
}

impl Network {
    /// Assemble a network from flat weight slices.
    ///
    /// `feature_weights` is row-major `INPUTS x HIDDEN`, `output_weights` is
    /// `NUM_VARIANTS x 2 x HIDDEN`.
    pub fn from_parts(
        feature_weights: &[i16],
        feature_bias: &[i16],
        output_weights: &[i16],
        output_bias: &[i16],
    ) -> Result<Network, NetworkError> {
        check_len("feature_weights", INPUTS * HIDDEN, feature_weights.len())?;
        check_len("feature_bias", HIDDEN, feature_bias.len())?;
        check_len("output_weights", NUM_VARIANTS * 2 * HIDDEN, output_weights.len())?;
        check_len("output_bias", NUM_VARIANTS, output_bias.len())?;

        Ok(Network::assemble(feature_weights, feature_bias, output_weights, output_bias))
    }

    /// Build a network with small pseudo-random weights derived from `seed`.
    ///
    /// Not a trained evaluator: it exists to drive the incremental
    /// machinery with a reproducible, non-trivial weight set.
    pub fn seeded(seed: u64) -> Network {
        let mut rng = WeightRng::new(seed);

        let feature_weights: Vec<i16> = (0..INPUTS * HIDDEN).map(|_| rng.next(24)).collect();
        let feature_bias: Vec<i16> = (0..HIDDEN).map(|_| rng.next(64)).collect();
        let output_weights: Vec<i16> =
            (0..NUM_VARIANTS * 2 * HIDDEN).map(|_| rng.next(6)).collect();
        let output_bias: Vec<i16> = (0..NUM_VARIANTS).map(|_| rng.next(512)).collect();

        Network::assemble(&feature_weights, &feature_bias, &output_weights, &output_bias)
    }

    /// Build from slices whose lengths are already known to be correct.
    fn assemble(
        feature_weights: &[i16],
        feature_bias: &[i16],
        output_weights: &[i16],
        output_bias: &[i16],
    ) -> Network {
        let mut bias = [0i16; NUM_VARIANTS];
        bias.copy_from_slice(output_bias);

        Network {
            feature_weights: feature_weights
                .chunks_exact(HIDDEN)
                .map(Accumulator::from_slice)
                .collect(),
            feature_bias: Accumulator::from_slice(feature_bias),
            output_weights: output_weights.into(),
            output_bias: bias,
        }
    }

    /// Full recompute: bias plus the weight rows of every active feature.
    pub fn refresh(&self, features: &[usize]) -> Accumulator {
        let mut acc = self.feature_bias;
        for &idx in features {
            acc.add(&self.feature_weights[idx]);
        }
        acc
    }

    /// Incremental recompute from `base`.
    pub fn update(&self, base: &Accumulator, added: &[usize], removed: &[usize]) -> Accumulator {
        let mut acc = *base;
        for &idx in added {
            acc.add(&self.feature_weights[idx]);
        }
        for &idx in removed {
            acc.sub(&self.feature_weights[idx]);
        }
        acc
    }

    /// Forward pass: SCReLU activation, output dequantization.
    ///
    /// Returns centipawns from the `own` perspective.
    pub fn run(&self, own: &Accumulator, their: &Accumulator, variant: usize) -> i32 {
        assert!(variant < NUM_VARIANTS, "network variant {variant} out of range");
        let base = variant * 2 * HIDDEN;
        let (own_weights, their_weights) =
            self.output_weights[base..base + 2 * HIDDEN].split_at(HIDDEN);

        let mut output = 0i64;
        for (&x, &w) in own.vals.iter().zip(own_weights) {
            output += i64::from(screlu(x)) * i64::from(w);
        }
        for (&x, &w) in their.vals.iter().zip(their_weights) {
            output += i64::from(screlu(x)) * i64::from(w);
        }

        // Dequantize: QA*QA*QB -> QA*QB
        output /= i64::from(QA);
        output += i64::from(self.output_bias[variant]);
        output *= i64::from(SCALE);
        output /= i64::from(QA * QB);

        output as i32
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("inputs", &self.feature_weights.len())
            .field("hidden", &HIDDEN)
            .field("variants", &NUM_VARIANTS)
            .finish()
    }
}

/// SCReLU activation: clamp to [0, QA] then square.
#[inline]
fn screlu(x: i16) -> i32 {
    let y = i32::from(x).clamp(0, QA);
    y * y
}
