//! Sampling policy applied to each generation call

use crate::error::{GemmaChatError, Result};
use serde::{Deserialize, Serialize};

/// Token selection strategy delegated to the completion primitive
///
/// Serialized with an internal `strategy` tag:
///
/// ```yaml
/// sampling:
///   strategy: randomized
///   temperature: 0.7
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Deterministic argmax decoding
    #[default]
    Greedy,
    /// Temperature-scaled random sampling
    Randomized {
        /// Softmax temperature; must be finite and greater than zero
        temperature: f32,
    },
}

impl SamplingPolicy {
    /// Creates a randomized policy, validating the temperature
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Config` if `temperature` is not finite or
    /// not greater than zero
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::session::SamplingPolicy;
    ///
    /// let policy = SamplingPolicy::randomized(0.5).unwrap();
    /// assert_eq!(policy.temperature(), Some(0.5));
    /// assert!(SamplingPolicy::randomized(0.0).is_err());
    /// ```
    pub fn randomized(temperature: f32) -> Result<Self> {
        let policy = Self::Randomized { temperature };
        policy.validate()?;
        Ok(policy)
    }

    /// Temperature for randomized sampling, `None` for greedy
    pub fn temperature(&self) -> Option<f32> {
        match self {
            Self::Greedy => None,
            Self::Randomized { temperature } => Some(*temperature),
        }
    }

    /// Returns true for greedy decoding
    pub fn is_greedy(&self) -> bool {
        matches!(self, Self::Greedy)
    }

    /// Checks the temperature invariant
    pub fn validate(&self) -> Result<()> {
        if let Self::Randomized { temperature } = self {
            if !temperature.is_finite() || *temperature <= 0.0 {
                return Err(GemmaChatError::Config(format!(
                    "sampling temperature must be greater than 0, got {}",
                    temperature
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greedy => write!(f, "greedy"),
            Self::Randomized { temperature } => write!(f, "randomized (t={})", temperature),
        }
    }
}
