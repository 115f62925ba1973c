//! Validation of inbound updates into mergeable (name, angle) pairs.
//!
//! This is pure logic: a rejected message leaves the store untouched and is
//! never broadcast. Full updates are echoed back verbatim, so only the pairs
//! are produced here; the caller reuses the original message as the echo.

use jointsync_protocol::{JointStateMessage, JointUpdate};
use thiserror::Error;

/// Rejection reasons for malformed inbound messages.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Name and position arrays differ in length.
    #[error("Joint name count {names} does not match position count {positions}")]
    LengthMismatch {
        /// Number of names in the message.
        names: usize,
        /// Number of positions in the message.
        positions: usize,
    },

    /// A joint name is empty.
    #[error("Joint name is empty")]
    EmptyJointName,

    /// An angle is NaN or infinite.
    #[error("Angle for joint '{joint}' is not a finite number")]
    NonFiniteAngle {
        /// The offending joint.
        joint: String,
    },
}

/// Validate a full update into pairs for [`StateStore::merge_full`].
///
/// Every pair is validated before any is returned, so a failure guarantees
/// nothing was mergeable.
///
/// # Errors
///
/// Returns a [`MergeError`] if the arrays are mismatched, a name is empty,
/// or a position is not finite.
///
/// [`StateStore::merge_full`]: crate::store::StateStore::merge_full
pub fn full_update_pairs(msg: &JointStateMessage) -> Result<Vec<(String, f64)>, MergeError> {
    if msg.name.len() != msg.position.len() {
        return Err(MergeError::LengthMismatch {
            names: msg.name.len(),
            positions: msg.position.len(),
        });
    }

    msg.name
        .iter()
        .zip(&msg.position)
        .map(|(name, &angle)| {
            validate_joint(name, angle)?;
            Ok((name.clone(), angle))
        })
        .collect()
}

/// Validate a single update into a pair for [`StateStore::merge_one`].
///
/// # Errors
///
/// Returns a [`MergeError`] if the joint name is empty or the angle is not
/// finite.
///
/// [`StateStore::merge_one`]: crate::store::StateStore::merge_one
pub fn single_update_pair(update: &JointUpdate) -> Result<(String, f64), MergeError> {
    validate_joint(&update.joint_name, update.angle)?;
    Ok((update.joint_name.clone(), update.angle))
}

fn validate_joint(name: &str, angle: f64) -> Result<(), MergeError> {
    if name.is_empty() {
        return Err(MergeError::EmptyJointName);
    }
    if !angle.is_finite() {
        return Err(MergeError::NonFiniteAngle {
            joint: name.to_string(),
        });
    }
    Ok(())
}
