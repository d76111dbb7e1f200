//! Part/vehicle compatibility classification

use crate::models::{Part, Vehicle, Verdict};

/// Compare a part's expected triple against the vehicle, field by field.
///
/// The triple printed on the part is what the reader saw, so it is reported
/// as `scanned_as` for both verdicts.
pub fn classify(vehicle: &Vehicle, part: &Part) -> Verdict {
    let diverging = vehicle.configuration().diverging_from(&part.expected);

    if diverging.is_empty() {
        Verdict::Match {
            part: part.clone(),
            scanned_as: part.expected.clone(),
        }
    } else {
        Verdict::Mismatch {
            part: part.clone(),
            scanned_as: part.expected.clone(),
            diverging,
        }
    }
}
