mod leap_shift;

pub use leap_shift::{LeapAndShift, LeapShiftProposal};
