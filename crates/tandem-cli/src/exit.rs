//! Process exit codes.

use tandem_engine::Error;

pub const GENERIC_FAILURE: u8 = 1;
pub const SCAN_FAILURE: u8 = 2;
pub const PARSE_FAILURE: u8 = 3;
pub const PARTIAL_APPLY: u8 = 4;
pub const PLAN_REJECTED: u8 = 5;
pub const CANCELLED: u8 = 130;

/// Exit code for an error, from the first engine error in its chain
pub fn code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(engine_code)
        .unwrap_or(GENERIC_FAILURE)
}

fn engine_code(err: &Error) -> u8 {
    match err {
        Error::Scan { .. } => SCAN_FAILURE,
        Error::Parse { .. } => PARSE_FAILURE,
        Error::PartialApply { .. } => PARTIAL_APPLY,
        Error::Plan(_) => PLAN_REJECTED,
        Error::Cancelled => CANCELLED,
        _ => GENERIC_FAILURE,
    }
}
