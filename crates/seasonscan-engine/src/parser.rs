//! Contract for turning a raw response into a structured report

use crate::error::ParseError;
use crate::model::RawResponse;
use crate::report::StructuredReport;

/// Result of interpreting one response.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    Present(StructuredReport),
    /// The portal has no record for the submitted (identifier, period).
    Absent,
}

/// Pure response interpreter.
///
/// "No record" must come back as [`Parsed::Absent`], never as an error:
/// discovery advances on it. `Err` is reserved for responses whose
/// structure is not understood.
pub trait ReportParser: Sync {
    fn parse(&self, raw: &RawResponse) -> Result<Parsed, ParseError>;
}

impl<P: ReportParser> ReportParser for &P {
    fn parse(&self, raw: &RawResponse) -> Result<Parsed, ParseError> {
        (**self).parse(raw)
    }
}
