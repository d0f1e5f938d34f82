//! Requested date range against the annotated time coverage.

use chrono::NaiveDate;
use sdmx_client::Availability;
use sdmx_model::{EngineError, Result, parse_date_bound};

/// Fails when the requested range cannot overlap the available data.
///
/// `time_end` marks the end of the last period (`2025-01-01` means data up to
/// the end of 2024), so a start on that date is already too late. Both
/// annotations must be present and parse; otherwise the check is skipped.
pub fn check_time_range(
    availability: &Availability,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    let (Some(time_start), Some(time_end)) = (&availability.time_start, &availability.time_end)
    else {
        return Ok(());
    };
    let (Some(earliest), Some(latest)) =
        (parse_date_bound(time_start), parse_date_bound(time_end))
    else {
        return Ok(());
    };

    if let Some(start) = start.filter(|start| *start >= latest) {
        return Err(EngineError::StartAfterLatest {
            requested: start.to_string(),
            latest: time_end.clone(),
        });
    }
    if let Some(end) = end.filter(|end| *end <= earliest) {
        return Err(EngineError::EndBeforeEarliest {
            requested: end.to_string(),
            earliest: time_start.clone(),
        });
    }
    Ok(())
}
