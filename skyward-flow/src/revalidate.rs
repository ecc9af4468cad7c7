use futures_util::future::try_join;
use tracing::{info, warn};

use skyward_core::{BookingBackend, FareItinerary, RejectionKind, SelectedFare};

use crate::error::{FlowError, FlowResult};

/// Re-confirms every leg of the selection and returns the server's copy.
///
/// Round-trip legs carry independent fare source codes and are checked
/// concurrently; the first invalid or failing leg aborts the whole
/// selection.
pub async fn revalidate_selection(
    backend: &dyn BookingBackend,
    session_id: &str,
    selected: &SelectedFare,
) -> FlowResult<SelectedFare> {
    match selected {
        SelectedFare::OneWay { itinerary } => {
            let itinerary = revalidate_leg(backend, session_id, itinerary).await?;
            Ok(SelectedFare::OneWay { itinerary })
        }
        SelectedFare::RoundTrip { outbound, inbound } => {
            let (outbound, inbound) = try_join(
                revalidate_leg(backend, session_id, outbound),
                revalidate_leg(backend, session_id, inbound),
            )
            .await?;
            Ok(SelectedFare::RoundTrip { outbound, inbound })
        }
    }
}

async fn revalidate_leg(
    backend: &dyn BookingBackend,
    session_id: &str,
    cached: &FareItinerary,
) -> FlowResult<FareItinerary> {
    let code = cached.fare_source_code();
    let revalidation = backend
        .revalidate(session_id, code)
        .await
        .map_err(FlowError::from)
        .map_err(|e| match e {
            FlowError::Rejected(r) if r.kind == RejectionKind::FareExpired => FlowError::FareExpired,
            other => other,
        })?;

    if !revalidation.is_valid {
        info!("Fare {} no longer valid", code);
        return Err(FlowError::FareExpired);
    }

    match revalidation.itinerary {
        Some(fresh) => {
            let old = cached.total();
            let new = fresh.total();
            if old != new {
                info!(
                    "Fare {} repriced from {} {} to {} {}",
                    code, old.amount, old.currency, new.amount, new.currency
                );
            }
            Ok(fresh)
        }
        None => {
            warn!("Revalidation of {} returned no itinerary, keeping search copy", code);
            Ok(cached.clone())
        }
    }
}
