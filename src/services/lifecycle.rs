use crate::errors::BookingError;
use crate::models::{BookingStatus, TransitionKind};

/// Events that drive a booking through its lifecycle. Reschedule marks
/// the original row and re-enters the claim flow for the new slot; the
/// other events are plain status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Confirm,
    Cancel,
    Reschedule,
    Complete,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Confirm => "confirm",
            LifecycleEvent::Cancel => "cancel",
            LifecycleEvent::Reschedule => "reschedule",
            LifecycleEvent::Complete => "complete",
        }
    }
}

/// The transition table. Anything not listed is an invalid edge and
/// leaves the booking untouched.
pub fn next_status(
    current: BookingStatus,
    event: LifecycleEvent,
) -> Result<BookingStatus, BookingError> {
    use BookingStatus::*;
    use LifecycleEvent::*;

    match (current, event) {
        (Requested, Confirm) => Ok(Confirmed),
        (Requested, Cancel) | (Confirmed, Cancel) => Ok(Canceled),
        (Requested, Reschedule) | (Confirmed, Reschedule) => Ok(Rescheduled),
        (Confirmed, Complete) => Ok(Completed),
        _ => Err(BookingError::InvalidTransition(format!(
            "cannot {} a {} booking",
            event.as_str(),
            current.as_str()
        ))),
    }
}

pub fn transition_kind(status: BookingStatus) -> TransitionKind {
    match status {
        BookingStatus::Requested => TransitionKind::Requested,
        BookingStatus::Confirmed => TransitionKind::Confirmed,
        BookingStatus::Rescheduled => TransitionKind::Rescheduled,
        BookingStatus::Canceled => TransitionKind::Canceled,
        BookingStatus::Completed => TransitionKind::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;
    use LifecycleEvent::*;

    const ALL_STATUSES: [BookingStatus; 5] =
        [Requested, Confirmed, Rescheduled, Canceled, Completed];
    const ALL_EVENTS: [LifecycleEvent; 4] = [Confirm, Cancel, Reschedule, Complete];

    #[test]
    fn test_table_edges() {
        assert_eq!(next_status(Requested, Confirm).unwrap(), Confirmed);
        assert_eq!(next_status(Requested, Cancel).unwrap(), Canceled);
        assert_eq!(next_status(Confirmed, Cancel).unwrap(), Canceled);
        assert_eq!(next_status(Requested, Reschedule).unwrap(), Rescheduled);
        assert_eq!(next_status(Confirmed, Reschedule).unwrap(), Rescheduled);
        assert_eq!(next_status(Confirmed, Complete).unwrap(), Completed);
    }

    #[test]
    fn test_complete_requires_confirmed() {
        assert!(matches!(
            next_status(Requested, Complete),
            Err(BookingError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_terminal_states_have_no_edges() {
        for terminal in [Rescheduled, Canceled, Completed] {
            for event in ALL_EVENTS {
                assert!(
                    next_status(terminal, event).is_err(),
                    "{} should not accept {}",
                    terminal.as_str(),
                    event.as_str()
                );
            }
        }
    }

    #[test]
    fn test_closure_only_table_edges_succeed() {
        let allowed = [
            (Requested, Confirm),
            (Requested, Cancel),
            (Requested, Reschedule),
            (Confirmed, Cancel),
            (Confirmed, Reschedule),
            (Confirmed, Complete),
        ];
        for status in ALL_STATUSES {
            for event in ALL_EVENTS {
                let expected_ok = allowed.contains(&(status, event));
                assert_eq!(
                    next_status(status, event).is_ok(),
                    expected_ok,
                    "({}, {})",
                    status.as_str(),
                    event.as_str()
                );
            }
        }
    }
}
