pub mod availability;
pub mod calendar;
pub mod lifecycle;
pub mod notifier;
pub mod scheduling;
pub mod slot_clock;
