pub mod booking;
pub mod notification;
pub mod policy;
pub mod slot;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, RequesterContact};
pub use notification::{NotificationIntent, NotificationStatus, TransitionKind};
pub use policy::BookingPolicy;
pub use slot::Slot;
pub use vehicle::Vehicle;
