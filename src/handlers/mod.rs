pub mod bookings;
pub mod calendar;
pub mod health;
pub mod staff;
pub mod vehicles;
