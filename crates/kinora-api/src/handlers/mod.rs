pub mod cleanup;
pub mod uploads;
