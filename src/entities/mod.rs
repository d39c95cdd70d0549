pub mod location;
pub mod reservation;
pub mod stock_movement;
pub mod stock_record;
pub mod transfer;
