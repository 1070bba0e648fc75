pub mod hid;
pub mod logging;
pub mod sensor;
pub mod sim;
