#[cfg(feature = "camera")]
pub mod capture;
