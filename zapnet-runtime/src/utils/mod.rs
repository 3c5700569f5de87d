#[cfg(feature = "std")]
pub mod test;
