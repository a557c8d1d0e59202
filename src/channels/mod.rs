#[cfg(feature = "channel-whatsapp")]
pub mod whatsapp;
