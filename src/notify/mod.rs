// Outbound notifications

pub mod email;
