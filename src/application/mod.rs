pub mod detector;
pub mod dto;
pub mod imaging;
pub mod ports;
pub mod services;
