#![allow(dead_code)]

mod device;

pub use device::*;
