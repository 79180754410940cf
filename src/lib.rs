//#![no_std]

pub mod acquisition;
pub mod buffer;
pub mod digest;
pub mod error;
pub mod ewf;
pub mod ewf_handle;
pub mod export;
pub mod globber;
pub mod handle;
pub mod information_file;
pub mod pool;
pub mod raw_handle;
pub mod segment_table;
pub mod value_table;

pub use error::{Error, Result};
