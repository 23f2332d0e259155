mod interrupt;
mod key;
mod log;
