//! Line-oriented request transport.
//!
//! External tools (a tray shell, scripts, key-bind helpers, ...) write one
//! layout request per line and read one JSON result per line.

pub mod listener;
