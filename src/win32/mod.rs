//! Windows-specific implementations.
//!
//! This module provides the concrete [`DisplayBackend`](crate::traits::DisplayBackend)
//! for the Win32 GDI display-settings API.
//!
//! Nothing outside this module should reference Win32 directly.

pub mod gdi;
