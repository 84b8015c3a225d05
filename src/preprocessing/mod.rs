// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//! Signal preprocessing module
//!
//! This module handles preprocessing of the raw detector traces before they
//! enter the accumulation buffer.

pub mod highpass;

pub use highpass::{Filter, HighpassFilter};
