// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs one closure
//! on the connection thread.

pub mod deliveries;
pub mod records;
pub mod sessions;
