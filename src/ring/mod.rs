// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Circular byte buffers.
//!
//! [`ByteRing`] rejects writes that do not fit; [`OverwriteRing`] evicts the
//! oldest unread bytes so writes up to the capacity always succeed. Neither
//! locks internally; callers bring their own synchronization.

pub mod byte_ring;
pub mod overwrite;

pub use byte_ring::ByteRing;
pub use overwrite::OverwriteRing;
