// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and realtime fan-out surface of the deskrelay backend.
//!
//! REST handlers cover transcripts, the inbound send endpoint, action
//! items, and push subscription bookkeeping. The `/ws` endpoint feeds the
//! [`FanoutHub`], which is also the [`deskrelay_relay::Fanout`]
//! implementation the relay pipeline broadcasts through.

pub mod handlers;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod ws;

pub use hub::FanoutHub;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{build_router, start_server, AppState};
