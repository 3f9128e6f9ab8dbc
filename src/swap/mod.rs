// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Swap Lifecycle
//!
//! - [`step`]: client-visible steps and the status → step lookup
//! - [`controller`]: the state machine that owns one swap's transitions
//! - `poller`: the cancellable status poll loop driven by the controller
//! - [`callback`]: recognition of returns from external redirects

pub mod callback;
pub mod controller;
mod poller;
pub mod step;

pub use callback::RedirectCallback;
pub use controller::{
    ConnectNetworkPrompt, ControllerError, ControllerFault, ControllerHandle, ControllerState,
    SubmitFailure, SwapLifecycleController,
};
pub use step::{SwapWithdrawalStep, UserAction};
