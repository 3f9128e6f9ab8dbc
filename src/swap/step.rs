// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-visible swap steps and the status → step lookup.

use serde::Serialize;

use crate::models::{Network, SwapStatus};

/// What the user has to do while the backend waits for their transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    /// Send funds on-chain to the swap's deposit address
    DepositAddressShown,
    /// Withdraw from an exchange account by hand
    ExternalWithdrawalInstructions,
    /// Approve the transfer on the exchange's OAuth page
    ExchangeOAuthRedirect,
}

impl UserAction {
    /// Derived from the destination network's type. Unknown networks are
    /// treated as plain chains.
    pub fn for_destination(destination: Option<&Network>) -> Self {
        match destination {
            Some(network) if network.requires_oauth() => UserAction::ExchangeOAuthRedirect,
            Some(network) if network.is_exchange => UserAction::ExternalWithdrawalInstructions,
            _ => UserAction::DepositAddressShown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "step", content = "action", rename_all = "snake_case")]
pub enum SwapWithdrawalStep {
    FormEntry,
    CreatingSwap,
    AwaitingUserAction(UserAction),
    AwaitingConfirmation,
    Completed,
    Failed,
    Cancelled,
}

impl SwapWithdrawalStep {
    /// Steps during which the backend status is polled.
    pub fn is_polling(&self) -> bool {
        matches!(
            self,
            SwapWithdrawalStep::AwaitingUserAction(_) | SwapWithdrawalStep::AwaitingConfirmation
        )
    }

    /// No further status change is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapWithdrawalStep::Completed
                | SwapWithdrawalStep::Failed
                | SwapWithdrawalStep::Cancelled
        )
    }

    /// Step for a server-reported status. Total over [`SwapStatus`]; the
    /// result depends only on the status and the swap's user action.
    pub fn for_status(status: SwapStatus, action: UserAction) -> Self {
        match status {
            SwapStatus::Created
            | SwapStatus::UserTransferPending
            | SwapStatus::UserTransferDelayed => SwapWithdrawalStep::AwaitingUserAction(action),
            SwapStatus::DepositDetected | SwapStatus::LsTransferPending => {
                SwapWithdrawalStep::AwaitingConfirmation
            }
            SwapStatus::Completed => SwapWithdrawalStep::Completed,
            SwapStatus::Failed | SwapStatus::Expired => SwapWithdrawalStep::Failed,
            SwapStatus::Cancelled => SwapWithdrawalStep::Cancelled,
        }
    }
}
