// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - client state and flows.

pub mod activation;
pub mod backend;
pub mod feedback;
pub mod locale;
#[cfg(debug_assertions)]
pub mod mock_backend;
pub mod poll;
pub mod recharge;
pub mod session;
pub mod storage;
pub mod wallet;

pub use activation::{
    evaluate, start_countdown, AccountsFeed, ActivationOutcome, ActivationService, ProviderStatus,
    ToolLaunch,
};
pub use backend::{ApiClient, Backend};
pub use feedback::{
    FeedbackController, FeedbackKind, FeedbackNotice, FeedbackSink, FeedbackStep,
    FeedbackSubmission, FeedbackWizard, LogFeedbackSink,
};
pub use locale::{GeoLocator, IpApiLocator, LocaleService};
#[cfg(debug_assertions)]
pub use mock_backend::MockBackend;
pub use poll::PollHandle;
pub use recharge::{RechargeController, RechargeWizard, Step, StepBlocked, SubmitOutcome};
pub use session::{SessionService, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use wallet::WalletService;
