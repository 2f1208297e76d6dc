// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recharge wizard.
//!
//! Split in two layers:
//! - [`RechargeWizard`]: synchronous state machine. Steps move only through
//!   [`transition`], a pure `step × event → step` table. Async work is
//!   started with a `begin_*`/`select_*` call returning a [`Ticket`] and
//!   applied with the matching `finish_*` call, which discards the result if
//!   the dialog was closed or reset in between.
//! - [`RechargeController`]: drives the wizard against the backend, holding
//!   the lock only between awaits.

use crate::config::RechargePolicy;
use crate::error::ClientError;
use crate::models::{CreatePaymentRequest, Payment, PaymentMethod, ProofFile};
use crate::services::backend::Backend;
use crate::services::locale::LocaleService;
use crate::services::session::SessionService;
use crate::services::wallet::WalletService;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Method,
    Amount,
    Payment,
    Confirm,
    /// Dead end for payment flows that are switched off.
    CardMaintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Next,
    Back,
}

/// Why a step change (or step action) was refused. Never sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepBlocked {
    #[error("Select a payment method")]
    NoMethodSelected,
    #[error("This payment method is not available")]
    MethodUnavailable,
    #[error("Enter a valid amount")]
    InvalidAmount,
    #[error("The minimum amount is ${0} USD")]
    BelowMinimum(Decimal),
    #[error("The maximum amount is ${0} USD")]
    AboveMaximum(Decimal),
    #[error("Enter a reference number or upload a receipt")]
    MissingEvidence,
    #[error("Wait for the current request to finish")]
    Pending,
    #[error("Confirm the recharge to submit it")]
    SubmitRequired,
    #[error("This payment method is under maintenance")]
    DeadEnd,
    #[error("Already at the first step")]
    AtFirstStep,
    #[error("The recharge dialog is closed")]
    Closed,
    #[error("Not available on the {0:?} step")]
    WrongStep(Step),
}

/// State of the selected method as far as the `Method` step cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodGuard {
    None,
    Unavailable,
    Disabled,
    Enabled,
}

/// Facts consulted by [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guards {
    pub method: MethodGuard,
    pub amount: Result<Decimal, StepBlocked>,
    pub has_evidence: bool,
    pub rate_pending: bool,
    pub upload_pending: bool,
}

/// The transition table.
pub fn transition(step: Step, event: Event, guards: &Guards) -> Result<Step, StepBlocked> {
    match (step, event) {
        (Step::Method, Event::Next) => {
            if guards.rate_pending {
                return Err(StepBlocked::Pending);
            }
            match guards.method {
                MethodGuard::None => Err(StepBlocked::NoMethodSelected),
                MethodGuard::Unavailable => Err(StepBlocked::MethodUnavailable),
                MethodGuard::Disabled => Ok(Step::CardMaintenance),
                MethodGuard::Enabled => Ok(Step::Amount),
            }
        }
        (Step::Amount, Event::Next) => guards.amount.clone().map(|_| Step::Payment),
        (Step::Payment, Event::Next) => {
            if guards.upload_pending {
                Err(StepBlocked::Pending)
            } else if guards.has_evidence {
                Ok(Step::Confirm)
            } else {
                Err(StepBlocked::MissingEvidence)
            }
        }
        (Step::Confirm, Event::Next) => Err(StepBlocked::SubmitRequired),
        (Step::CardMaintenance, Event::Next) => Err(StepBlocked::DeadEnd),

        (Step::Method, Event::Back) => Err(StepBlocked::AtFirstStep),
        (Step::Amount, Event::Back) => Ok(Step::Method),
        (Step::Payment, Event::Back) => Ok(Step::Amount),
        (Step::Confirm, Event::Back) => Ok(Step::Payment),
        (Step::CardMaintenance, Event::Back) => Ok(Step::Method),
    }
}

/// Parse a user-typed USD amount. Accepts a decimal comma.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized)
        .ok()
        .filter(|a| *a >= Decimal::ZERO)
}

/// Check an amount input against the policy bounds.
pub fn check_amount(input: &str, policy: &RechargePolicy) -> Result<Decimal, StepBlocked> {
    let amount = parse_amount(input).ok_or(StepBlocked::InvalidAmount)?;
    if amount < policy.min_amount_usd {
        return Err(StepBlocked::BelowMinimum(policy.min_amount_usd));
    }
    if amount > policy.max_amount_usd {
        return Err(StepBlocked::AboveMaximum(policy.max_amount_usd));
    }
    Ok(amount)
}

/// `floor(amount × points_per_usd)`, or 0 when it does not fit.
pub fn points_for(amount_usd: Decimal, points_per_usd: u64) -> u64 {
    amount_usd
        .checked_mul(Decimal::from(points_per_usd))
        .and_then(|points| points.floor().to_u64())
        .unwrap_or(0)
}

/// Wizard-local answers. Never partially submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RechargeDraft {
    pub selected_method_id: Option<String>,
    /// Raw text so going back and forth shows exactly what was typed
    pub amount_input: String,
    pub reference_code: Option<String>,
    pub proof_asset_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Live,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuote {
    /// Local currency units per USD
    pub rate: Decimal,
    pub source: RateSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodsState {
    Idle,
    Loading,
    Loaded(Vec<PaymentMethod>),
    Failed(String),
}

/// Identifies the dialog session an async request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// An exchange-rate fetch the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    pub ticket: Ticket,
    pub method_id: String,
    /// Selection counter at the time of the request
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// The owning dialog was closed or the selection moved on.
    Discarded,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Pending payment recorded; the wizard has closed and reset.
    Submitted(Payment),
    /// Still on `Confirm` with the draft intact.
    Failed(String),
    Discarded,
}

impl SubmitOutcome {
    /// Toast text for the outcome, if one should be shown.
    pub fn notice(&self) -> Option<String> {
        match self {
            SubmitOutcome::Submitted(_) => Some(
                "Recharge in progress. Your points will be credited once the payment is verified."
                    .to_string(),
            ),
            SubmitOutcome::Failed(message) => Some(message.clone()),
            SubmitOutcome::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// Previous proof (if any) kept; still on `Payment`.
    Failed,
    Discarded,
}

/// The recharge state machine.
#[derive(Debug, Clone)]
pub struct RechargeWizard {
    policy: RechargePolicy,
    open: bool,
    generation: u64,
    step: Step,
    local_region: bool,
    methods: MethodsState,
    draft: RechargeDraft,
    rate: Option<RateQuote>,
    /// Survives resets; first fallback before the static rate.
    last_live_rate: Option<Decimal>,
    /// Bumped on every selection change; only the newest rate fetch applies.
    rate_seq: u64,
    rate_pending: bool,
    upload_pending: bool,
    submit_pending: bool,
    warning: Option<String>,
    error: Option<String>,
}

impl RechargeWizard {
    pub fn new(policy: RechargePolicy) -> Self {
        Self {
            policy,
            open: false,
            generation: 0,
            step: Step::Method,
            local_region: false,
            methods: MethodsState::Idle,
            draft: RechargeDraft::default(),
            rate: None,
            last_live_rate: None,
            rate_seq: 0,
            rate_pending: false,
            upload_pending: false,
            submit_pending: false,
            warning: None,
            error: None,
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Open at `Method` with an empty draft; the caller loads methods.
    pub fn open(&mut self, local_region: bool) -> Ticket {
        self.reset();
        self.open = true;
        self.local_region = local_region;
        self.methods = MethodsState::Loading;
        self.ticket()
    }

    /// Close and reset. Always succeeds; in-flight results become stale.
    pub fn close(&mut self) {
        self.reset();
        self.open = false;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.step = Step::Method;
        self.methods = MethodsState::Idle;
        self.draft = RechargeDraft::default();
        self.rate = None;
        self.rate_pending = false;
        self.upload_pending = false;
        self.submit_pending = false;
        self.warning = None;
        self.error = None;
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
        }
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        !self.open || ticket.generation != self.generation
    }

    fn require_open(&self) -> Result<(), StepBlocked> {
        if self.open {
            Ok(())
        } else {
            Err(StepBlocked::Closed)
        }
    }

    fn require_step(&self, step: Step) -> Result<(), StepBlocked> {
        self.require_open()?;
        if self.step == step {
            Ok(())
        } else {
            Err(StepBlocked::WrongStep(self.step))
        }
    }

    // ─── Payment methods ─────────────────────────────────────────────────────

    /// Reload methods after a failed load.
    pub fn retry_methods(&mut self) -> Result<Ticket, StepBlocked> {
        self.require_open()?;
        self.methods = MethodsState::Loading;
        Ok(self.ticket())
    }

    pub fn finish_methods(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<PaymentMethod>, ClientError>,
    ) -> Delivery {
        if self.is_stale(ticket) {
            tracing::debug!("Discarding payment methods for a closed dialog");
            return Delivery::Discarded;
        }
        self.methods = match result {
            Ok(methods) => MethodsState::Loaded(methods),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load payment methods");
                MethodsState::Failed(e.to_string())
            }
        };
        Delivery::Applied
    }

    /// Methods the user may pick: active, and local-settlement ones only in a
    /// local-currency region.
    pub fn methods(&self) -> Vec<&PaymentMethod> {
        match &self.methods {
            MethodsState::Loaded(all) => all
                .iter()
                .filter(|m| m.active && (self.local_region || !m.settles_locally()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn methods_state(&self) -> &MethodsState {
        &self.methods
    }

    pub fn methods_error(&self) -> Option<&str> {
        match &self.methods {
            MethodsState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    fn find_method(&self, id: &str) -> Option<&PaymentMethod> {
        self.methods().into_iter().find(|m| m.id == id)
    }

    pub fn selected_method(&self) -> Option<&PaymentMethod> {
        self.draft
            .selected_method_id
            .as_deref()
            .and_then(|id| self.find_method(id))
    }

    /// Select a method. Returns the rate fetch to perform when the new
    /// selection settles in local currency; re-selecting is a no-op.
    pub fn select_method(&mut self, method_id: &str) -> Result<Option<RateRequest>, StepBlocked> {
        self.require_step(Step::Method)?;
        let settles_locally = self
            .find_method(method_id)
            .ok_or(StepBlocked::MethodUnavailable)?
            .settles_locally();

        if self.draft.selected_method_id.as_deref() == Some(method_id) {
            return Ok(None);
        }

        self.draft.selected_method_id = Some(method_id.to_string());
        self.rate_seq += 1;
        self.rate = None;
        self.warning = None;
        self.rate_pending = settles_locally;

        Ok(settles_locally.then(|| RateRequest {
            ticket: self.ticket(),
            method_id: method_id.to_string(),
            seq: self.rate_seq,
        }))
    }

    /// Apply a rate fetch. Failures fall back to the last live rate, else the
    /// static one, and leave a warning; they never block the flow.
    pub fn finish_rate(
        &mut self,
        request: &RateRequest,
        result: Result<Decimal, ClientError>,
    ) -> Delivery {
        if self.is_stale(request.ticket)
            || request.seq != self.rate_seq
            || self.draft.selected_method_id.as_deref() != Some(request.method_id.as_str())
        {
            tracing::debug!(method_id = %request.method_id, "Discarding stale exchange rate");
            return Delivery::Discarded;
        }

        self.rate_pending = false;
        match result {
            Ok(rate) => {
                self.rate = Some(RateQuote {
                    rate,
                    source: RateSource::Live,
                });
                self.last_live_rate = Some(rate);
            }
            Err(e) => {
                let rate = self
                    .last_live_rate
                    .unwrap_or(self.policy.fallback_exchange_rate);
                tracing::warn!(error = %e, %rate, "Exchange rate unavailable; using fallback");
                self.rate = Some(RateQuote {
                    rate,
                    source: RateSource::Fallback,
                });
                self.warning = Some(format!(
                    "Could not fetch the current exchange rate; using {} per USD",
                    rate
                ));
            }
        }
        Delivery::Applied
    }

    // ─── Draft fields ────────────────────────────────────────────────────────

    pub fn set_amount(&mut self, input: &str) -> Result<(), StepBlocked> {
        self.require_open()?;
        self.draft.amount_input = input.to_string();
        Ok(())
    }

    pub fn set_reference(&mut self, code: &str) -> Result<(), StepBlocked> {
        self.require_open()?;
        let code = code.trim();
        self.draft.reference_code = (!code.is_empty()).then(|| code.to_string());
        Ok(())
    }

    pub fn begin_upload(&mut self) -> Result<Ticket, StepBlocked> {
        self.require_step(Step::Payment)?;
        if self.upload_pending {
            return Err(StepBlocked::Pending);
        }
        self.upload_pending = true;
        Ok(self.ticket())
    }

    /// The previous proof key is only replaced by a successful upload.
    pub fn finish_upload(
        &mut self,
        ticket: Ticket,
        result: Result<String, ClientError>,
    ) -> UploadOutcome {
        if self.is_stale(ticket) {
            tracing::debug!("Discarding upload for a closed dialog");
            return UploadOutcome::Discarded;
        }
        self.upload_pending = false;
        match result {
            Ok(key) => {
                self.draft.proof_asset_key = Some(key);
                self.error = None;
                UploadOutcome::Uploaded
            }
            Err(e) => {
                tracing::warn!(error = %e, "Proof upload failed");
                self.error = Some(e.to_string());
                UploadOutcome::Failed
            }
        }
    }

    // ─── Navigation ──────────────────────────────────────────────────────────

    pub fn guards(&self) -> Guards {
        let method = match self.draft.selected_method_id.as_deref() {
            None => MethodGuard::None,
            Some(id) => match self.find_method(id) {
                None => MethodGuard::Unavailable,
                Some(m) if self.policy.disabled_kinds.contains(&m.kind) => MethodGuard::Disabled,
                Some(_) => MethodGuard::Enabled,
            },
        };
        Guards {
            method,
            amount: check_amount(&self.draft.amount_input, &self.policy),
            has_evidence: self.draft.reference_code.is_some()
                || self.draft.proof_asset_key.is_some(),
            rate_pending: self.rate_pending,
            upload_pending: self.upload_pending,
        }
    }

    fn apply(&mut self, event: Event) -> Result<Step, StepBlocked> {
        self.require_open()?;
        let next = transition(self.step, event, &self.guards())?;
        self.step = next;
        self.error = None;
        Ok(next)
    }

    pub fn next(&mut self) -> Result<Step, StepBlocked> {
        self.apply(Event::Next)
    }

    pub fn back(&mut self) -> Result<Step, StepBlocked> {
        self.apply(Event::Back)
    }

    /// Whether `Next` would currently succeed.
    pub fn can_advance(&self) -> bool {
        self.open && transition(self.step, Event::Next, &self.guards()).is_ok()
    }

    // ─── Submission ──────────────────────────────────────────────────────────

    /// Build the payment request. Only from `Confirm`, one at a time.
    pub fn begin_submit(
        &mut self,
        user_id: &str,
    ) -> Result<(Ticket, CreatePaymentRequest), StepBlocked> {
        self.require_step(Step::Confirm)?;
        if self.submit_pending {
            return Err(StepBlocked::Pending);
        }
        let guards = self.guards();
        let amount_usd = guards.amount?;
        if !guards.has_evidence {
            return Err(StepBlocked::MissingEvidence);
        }
        let method = self.selected_method().ok_or(StepBlocked::NoMethodSelected)?;

        let (amount_local, exchange_rate) = if method.settles_locally() {
            let rate = self.rate.map(|q| q.rate);
            (rate.and_then(|r| amount_usd.checked_mul(r)), rate)
        } else {
            (None, None)
        };

        let request = CreatePaymentRequest {
            user_id: user_id.to_string(),
            payment_method_id: method.id.clone(),
            amount_usd,
            amount_local,
            exchange_rate,
            points: points_for(amount_usd, self.policy.points_per_usd),
            reference: self.draft.reference_code.clone(),
            proof_key: self.draft.proof_asset_key.clone(),
        };

        self.submit_pending = true;
        self.error = None;
        Ok((self.ticket(), request))
    }

    pub fn finish_submit(
        &mut self,
        ticket: Ticket,
        result: Result<Payment, ClientError>,
    ) -> SubmitOutcome {
        if self.is_stale(ticket) {
            tracing::debug!("Discarding submit result for a closed dialog");
            return SubmitOutcome::Discarded;
        }
        self.submit_pending = false;
        match result {
            Ok(payment) => {
                tracing::info!(payment_id = %payment.id, "Recharge submitted");
                self.close();
                SubmitOutcome::Submitted(payment)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recharge submission failed");
                let message = e.to_string();
                self.error = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }

    // ─── Derived values ──────────────────────────────────────────────────────

    pub fn amount_usd(&self) -> Option<Decimal> {
        parse_amount(&self.draft.amount_input)
    }

    pub fn points_equivalent(&self) -> u64 {
        self.amount_usd()
            .map(|a| points_for(a, self.policy.points_per_usd))
            .unwrap_or(0)
    }

    /// Amount in local currency, for local-settlement methods with a rate.
    pub fn local_amount(&self) -> Option<Decimal> {
        let method = self.selected_method()?;
        if !method.settles_locally() {
            return None;
        }
        self.amount_usd()?.checked_mul(self.rate?.rate)
    }

    /// Days of service the points buy. Cosmetic.
    pub fn days_equivalent(&self) -> Decimal {
        if self.policy.points_per_day == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.points_equivalent()) / Decimal::from(self.policy.points_per_day))
            .round_dp(1)
    }

    /// Message shown under the amount field when it is positive but out of bounds.
    pub fn amount_message(&self) -> Option<String> {
        if self.amount_usd()? == Decimal::ZERO {
            return None;
        }
        match check_amount(&self.draft.amount_input, &self.policy) {
            Err(e @ (StepBlocked::BelowMinimum(_) | StepBlocked::AboveMaximum(_))) => {
                Some(e.to_string())
            }
            _ => None,
        }
    }

    /// Prefilled WhatsApp link for reporting the payment by hand.
    pub fn support_link(&self, whatsapp_number: &str) -> String {
        let method = self.selected_method().map(|m| m.name.as_str()).unwrap_or("");
        let amount = self.amount_usd().unwrap_or(Decimal::ZERO);
        let local = self
            .local_amount()
            .map(|a| format!("Monto local: {}\n", a.round_dp(2).normalize()))
            .unwrap_or_default();
        let reference = self.draft.reference_code.as_deref().unwrap_or("Pendiente");

        let message = format!(
            "Hola! Quiero reportar mi pago:\n\nMétodo: {}\nMonto: ${} USD\n{}Referencia: {}\nPuntos a recibir: {}",
            method,
            amount.normalize(),
            local,
            reference,
            self.points_equivalent()
        );
        format!(
            "https://wa.me/{}?text={}",
            whatsapp_number,
            urlencoding::encode(&message)
        )
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &RechargeDraft {
        &self.draft
    }

    pub fn policy(&self) -> &RechargePolicy {
        &self.policy
    }

    pub fn rate(&self) -> Option<RateQuote> {
        self.rate
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_rate_pending(&self) -> bool {
        self.rate_pending
    }

    pub fn is_upload_pending(&self) -> bool {
        self.upload_pending
    }

    pub fn is_submit_pending(&self) -> bool {
        self.submit_pending
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RechargeController - drives the wizard against the backend
// ─────────────────────────────────────────────────────────────────────────────

/// Async front of the recharge dialog.
pub struct RechargeController {
    backend: Arc<dyn Backend>,
    session: Arc<SessionService>,
    locale: Arc<LocaleService>,
    wallet: Arc<WalletService>,
    support_whatsapp: String,
    wizard: Mutex<RechargeWizard>,
}

impl RechargeController {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<SessionService>,
        locale: Arc<LocaleService>,
        wallet: Arc<WalletService>,
        policy: RechargePolicy,
        support_whatsapp: String,
    ) -> Self {
        Self {
            backend,
            session,
            locale,
            wallet,
            support_whatsapp,
            wizard: Mutex::new(RechargeWizard::new(policy)),
        }
    }

    /// Open the dialog and load payment methods. A failed load leaves an
    /// empty list with an error; see [`Self::retry_methods`].
    pub async fn open(&self) {
        let ticket = self
            .wizard
            .lock()
            .await
            .open(self.locale.is_local_currency_region());
        self.load_methods(ticket).await;
    }

    pub async fn retry_methods(&self) -> Result<(), StepBlocked> {
        let ticket = self.wizard.lock().await.retry_methods()?;
        self.load_methods(ticket).await;
        Ok(())
    }

    async fn load_methods(&self, ticket: Ticket) {
        let result = match self.session.ticket() {
            Ok(session) => self.backend.payment_methods(&session.token).await,
            Err(e) => Err(e),
        };
        self.wizard.lock().await.finish_methods(ticket, result);
    }

    pub async fn close(&self) {
        self.wizard.lock().await.close();
    }

    /// Select a method, fetching its exchange rate if it settles locally.
    pub async fn select_method(&self, method_id: &str) -> Result<(), StepBlocked> {
        let request = self.wizard.lock().await.select_method(method_id)?;
        if let Some(request) = request {
            let result = match self.session.ticket() {
                Ok(session) => self
                    .backend
                    .exchange_rate(&session.token, &request.method_id)
                    .await
                    .map(|r| r.rate),
                Err(e) => Err(e),
            };
            self.wizard.lock().await.finish_rate(&request, result);
        }
        Ok(())
    }

    pub async fn set_amount(&self, input: &str) -> Result<(), StepBlocked> {
        self.wizard.lock().await.set_amount(input)
    }

    pub async fn set_reference(&self, code: &str) -> Result<(), StepBlocked> {
        self.wizard.lock().await.set_reference(code)
    }

    pub async fn next(&self) -> Result<Step, StepBlocked> {
        self.wizard.lock().await.next()
    }

    pub async fn back(&self) -> Result<Step, StepBlocked> {
        self.wizard.lock().await.back()
    }

    /// Upload a receipt. Refused while another upload is in flight.
    pub async fn upload_proof(&self, file: ProofFile) -> Result<UploadOutcome, StepBlocked> {
        let ticket = self.wizard.lock().await.begin_upload()?;
        let result = match self.session.ticket() {
            Ok(session) => self
                .backend
                .upload(&session.token, file)
                .await
                .map(|asset| asset.key),
            Err(e) => Err(e),
        };
        Ok(self.wizard.lock().await.finish_upload(ticket, result))
    }

    /// Submit the pending recharge as one request.
    pub async fn submit(&self) -> Result<SubmitOutcome, StepBlocked> {
        let session = self.session.ticket();
        let user_id = session
            .as_ref()
            .map(|s| s.user_id.clone())
            .unwrap_or_default();

        let (ticket, request) = self.wizard.lock().await.begin_submit(&user_id)?;
        let result = match &session {
            Ok(session) => self.backend.create_payment(&session.token, &request).await,
            Err(_) => Err(ClientError::NotAuthenticated),
        };

        let outcome = self.wizard.lock().await.finish_submit(ticket, result);
        if matches!(outcome, SubmitOutcome::Submitted(_)) {
            if let Err(e) = self.wallet.refresh().await {
                tracing::debug!(error = %e, "Wallet refresh after recharge failed");
            }
        }
        Ok(outcome)
    }

    /// Snapshot of the wizard for rendering.
    pub async fn state(&self) -> RechargeWizard {
        self.wizard.lock().await.clone()
    }

    /// Balance for display only; the backend decides validity.
    pub fn balance(&self) -> Option<Decimal> {
        self.wallet.balance()
    }

    pub async fn support_link(&self) -> String {
        self.wizard
            .lock()
            .await
            .support_link(&self.support_whatsapp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethodKind, PaymentStatus, SettlementCurrency};

    fn method(id: &str, kind: PaymentMethodKind, currency: SettlementCurrency) -> PaymentMethod {
        PaymentMethod {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            settlement_currency: currency,
            destination_account_info: Default::default(),
            active: true,
        }
    }

    fn loaded_wizard(local_region: bool) -> RechargeWizard {
        let mut wizard = RechargeWizard::new(RechargePolicy::default());
        let ticket = wizard.open(local_region);
        wizard.finish_methods(
            ticket,
            Ok(vec![
                method(
                    "pago_movil",
                    PaymentMethodKind::PagoMovil,
                    SettlementCurrency::Local,
                ),
                method("binance", PaymentMethodKind::Binance, SettlementCurrency::Usd),
                method("card", PaymentMethodKind::Card, SettlementCurrency::Usd),
            ]),
        );
        wizard
    }

    fn guards() -> Guards {
        Guards {
            method: MethodGuard::Enabled,
            amount: Ok(Decimal::from(5)),
            has_evidence: true,
            rate_pending: false,
            upload_pending: false,
        }
    }

    #[test]
    fn test_transition_table_forward() {
        let g = guards();
        assert_eq!(transition(Step::Method, Event::Next, &g), Ok(Step::Amount));
        assert_eq!(transition(Step::Amount, Event::Next, &g), Ok(Step::Payment));
        assert_eq!(transition(Step::Payment, Event::Next, &g), Ok(Step::Confirm));
        assert_eq!(
            transition(Step::Confirm, Event::Next, &g),
            Err(StepBlocked::SubmitRequired)
        );
        assert_eq!(
            transition(Step::CardMaintenance, Event::Next, &g),
            Err(StepBlocked::DeadEnd)
        );
    }

    #[test]
    fn test_transition_table_backward() {
        let g = guards();
        assert_eq!(
            transition(Step::Method, Event::Back, &g),
            Err(StepBlocked::AtFirstStep)
        );
        assert_eq!(transition(Step::Amount, Event::Back, &g), Ok(Step::Method));
        assert_eq!(transition(Step::Payment, Event::Back, &g), Ok(Step::Amount));
        assert_eq!(transition(Step::Confirm, Event::Back, &g), Ok(Step::Payment));
        assert_eq!(
            transition(Step::CardMaintenance, Event::Back, &g),
            Ok(Step::Method)
        );
    }

    #[test]
    fn test_transition_guards_block() {
        let mut g = guards();
        g.method = MethodGuard::Disabled;
        assert_eq!(
            transition(Step::Method, Event::Next, &g),
            Ok(Step::CardMaintenance)
        );

        g.rate_pending = true;
        assert_eq!(
            transition(Step::Method, Event::Next, &g),
            Err(StepBlocked::Pending)
        );

        g.amount = Err(StepBlocked::BelowMinimum(Decimal::ONE));
        assert_eq!(
            transition(Step::Amount, Event::Next, &g),
            Err(StepBlocked::BelowMinimum(Decimal::ONE))
        );

        g.has_evidence = false;
        assert_eq!(
            transition(Step::Payment, Event::Next, &g),
            Err(StepBlocked::MissingEvidence)
        );
        g.has_evidence = true;
        g.upload_pending = true;
        assert_eq!(
            transition(Step::Payment, Event::Next, &g),
            Err(StepBlocked::Pending)
        );
    }

    #[test]
    fn test_points_floor() {
        assert_eq!(points_for(Decimal::from(2), 100), 200);
        assert_eq!(points_for(Decimal::new(199, 2), 100), 199);
        assert_eq!(points_for(Decimal::new(1999, 3), 100), 199);
        assert_eq!(points_for(parse_amount("1,5").unwrap(), 100), 150);
    }

    #[test]
    fn test_points_do_not_overflow() {
        assert_eq!(points_for(Decimal::MAX, 100), 0);
        assert_eq!(points_for(Decimal::from(10_000), 100), 1_000_000);
    }

    #[test]
    fn test_huge_amount_is_blocked() {
        let mut wizard = loaded_wizard(true);
        let request = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.finish_rate(&request, Ok(Decimal::from(590)));
        wizard.next().unwrap();
        wizard.set_amount("79228162514264337593543950335").unwrap();

        assert_eq!(wizard.points_equivalent(), 0);
        assert_eq!(wizard.local_amount(), None);
        assert_eq!(wizard.days_equivalent(), Decimal::ZERO);
        assert!(wizard.support_link("584121234567").starts_with("https://wa.me/"));
        assert_eq!(
            wizard.amount_message().as_deref(),
            Some("The maximum amount is $10000 USD")
        );
        assert_eq!(
            wizard.next(),
            Err(StepBlocked::AboveMaximum(Decimal::from(10_000)))
        );
        assert_eq!(wizard.step(), Step::Amount);

        wizard.set_amount("10000").unwrap();
        assert_eq!(wizard.next(), Ok(Step::Payment));
        assert_eq!(wizard.local_amount(), Some(Decimal::from(5_900_000)));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("-3"), None);
        assert_eq!(parse_amount(" 2.50 "), Some(Decimal::new(250, 2)));
    }

    #[test]
    fn test_local_methods_hidden_outside_local_region() {
        let wizard = loaded_wizard(false);
        let ids: Vec<&str> = wizard.methods().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["binance", "card"]);

        let wizard = loaded_wizard(true);
        assert_eq!(wizard.methods().len(), 3);
    }

    #[test]
    fn test_disabled_card_flow_is_dead_end() {
        let mut wizard = loaded_wizard(false);
        assert_eq!(wizard.select_method("card"), Ok(None));
        assert_eq!(wizard.next(), Ok(Step::CardMaintenance));
        assert_eq!(wizard.next(), Err(StepBlocked::DeadEnd));
        assert_eq!(wizard.back(), Ok(Step::Method));
    }

    #[test]
    fn test_reselect_same_method_does_not_refetch() {
        let mut wizard = loaded_wizard(true);
        let request = wizard.select_method("pago_movil").unwrap();
        assert!(request.is_some());
        assert!(wizard.is_rate_pending());
        assert_eq!(wizard.next(), Err(StepBlocked::Pending));

        wizard.finish_rate(request.as_ref().unwrap(), Ok(Decimal::from(600)));
        assert_eq!(wizard.select_method("pago_movil"), Ok(None));
        assert_eq!(wizard.rate().map(|q| q.rate), Some(Decimal::from(600)));
    }

    #[test]
    fn test_rate_for_previous_selection_is_discarded() {
        let mut wizard = loaded_wizard(true);
        let request = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.select_method("binance").unwrap();

        assert_eq!(
            wizard.finish_rate(&request, Ok(Decimal::from(600))),
            Delivery::Discarded
        );
        assert!(wizard.rate().is_none());
        assert!(!wizard.is_rate_pending());
    }

    #[test]
    fn test_only_newest_rate_fetch_applies() {
        let mut wizard = loaded_wizard(true);
        let first = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.select_method("binance").unwrap();
        let second = wizard.select_method("pago_movil").unwrap().unwrap();

        assert_eq!(
            wizard.finish_rate(&first, Ok(Decimal::from(500))),
            Delivery::Discarded
        );
        assert!(wizard.is_rate_pending());
        assert!(wizard.rate().is_none());

        assert_eq!(
            wizard.finish_rate(&second, Ok(Decimal::from(610))),
            Delivery::Applied
        );
        assert_eq!(wizard.rate().map(|q| q.rate), Some(Decimal::from(610)));
        assert!(!wizard.is_rate_pending());
    }

    #[test]
    fn test_fallback_prefers_last_live_rate() {
        let mut wizard = loaded_wizard(true);
        let request = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.finish_rate(&request, Ok(Decimal::from(610)));

        wizard.close();
        let ticket = wizard.open(true);
        wizard.finish_methods(
            ticket,
            Ok(vec![method(
                "pago_movil",
                PaymentMethodKind::PagoMovil,
                SettlementCurrency::Local,
            )]),
        );
        let request = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.finish_rate(&request, Err(ClientError::Network("down".into())));

        let quote = wizard.rate().unwrap();
        assert_eq!(quote.rate, Decimal::from(610));
        assert_eq!(quote.source, RateSource::Fallback);
        assert!(wizard.warning().is_some());
    }

    #[test]
    fn test_days_equivalent() {
        let mut wizard = loaded_wizard(false);
        wizard.set_amount("3").unwrap();
        assert_eq!(wizard.points_equivalent(), 300);
        assert_eq!(wizard.days_equivalent(), Decimal::from(10));
    }

    #[test]
    fn test_submit_request_contents() {
        let mut wizard = loaded_wizard(true);
        let request = wizard.select_method("pago_movil").unwrap().unwrap();
        wizard.finish_rate(&request, Ok(Decimal::from(590)));
        wizard.next().unwrap();
        wizard.set_amount("5").unwrap();
        wizard.next().unwrap();
        wizard.set_reference("  123456  ").unwrap();
        wizard.next().unwrap();

        let (ticket, request) = wizard.begin_submit("u1").unwrap();
        assert_eq!(request.amount_local, Some(Decimal::from(2950)));
        assert_eq!(request.points, 500);
        assert_eq!(request.reference.as_deref(), Some("123456"));
        assert_eq!(request.proof_key, None);
        assert_eq!(wizard.begin_submit("u1").unwrap_err(), StepBlocked::Pending);

        let outcome = wizard.finish_submit(
            ticket,
            Ok(Payment {
                id: "p1".into(),
                status: PaymentStatus::Pending,
            }),
        );
        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert!(!wizard.is_open());
        assert_eq!(wizard.draft(), &RechargeDraft::default());
    }

    #[test]
    fn test_support_link_is_encoded() {
        let mut wizard = loaded_wizard(false);
        wizard.select_method("binance").unwrap();
        wizard.set_amount("2").unwrap();

        let link = wizard.support_link("584121234567");
        assert!(link.starts_with("https://wa.me/584121234567?text="));
        assert!(link.contains("Pendiente"));
        assert!(link.contains("200"));
        assert!(!link.contains(' '));
        assert!(!link.contains("Monto%20local"));
    }
}
