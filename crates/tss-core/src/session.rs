//! Signing session state machine
//!
//! Drives one transaction through the fixed nine-step round sequence:
//! sign-share, K-share offer, A-share wait, gamma conversion, MU-share
//! offer, omicron combine, D-share wait, final signature share, S-share
//! offer. Transitions are strictly sequential; every share passes the
//! provenance gate before the engine sees it or the gateway sends it, and
//! any non-retryable failure poisons the session permanently.

use crate::engine::{EcdsaEngine, SignIndex};
use crate::gateway::{SessionShare, TxRequestGateway};
use crate::shares::{
    verify_provenance, AShare, DShare, GShare, KShare, MuShare, OShare, SShare, ShareKind, WShare,
    XShare, YShare,
};
use crate::types::{PartyRole, SessionTimeouts};
use crate::{Error, Result};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

/// The fixed pair the omicron combine runs against
const SIGN_INDEX: SignIndex = SignIndex {
    i: PartyRole::Cosigner,
    j: PartyRole::User,
};

/// Progress of a signing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    SignShareCreated,
    KShareOffered,
    AShareReceived,
    GammaShareCreated,
    MuShareOffered,
    OmicronShareCreated,
    DShareReceived,
    SignatureShareCreated,
    Complete,
    /// Terminal; a retry must start a fresh session
    Failed,
}

/// One signing session for one transaction request, local role fixed to
/// the user.
///
/// Retained shares (W, G, O) live inside the session and are consumed
/// exactly once. No state is shared across sessions; independent sessions
/// over distinct transaction requests may run concurrently against the
/// same gateway.
pub struct SigningSession<'a, E, G> {
    engine: &'a E,
    gateway: &'a G,
    wallet_id: String,
    tx_request_id: String,
    timeouts: SessionTimeouts,
    state: SessionState,
    w_share: Option<WShare>,
    g_share: Option<GShare>,
    o_share: Option<OShare>,
}

impl<'a, E: EcdsaEngine, G: TxRequestGateway> SigningSession<'a, E, G> {
    /// Open a session against one transaction request
    pub fn new(engine: &'a E, gateway: &'a G, wallet_id: &str, tx_request_id: &str) -> Self {
        Self {
            engine,
            gateway,
            wallet_id: wallet_id.to_string(),
            tx_request_id: tx_request_id.to_string(),
            timeouts: SessionTimeouts::default(),
            state: SessionState::Init,
            w_share: None,
            g_share: None,
            o_share: None,
        }
    }

    /// Override the polling parameters used by [`SigningSession::run`]
    pub fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Current progress
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn expect_state(&mut self, expected: SessionState, operation: &str) -> Result<()> {
        if self.state == expected {
            return Ok(());
        }
        let current = self.state;
        self.state = SessionState::Failed;
        Err(Error::ProtocolViolation(format!(
            "{operation} called in state {current:?}, expected {expected:?}"
        )))
    }

    /// Poison the session on any non-retryable failure
    fn gate<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            if !error.is_retryable() {
                self.state = SessionState::Failed;
            }
        }
        result
    }

    /// Step 1: first signing round over the combined local share.
    ///
    /// Retains the W-share; the returned K-share must be offered next.
    /// Any ownership violation aborts before anything is sent.
    pub fn create_sign_share(&mut self, x_share: &XShare, y_share: &YShare) -> Result<KShare> {
        self.expect_state(SessionState::Init, "create_sign_share")?;
        let engine = self.engine;
        let output = self.gate((|| {
            verify_provenance(x_share)?;
            verify_provenance(y_share)?;
            let output = engine.sign_share(x_share, y_share)?;
            verify_provenance(&output.k_share)?;
            verify_provenance(&output.w_share)?;
            Ok(output)
        })())?;
        debug!(tx_request_id = %self.tx_request_id, "sign share created");
        self.w_share = Some(output.w_share);
        self.state = SessionState::SignShareCreated;
        Ok(output.k_share)
    }

    /// Step 2: offer the K-share to the counterpart
    #[instrument(skip_all, fields(tx_request_id = %self.tx_request_id))]
    pub async fn offer_k_share(&mut self, k_share: &KShare) -> Result<()> {
        self.expect_state(SessionState::SignShareCreated, "offer_k_share")?;
        self.gate(verify_provenance(k_share))?;
        let posted = self
            .gateway
            .post_share(
                &self.wallet_id,
                &self.tx_request_id,
                SessionShare::K(k_share.clone()),
            )
            .await;
        self.gate(posted)?;
        info!("K share offered");
        self.state = SessionState::KShareOffered;
        Ok(())
    }

    /// Step 3: single poll for the counterpart's A-share.
    ///
    /// Absence is retryable and leaves the session state unchanged.
    pub async fn poll_a_share(&mut self) -> Result<AShare> {
        self.expect_state(SessionState::KShareOffered, "poll_a_share")?;
        let fetched = self
            .gateway
            .fetch_tx_request(&self.wallet_id, &self.tx_request_id)
            .await;
        let request = self.gate(fetched)?;
        let Some(a_share) = request.a_share else {
            return Err(Error::MissingSignatureShare(ShareKind::A));
        };
        self.gate(verify_provenance(&a_share))?;
        debug!(tx_request_id = %self.tx_request_id, "A share received");
        self.state = SessionState::AShareReceived;
        Ok(a_share)
    }

    /// Step 4: gamma conversion over the counterpart's A-share.
    ///
    /// Consumes the retained W-share; retains the G-share and returns the
    /// MU-share to offer.
    pub fn create_gamma_share(&mut self, a_share: &AShare) -> Result<MuShare> {
        self.expect_state(SessionState::AShareReceived, "create_gamma_share")?;
        let engine = self.engine;
        let w_share = self.w_share.take();
        let output = self.gate((|| {
            let w_share = w_share.ok_or_else(|| {
                Error::ProtocolViolation("create_gamma_share without a retained WShare".into())
            })?;
            verify_provenance(&w_share)?;
            verify_provenance(a_share)?;
            let output = engine.sign_convert(&w_share, a_share)?;
            verify_provenance(&output.mu_share)?;
            verify_provenance(&output.g_share)?;
            Ok(output)
        })())?;
        debug!(tx_request_id = %self.tx_request_id, "gamma share created");
        self.g_share = Some(output.g_share);
        self.state = SessionState::GammaShareCreated;
        Ok(output.mu_share)
    }

    /// Step 5: offer the MU-share to the counterpart
    #[instrument(skip_all, fields(tx_request_id = %self.tx_request_id))]
    pub async fn offer_mu_share(&mut self, mu_share: &MuShare) -> Result<()> {
        self.expect_state(SessionState::GammaShareCreated, "offer_mu_share")?;
        self.gate(verify_provenance(mu_share))?;
        let posted = self
            .gateway
            .post_share(
                &self.wallet_id,
                &self.tx_request_id,
                SessionShare::Mu(mu_share.clone()),
            )
            .await;
        self.gate(posted)?;
        info!("MU share offered");
        self.state = SessionState::MuShareOffered;
        Ok(())
    }

    /// Step 6: omicron combine against the fixed signing pair.
    ///
    /// Consumes the retained G-share and retains the O-share.
    pub fn create_omicron_share(&mut self) -> Result<()> {
        self.expect_state(SessionState::MuShareOffered, "create_omicron_share")?;
        let engine = self.engine;
        let g_share = self.g_share.take();
        let output = self.gate((|| {
            let g_share = g_share.ok_or_else(|| {
                Error::ProtocolViolation("create_omicron_share without a retained GShare".into())
            })?;
            verify_provenance(&g_share)?;
            let output = engine.sign_combine(&g_share, SIGN_INDEX)?;
            verify_provenance(&output.o_share)?;
            Ok(output)
        })())?;
        debug!(tx_request_id = %self.tx_request_id, "omicron share created");
        self.o_share = Some(output.o_share);
        self.state = SessionState::OmicronShareCreated;
        Ok(())
    }

    /// Step 7: single poll for the counterpart's D-share
    pub async fn poll_d_share(&mut self) -> Result<DShare> {
        self.expect_state(SessionState::OmicronShareCreated, "poll_d_share")?;
        let fetched = self
            .gateway
            .fetch_tx_request(&self.wallet_id, &self.tx_request_id)
            .await;
        let request = self.gate(fetched)?;
        let Some(d_share) = request.d_share else {
            return Err(Error::MissingSignatureShare(ShareKind::D));
        };
        self.gate(verify_provenance(&d_share))?;
        debug!(tx_request_id = %self.tx_request_id, "D share received");
        self.state = SessionState::DShareReceived;
        Ok(d_share)
    }

    /// Step 8: final signature share over the message digest.
    ///
    /// Both provenance fields of the D-share must match; a mismatch in
    /// either is a violation.
    pub fn create_signature_share(
        &mut self,
        d_share: &DShare,
        digest: &[u8; 32],
    ) -> Result<SShare> {
        self.expect_state(SessionState::DShareReceived, "create_signature_share")?;
        let engine = self.engine;
        let o_share = self.o_share.take();
        let s_share = self.gate((|| {
            let o_share = o_share.ok_or_else(|| {
                Error::ProtocolViolation("create_signature_share without a retained OShare".into())
            })?;
            verify_provenance(&o_share)?;
            verify_provenance(d_share)?;
            let s_share = engine.sign(digest, &o_share, d_share)?;
            verify_provenance(&s_share)?;
            Ok(s_share)
        })())?;
        debug!(tx_request_id = %self.tx_request_id, "signature share created");
        self.state = SessionState::SignatureShareCreated;
        Ok(s_share)
    }

    /// Step 9: offer the final S-share; the session is then complete.
    ///
    /// Assembling all parties' S-shares into a publishable signature is
    /// the coordinator's job.
    #[instrument(skip_all, fields(tx_request_id = %self.tx_request_id))]
    pub async fn offer_s_share(&mut self, s_share: &SShare) -> Result<()> {
        self.expect_state(SessionState::SignatureShareCreated, "offer_s_share")?;
        self.gate(verify_provenance(s_share))?;
        let posted = self
            .gateway
            .post_share(
                &self.wallet_id,
                &self.tx_request_id,
                SessionShare::S(s_share.clone()),
            )
            .await;
        self.gate(posted)?;
        info!("S share offered, session complete");
        self.state = SessionState::Complete;
        Ok(())
    }

    async fn wait_for_a_share(&mut self) -> Result<AShare> {
        let deadline = Instant::now() + self.timeouts.share_timeout;
        loop {
            match self.poll_a_share().await {
                Err(Error::MissingSignatureShare(share)) => {
                    self.backoff(share, deadline).await?;
                }
                other => return other,
            }
        }
    }

    async fn wait_for_d_share(&mut self) -> Result<DShare> {
        let deadline = Instant::now() + self.timeouts.share_timeout;
        loop {
            match self.poll_d_share().await {
                Err(Error::MissingSignatureShare(share)) => {
                    self.backoff(share, deadline).await?;
                }
                other => return other,
            }
        }
    }

    /// Sleep until the next poll, or fail the session once the deadline
    /// would be exceeded
    async fn backoff(&mut self, share: ShareKind, deadline: Instant) -> Result<()> {
        if Instant::now() + self.timeouts.poll_interval >= deadline {
            self.state = SessionState::Failed;
            return Err(Error::SignatureShareTimeout {
                share,
                waited: self.timeouts.share_timeout,
            });
        }
        debug!(tx_request_id = %self.tx_request_id, %share, "share not yet available, backing off");
        sleep(self.timeouts.poll_interval).await;
        Ok(())
    }

    /// Drive the whole nine-step sequence, polling at the configured
    /// interval at the two wait points.
    ///
    /// Each round's offer completes before the next round starts. On any
    /// failure the session is poisoned and nothing further is posted.
    #[instrument(skip_all, fields(wallet_id = %self.wallet_id, tx_request_id = %self.tx_request_id))]
    pub async fn run(
        mut self,
        x_share: &XShare,
        y_share: &YShare,
        digest: &[u8; 32],
    ) -> Result<SShare> {
        info!("starting signing session");
        let k_share = self.create_sign_share(x_share, y_share)?;
        self.offer_k_share(&k_share).await?;
        let a_share = self.wait_for_a_share().await?;
        let mu_share = self.create_gamma_share(&a_share)?;
        self.offer_mu_share(&mu_share).await?;
        self.create_omicron_share()?;
        let d_share = self.wait_for_d_share().await?;
        let s_share = self.create_signature_share(&d_share, digest)?;
        self.offer_s_share(&s_share).await?;
        info!("signing session finished");
        Ok(s_share)
    }
}
