//! Voter-side half of the vote pipeline.
//!
//! - [`VoteOrchestrator`]: one in-flight attempt per (user, election), driven
//!   from signature through ledger confirmation to Store verification
//! - [`WalletSigner`]: the key custodian that approves and signs, with a
//!   keystore-backed [`LocalSigner`]
//! - [`StoreClient`]: the Verification Client for the Store HTTP API
//! - [`AttemptJournal`]: durable record of in-flight attempts so a restart
//!   resumes from the transaction hash instead of signing again

pub mod error;
pub mod journal;
pub mod keystore;
pub mod orchestrator;
pub mod session;
pub mod signer;
pub mod store_client;

pub use error::{JournalError, SignerError, VerificationClientError, VoteError};
pub use journal::{AttemptJournal, FileJournal, JournalStage, MemoryJournal, PersistedAttempt};
pub use keystore::{decrypt_keystore, encrypt_keystore, load_keystore, save_keystore, KeystoreFile};
pub use orchestrator::{
    AttemptKey, OrchestratorConfig, RejectReason, VoteAttempt, VoteOrchestrator, VoteState,
};
pub use session::Session;
pub use signer::{LocalSigner, SignerIdentity, WalletSigner};
pub use store_client::{StoreClient, VerificationApi};
