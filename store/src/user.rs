//! Users, session tokens and wallet links.

use chainvote_types::{UserId, UserProfile, VoterAddress};

use crate::StoreError;

/// Result of a guarded wallet link or unlink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletChange {
    /// The profile as stored after the change.
    Updated(UserProfile),
    /// The user holds a vote record, so the linked wallet can no longer change.
    LockedByVote,
    /// The address is linked to another user.
    AddressInUse(UserId),
}

pub trait UserStore {
    fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError>;

    fn put_user(&self, user: &UserProfile) -> Result<(), StoreError>;

    /// Resolve a bearer token to its user.
    fn user_for_token(&self, token: &str) -> Result<Option<UserProfile>, StoreError>;

    fn put_session(&self, token: &str, user: &UserId) -> Result<(), StoreError>;

    /// The user whose linked wallet is `address`.
    fn user_for_wallet(&self, address: &VoterAddress) -> Result<Option<UserProfile>, StoreError>;

    /// Link `wallet` to `user`, or unlink with `None`.
    ///
    /// Must check and write atomically: a user with any vote record keeps
    /// its wallet, and an address belongs to at most one user. `NotFound`
    /// for an unknown user.
    fn set_wallet(
        &self,
        user: &UserId,
        wallet: Option<&VoterAddress>,
    ) -> Result<WalletChange, StoreError>;
}
