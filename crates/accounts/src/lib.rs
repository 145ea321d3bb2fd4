//! `strata-accounts` — machine-credential (service account) lifecycle.
//!
//! Service accounts are event-sourced: commands validate against rehydrated
//! state and emit events; the event stream is the source of truth and read
//! models are rebuildable projections (see `strata-infra`). Plaintext secrets
//! exist exactly once, in the create/rotate response; only digests are stored.

pub mod aggregate;
pub mod config;
pub mod secret;

pub use aggregate::{
    Activate, AssignRoles, CreateServiceAccount, Deactivate, DetailsUpdated, RemoveRoles,
    RolesAssigned, RolesRemoved, RotateSecret, SecretRotated, ServiceAccount,
    ServiceAccountActivated, ServiceAccountCommand, ServiceAccountCreated,
    ServiceAccountDeactivated, ServiceAccountEvent, ServiceAccountId, ServiceAccountStatus,
    UpdateDetails,
};
pub use config::ServiceAccountConfig;
pub use secret::{generate_client_id, generate_client_secret};
