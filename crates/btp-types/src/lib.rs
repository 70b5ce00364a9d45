//! Common types module for the BTP back-office core.
//!
//! This crate defines the domain types shared by the quotation engine and
//! the workload planner: value objects, entities, events and the error
//! taxonomy. It provides a centralized location for shared types to ensure
//! consistency across all crates of the workspace.

/// Price-library articles and their catalog value objects.
pub mod article;
/// Regulatory VAT attestations (CERFA 1300-SD / 1301-SD).
pub mod attestation;
/// Pair comparison between two quote versions.
pub mod comparatif;
/// Quote entity and its construction/transition rules.
pub mod devis;
/// Error taxonomy for the quotation bounded context.
pub mod error;
/// Domain events published after commit.
pub mod events;
/// Site expenses attached to a quote.
pub mod frais;
/// Append-only audit journal entries.
pub mod journal;
/// Quote lines and their discharge details.
pub mod ligne;
/// Quote lots (recursive sections).
pub mod lot;
/// Monetary rounding helpers.
pub mod montant;
/// Presentation options for client-facing documents.
pub mod presentation;
/// Follow-up (relance) entity and configuration.
pub mod relance;
/// Retention-of-guarantee value object.
pub mod retenue;
/// Electronic signature entity.
pub mod signature;
/// Quote status state machine.
pub mod statut;
/// VAT rate value object and chantier default policy.
pub mod tva;
/// Version and diff kind value objects.
pub mod version;

// Re-export all types for convenient access
pub use article::*;
pub use attestation::*;
pub use comparatif::*;
pub use devis::*;
pub use error::*;
pub use events::*;
pub use frais::*;
pub use journal::*;
pub use ligne::*;
pub use lot::*;
pub use montant::*;
pub use presentation::*;
pub use relance::*;
pub use retenue::*;
pub use signature::*;
pub use statut::*;
pub use tva::*;
pub use version::*;
