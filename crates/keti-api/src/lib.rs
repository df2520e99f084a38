//! JSON REST API for Keti.
//!
//! Exposes an axum [`Router`] backed by any [`keti_core::ResearchStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", keti_api::api_router(store.clone()))
//! ```

pub mod achievements;
pub mod error;
pub mod profiles;
pub mod subjects;

use std::sync::Arc;

use axum::{Router, routing::get};
use keti_core::ResearchStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ResearchStore + 'static,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route("/subjects/stats", get(subjects::stats::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>)
        .patch(subjects::update::<S>)
        .delete(subjects::delete::<S>),
    )
    .route("/subjects/{id}/achievements", get(subjects::achievements::<S>))
    // Achievements
    .route(
      "/achievements",
      get(achievements::list::<S>).post(achievements::create::<S>),
    )
    .route(
      "/achievements/{id}",
      get(achievements::get_one::<S>)
        .patch(achievements::update::<S>)
        .delete(achievements::delete::<S>),
    )
    // Profiles
    .route("/profiles", get(profiles::list::<S>).post(profiles::create::<S>))
    .route(
      "/profiles/{id}",
      get(profiles::get_one::<S>)
        .patch(profiles::update::<S>)
        .delete(profiles::delete::<S>),
    )
    .with_state(store)
}

#[cfg(test)]
mod tests;
