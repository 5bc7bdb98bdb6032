//! # climacal-domain
//!
//! Pure domain model for the climacal calendar-driven climate controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Calendar events** (transient occurrences fetched every poll)
//! - Define **Match rules** and **Bindings** (event pattern → slot, with priority)
//! - Define **Slots** (reusable payload profiles with per-device overrides and
//!   exclusions) and the entity-override merge
//! - Define **Override flags** (skip / force) and their expiry rules
//! - Define **Decisions** and **Notifications** produced by an evaluation cycle
//! - Define the **Rule set** (bindings + slots + device pool) and its invariants
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod binding;
pub mod calendar_event;
pub mod decision;
pub mod flag;
pub mod matching;
pub mod notification;
pub mod payload;
pub mod rules;
pub mod slot;
