//! # zabbix-migrate
//!
//! Moves the configuration of one Zabbix instance to another, independent
//! instance: templates, host groups, hosts, media types, services, proxies,
//! trigger actions and auto-registration actions.
//!
//! ## Overview
//!
//! Every Zabbix instance numbers its objects on its own, so the template
//! `web-tier` may be `10108` on the source and `20055` on the destination.
//! Actions refer to templates and host groups only by those numbers, which
//! breaks a naive export/import. This crate records, at backup time, a
//! snapshot of every object's id, display name and content fingerprint, and
//! at restore time uses it to:
//!
//! - delete destination objects whose content drifted, so the platform's
//!   bulk import can recreate them cleanly
//! - rewrite `templateid` / `groupid` references inside actions by joining
//!   the origin and destination snapshots on display name
//! - recreate actions, falling back to update when one of the same name exists
//!
//! ## Architecture
//!
//! - Object kinds and their API field names ([`kind`])
//! - Content hashing ([`fingerprint`]) and snapshot persistence ([`snapshot`])
//! - Reference rewriting ([`rewrite`]) and drift reconciliation ([`reconcile`])
//! - Export and import sequencing ([`backup`], [`restore`], [`rules`], [`report`])
//! - Platform access ([`client`]), configuration ([`config`]), logging ([`logger`])

/// Export of an instance's configuration and origin snapshot into a data directory.
pub mod backup;

/// JSON-RPC access to the Zabbix API behind the [`client::ZabbixApi`] trait.
pub mod client;

/// Configuration directory resolution and connection settings.
///
/// Settings come from an optional `config.toml` and are overridden by the
/// `ZABBIX_API_*` environment variables.
pub mod config;

/// Error taxonomy of the migration engine.
pub mod error;

/// Deterministic content fingerprints of remote objects.
pub mod fingerprint;

/// Command handlers used by the binary.
pub mod handlers;

/// Closed set of migrated object kinds and action classes.
pub mod kind;

/// Console and file logging.
pub mod logger;

/// Drift detection between the origin snapshot and the destination.
pub mod reconcile;

/// Restore outcome report, persisted as JSON and printed as a summary.
pub mod report;

/// Ordered restore of a backup directory onto a destination.
pub mod restore;

/// Identifier rewriting in action payloads.
pub mod rewrite;

/// Policy rules sent with every configuration import.
pub mod rules;

/// Typed snapshot of object ids, names and fingerprints.
pub mod snapshot;
