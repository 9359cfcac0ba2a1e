//! FlowLens: NiFi lineage and log telemetry
//!
//! The binary's command-line layer. Remote clients and the provenance query
//! lifecycle live in `flowlens-core`; the HTTP API in `flowlens-api`.

pub mod cli;
