//! Setup workflow tests against an in-memory cluster, and optionally a live one.

mod bootstrap;
mod scenarios;
