//! Workspace root. Holds only the end-to-end test suites under `tests/`;
//! the relay engine lives in `hub-core`, the thin client in `hub-client`,
//! and the server binary in `services/hub-server`.
