//! End-to-end tests for smixer live under `tests/`
