//! CLI handler tests; see `tests/cli/`

mod cli;
