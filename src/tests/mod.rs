//! Scenario tests for the synchronization core.
