//! Mocks & fixtures for testing the release tasks end to end

pub mod mocks;
