//! Integration tests for Domain Hunter
//!
//! These tests stand up mock availability sources with wiremock and drive
//! the scan end to end against real HTTP.

mod scan_tests;
