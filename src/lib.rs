// Copyright 2026 Courtfetch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Court case-status fetcher — drives the Delhi High Court search form in a
//! headless browser, parses the rendered results, logs every query, and
//! serves the flow over a small HTTP API.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod parse;
pub mod rest;
pub mod scrape;
pub mod store;
