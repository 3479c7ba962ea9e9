//! Upstream HTTP clients
//!
//! Long-lived, shared `reqwest` clients for each provider family plus the
//! bearer-token scraper. No client holds any cache or pool lock across a
//! request.

pub mod kugou_client;
pub mod legacy_client;
pub mod timed_text_client;
pub mod token_scraper;
