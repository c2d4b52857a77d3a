//! Downloader behavior tests, driven through the public engine surface
//! against a mock upstream API.

mod engine;
