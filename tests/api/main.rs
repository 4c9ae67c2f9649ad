// all integration tests are bundled into a single binary: compiled once, linked
// once
//
// tests/api/main.rs
// tests/api/helpers.rs -- not a test itself, just shared setup
// tests/api/<topic>.rs
mod changes;
mod health_check;
mod helpers;
mod subscriptions;
mod voters;
